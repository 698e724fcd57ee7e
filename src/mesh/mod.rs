//! LOD mesh processor
//!
//! `loader` turns an OBJ file into a triangle soup, `remap` deduplicates and
//! reorders it, `simplify` and `lod` build the packed LOD chain.

pub mod loader;
pub mod lod;
pub mod remap;
pub mod simplify;
pub mod vertex;

use glam::Vec3;

pub use loader::{load_obj, Material, MeshSource};
pub use lod::{LodLevel, LodMesh, LodReport, LodReportRow, LodSettings, LodTable, LodTableGpu};
pub use vertex::Vertex;

/// Object-space bounding sphere used by the cull stage
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    /// Centre of the AABB and the farthest vertex from it
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        if vertices.is_empty() {
            return Self::default();
        }

        let (min, max) = vertices.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(lo, hi), v| (lo.min(v.position()), hi.max(v.position())),
        );
        let center = (min + max) * 0.5;
        let radius = vertices
            .iter()
            .map(|v| v.position().distance(center))
            .fold(0.0f32, f32::max);

        Self { center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_sphere_reaches_corners() {
        let mesh = LodMesh::build(&MeshSource::cube(), &LodSettings::default());
        assert_eq!(mesh.bounds.center, Vec3::ZERO);
        assert!((mesh.bounds.radius - 0.75f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn empty_sphere_is_degenerate() {
        assert_eq!(BoundingSphere::from_vertices(&[]), BoundingSphere::default());
    }
}
