use std::hash::{Hash, Hasher};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Mesh vertex as stored in the GPU vertex buffer.
///
/// Equality and hashing compare the exact bit patterns of every field so
/// the type can key a dedup map. Normals must already be normalized when a
/// vertex is compared; [`Vertex::new`] enforces that.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2], color: [f32; 3]) -> Self {
        Self {
            position,
            normal: normalize_or_zero(normal),
            tex_coords,
            color,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    fn bits(&self) -> [u32; 11] {
        let mut out = [0u32; 11];
        let fields = self
            .position
            .iter()
            .chain(self.normal.iter())
            .chain(self.tex_coords.iter())
            .chain(self.color.iter());
        for (slot, value) in out.iter_mut().zip(fields) {
            // Fold -0.0 into 0.0 so the two compare equal like the floats do
            *slot = if *value == 0.0 { 0 } else { value.to_bits() };
        }
        out
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Normal
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Texture coordinates
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // Color
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

pub(crate) fn normalize_or_zero(n: [f32; 3]) -> [f32; 3] {
    Vec3::from(n).normalize_or_zero().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn normals_are_normalized_on_construction() {
        let v = Vertex::new([0.0; 3], [0.0, 3.0, 4.0], [0.0; 2], [1.0; 3]);
        let len = Vec3::from(v.normal).length();
        assert!((len - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equal_vertices_hash_together() {
        let a = Vertex::new([1.0, 2.0, 3.0], [0.0, 2.0, 0.0], [0.5, 0.5], [1.0; 3]);
        let b = Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.5], [1.0; 3]);
        let c = Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.25], [1.0; 3]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: FxHashSet<Vertex> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn signed_zero_is_one_key() {
        let a = Vertex::new([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0; 2], [1.0; 3]);
        let b = Vertex::new([-0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0; 2], [1.0; 3]);
        assert_eq!(a, b);
    }

    #[test]
    fn layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
    }
}
