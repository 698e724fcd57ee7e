//! OBJ input for the LOD mesh processor.
//!
//! The loader only flattens the file into per-corner attribute arrays; vertex
//! deduplication and everything after it happens in the processor.

use std::path::Path;

use glam::Vec3;

use crate::error::{ErrorContext, RendererError, Result};

/// Phong material coefficients taken from the first material of the mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ns: f32,
    pub ka: [f32; 3],
    pub kd: [f32; 3],
    pub ks: [f32; 3],
    pub ke: [f32; 3],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ns: 0.0,
            ka: [0.2, 0.2, 0.2],
            kd: [0.7, 0.7, 0.7],
            ks: [0.2, 0.2, 0.2],
            ke: [0.0, 0.0, 0.0],
        }
    }
}

/// Triangle soup: one entry per face corner, three corners per face
#[derive(Debug, Clone, Default)]
pub struct MeshSource {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    /// Material reference per face
    pub face_materials: Vec<Option<usize>>,
    pub material: Material,
}

impl MeshSource {
    pub fn corner_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Unit cube with 8 shared corners and 12 triangles.
    ///
    /// Corner normals point away from the centre so each corner is one unique
    /// vertex after deduplication.
    pub fn cube() -> Self {
        let corners: [[f32; 3]; 8] = [
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ];
        const FACES: [[usize; 3]; 12] = [
            [0, 2, 1], [0, 3, 2], // -z
            [4, 5, 6], [4, 6, 7], // +z
            [0, 1, 5], [0, 5, 4], // -y
            [3, 7, 6], [3, 6, 2], // +y
            [0, 4, 7], [0, 7, 3], // -x
            [1, 2, 6], [1, 6, 5], // +x
        ];

        let mut source = MeshSource::default();
        for face in FACES {
            for corner in face {
                let p = corners[corner];
                source.positions.push(p);
                source.normals.push(Vec3::from(p).normalize().into());
                source.tex_coords.push([0.0, 0.0]);
            }
            source.face_materials.push(None);
        }
        source
    }
}

/// Load every model of an OBJ file into one triangle soup
pub fn load_obj(path: &Path) -> Result<MeshSource> {
    log::info!("[mesh::load_obj] Loading {}", path.display());

    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ..Default::default()
    };
    let (models, materials) = tobj::load_obj(path, &options).asset_context(path)?;

    let materials = match materials {
        Ok(materials) => materials,
        Err(e) => {
            log::warn!("[mesh::load_obj] Material library unavailable ({}), using defaults", e);
            Vec::new()
        }
    };

    let mut source = MeshSource::default();
    let mut first_material = None;

    for model in &models {
        let mesh = &model.mesh;
        let has_normals = !mesh.normals.is_empty();
        let has_tex = !mesh.texcoords.is_empty();

        if first_material.is_none() {
            first_material = mesh.material_id;
        }

        for (face_index, face) in mesh.indices.chunks_exact(3).enumerate() {
            let base = source.positions.len();
            for (corner, &index) in face.iter().enumerate() {
                let slot = face_index * 3 + corner;

                let pi = index as usize * 3;
                let position = mesh.positions.get(pi..pi + 3).ok_or_else(|| {
                    RendererError::asset(path, format!("position index {} out of range", index))
                })?;
                source.positions.push([position[0], position[1], position[2]]);

                let normal = if has_normals {
                    let ni = mesh.normal_indices.get(slot).copied().unwrap_or(index) as usize * 3;
                    mesh.normals
                        .get(ni..ni + 3)
                        .map(|n| [n[0], n[1], n[2]])
                        .unwrap_or([0.0; 3])
                } else {
                    [0.0; 3]
                };
                source.normals.push(normal);

                // OBJ puts v = 0 at the bottom, wgpu samples with v = 0 at the top
                let tex = if has_tex {
                    let ti = mesh.texcoord_indices.get(slot).copied().unwrap_or(index) as usize * 2;
                    mesh.texcoords
                        .get(ti..ti + 2)
                        .map(|t| [t[0], 1.0 - t[1]])
                        .unwrap_or([0.0; 2])
                } else {
                    [0.0; 2]
                };
                source.tex_coords.push(tex);
            }

            if !has_normals {
                fill_face_normal(&mut source, base);
            }
            source.face_materials.push(mesh.material_id);
        }
    }

    if let Some(material) = first_material.and_then(|id| materials.get(id)) {
        source.material = material_from_obj(material);
    }

    log::info!(
        "[mesh::load_obj] {} model(s), {} faces, {} material(s)",
        models.len(),
        source.face_count(),
        materials.len()
    );
    Ok(source)
}

/// Flat normal for the three corners starting at `base`
fn fill_face_normal(source: &mut MeshSource, base: usize) {
    let a = Vec3::from(source.positions[base]);
    let b = Vec3::from(source.positions[base + 1]);
    let c = Vec3::from(source.positions[base + 2]);
    let n: [f32; 3] = (b - a).cross(c - a).normalize_or_zero().into();
    source.normals[base..base + 3].fill(n);
}

fn material_from_obj(material: &tobj::Material) -> Material {
    let defaults = Material::default();
    let ke = material
        .unknown_param
        .get("Ke")
        .and_then(|raw| parse_triple(raw))
        .unwrap_or(defaults.ke);

    Material {
        ns: material.shininess.unwrap_or(defaults.ns),
        ka: material.ambient.unwrap_or(defaults.ka),
        kd: material.diffuse.unwrap_or(defaults.kd),
        ks: material.specular.unwrap_or(defaults.ks),
        ke,
    }
}

fn parse_triple(raw: &str) -> Option<[f32; 3]> {
    let mut parts = raw.split_whitespace().map(|p| p.parse::<f32>());
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    Some([x, y, z])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cube_has_twelve_faces() {
        let cube = MeshSource::cube();
        assert_eq!(cube.corner_count(), 36);
        assert_eq!(cube.face_count(), 12);
        assert_eq!(cube.face_materials.len(), 12);
    }

    #[test]
    fn loads_quad_and_computes_missing_normals() {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        writeln!(file, "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4").unwrap();

        let source = load_obj(file.path()).unwrap();
        assert_eq!(source.face_count(), 2);
        for n in &source.normals {
            assert!((n[2] - 1.0).abs() < 1e-6, "expected +z normal, got {:?}", n);
        }
        assert_eq!(source.material, Material::default());
    }

    #[test]
    fn missing_file_is_asset_error() {
        let err = load_obj(Path::new("does/not/exist.obj")).unwrap_err();
        assert!(matches!(err, RendererError::AssetLoad { .. }));
    }

    #[test]
    fn parses_emission_triple() {
        assert_eq!(parse_triple("0.1 0.2 0.3"), Some([0.1, 0.2, 0.3]));
        assert_eq!(parse_triple("0.1 oops"), None);
    }
}
