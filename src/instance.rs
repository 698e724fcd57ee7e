//! Instance transform store
//!
//! A fixed population of mesh instances, identified only by their slot.
//! Placement is random (optionally seeded) and regenerated whenever the
//! per-resolution resources are rebuilt.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::util::DeviceExt;

use crate::constants::instances;

/// Per-instance GPU record (80 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Translation * rotation * scale
    pub model: [[f32; 4]; 4],
    /// Uniform scale, duplicated from `model` for the cull stage
    pub scale: f32,
    pub _padding: [f32; 3],
}

impl InstanceData {
    pub fn new(translation: Vec3, rotation: Quat, scale: f32) -> Self {
        let model = Mat4::from_translation(translation)
            * Mat4::from_quat(rotation)
            * Mat4::from_scale(Vec3::splat(scale));
        Self {
            model: model.to_cols_array_2d(),
            scale,
            _padding: [0.0; 3],
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.model)
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::from_slice(&self.model[3][..3])
    }

    /// Vertex buffer layout when the transform is fed per instance
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // Model matrix - 4 vec4s
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 48,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // Scale
                wgpu::VertexAttribute {
                    offset: 64,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

/// CPU side of the instance population
pub struct InstanceStore {
    instances: Vec<InstanceData>,
    rng: StdRng,
}

impl InstanceStore {
    /// Scatter `count` instances; a seed makes the sequence of placements reproducible
    pub fn new(count: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut store = Self {
            instances: Vec::with_capacity(count as usize),
            rng,
        };
        store.instances.resize(count as usize, InstanceData::zeroed());
        store.regenerate();
        store
    }

    /// Draw a fresh random transform for every slot
    pub fn regenerate(&mut self) {
        let offset = Vec3::from(instances::CENTER_OFFSET);
        let tau = std::f32::consts::TAU;

        for slot in self.instances.iter_mut() {
            let translation = Vec3::new(
                self.rng.gen_range(-instances::SPREAD..instances::SPREAD),
                self.rng.gen_range(-instances::SPREAD..instances::SPREAD),
                self.rng.gen_range(-instances::SPREAD..instances::SPREAD),
            ) + offset;
            let scale = self.rng.gen_range(instances::MIN_SCALE..instances::MAX_SCALE);
            let rotation = Quat::from_rotation_x(self.rng.gen_range(0.0..tau))
                * Quat::from_rotation_y(self.rng.gen_range(0.0..tau))
                * Quat::from_rotation_z(self.rng.gen_range(0.0..tau));

            *slot = InstanceData::new(translation, rotation, scale);
        }

        log::debug!("[InstanceStore::regenerate] Placed {} instances", self.instances.len());
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[InstanceData] {
        &self.instances
    }

    /// Overwrite one slot, for externally driven transforms
    pub fn set(&mut self, slot: usize, instance: InstanceData) {
        self.instances[slot] = instance;
    }
}

/// GPU buffers backing the instance population
pub struct InstanceBuffers {
    transforms: wgpu::Buffer,
    /// One u32 per slot: set when the instance was visible at the end of the last frame
    visibility: wgpu::Buffer,
    count: u32,
}

impl InstanceBuffers {
    pub fn new(device: &wgpu::Device, store: &InstanceStore) -> Self {
        let transforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Transform Buffer"),
            contents: bytemuck::cast_slice(store.instances()),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let zeroed = vec![0u32; store.len()];
        let visibility = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Instance Visibility Buffer"),
            contents: bytemuck::cast_slice(&zeroed),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            transforms,
            visibility,
            count: store.len() as u32,
        }
    }

    /// Push the store's transforms and forget last frame's visibility
    pub fn upload(&self, queue: &wgpu::Queue, store: &InstanceStore) {
        assert_eq!(store.len() as u32, self.count, "instance population changed size");
        queue.write_buffer(&self.transforms, 0, bytemuck::cast_slice(store.instances()));
        self.reset_visibility(queue);
    }

    pub fn reset_visibility(&self, queue: &wgpu::Queue) {
        let zeroed = vec![0u32; self.count as usize];
        queue.write_buffer(&self.visibility, 0, bytemuck::cast_slice(&zeroed));
    }

    pub fn transforms(&self) -> &wgpu::Buffer {
        &self.transforms
    }

    pub fn visibility(&self) -> &wgpu::Buffer {
        &self.visibility
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_eighty_bytes() {
        assert_eq!(std::mem::size_of::<InstanceData>(), 80);
    }

    #[test]
    fn placements_stay_in_bounds() {
        let store = InstanceStore::new(2000, Some(42));
        let center = Vec3::from(instances::CENTER_OFFSET);
        for instance in store.instances() {
            let local = instance.translation() - center;
            assert!(local.abs().max_element() <= instances::SPREAD);
            assert!(instance.scale >= instances::MIN_SCALE && instance.scale < instances::MAX_SCALE);
        }
    }

    #[test]
    fn matrix_scale_matches_scalar() {
        let store = InstanceStore::new(64, Some(1));
        for instance in store.instances() {
            let (scale, _, _) = instance.model_matrix().to_scale_rotation_translation();
            assert!((scale.x - instance.scale).abs() < 1e-4);
            assert!((scale.y - instance.scale).abs() < 1e-4);
            assert!((scale.z - instance.scale).abs() < 1e-4);
        }
    }

    #[test]
    fn seeded_stores_agree() {
        let a = InstanceStore::new(100, Some(9));
        let b = InstanceStore::new(100, Some(9));
        assert_eq!(a.instances(), b.instances());
    }

    #[test]
    fn regenerate_moves_instances() {
        let mut store = InstanceStore::new(100, Some(3));
        let before = store.instances().to_vec();
        store.regenerate();
        assert_eq!(store.len(), 100);
        assert_ne!(store.instances(), &before[..]);
    }
}
