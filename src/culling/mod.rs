//! GPU cull & LOD-select stage: shared data layouts and CPU reference.
//!
//! The compute shader and [`cull::cull_instance`] implement the same
//! function; the structs here are the contract between them.

pub mod cull;
pub mod pyramid;

use bytemuck::{Pod, Zeroable};

pub use cull::{cull_all, cull_instance, CullOutcome, CullParams, CullPhase, DepthSource};
pub use pyramid::{PyramidLayout, PyramidLevels};

use crate::mesh::LodTableGpu;

/// GPU indirect draw indexed command structure
/// Matches wgpu's DrawIndexedIndirect command layout exactly
/// Total size: 20 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawCommand {
    /// Number of indices to draw
    pub index_count: u32,

    /// 0 skips the slot, 1 draws it
    pub instance_count: u32,

    /// Offset into the packed LOD index buffer
    pub first_index: u32,

    /// Value added to each index before fetching vertex
    pub base_vertex: i32,

    /// Instance slot; always the slot this command lives in
    pub first_instance: u32,
}

impl DrawCommand {
    pub const SIZE: u64 = std::mem::size_of::<DrawCommand>() as u64;

    /// Zero-instance command for a culled slot
    pub fn hidden(slot: u32) -> Self {
        Self {
            first_instance: slot,
            ..Self::default()
        }
    }
}

/// Per-instance record written by the cull shader for the debug views (32 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceDebug {
    /// UV-space bounds from the late pass; all zero when not visible
    pub screen_bounds: [f32; 4],
    /// LOD level of the last draw
    pub lod_level: u32,
    pub _padding: [u32; 3],
}

impl InstanceDebug {
    pub const SIZE: u64 = std::mem::size_of::<InstanceDebug>() as u64;
}

/// Uniform block of the cull shader (272 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CullUniforms {
    pub view: [[f32; 4]; 4],
    pub p00: f32,
    pub p11: f32,
    pub znear: f32,
    pub zfar: f32,
    pub depth_a: f32,
    pub depth_b: f32,
    pub screen_width: f32,
    pub screen_height: f32,
    pub sphere_center: [f32; 3],
    pub sphere_radius: f32,
    pub instance_count: u32,
    pub pyramid_levels: u32,
    pub phase: u32,
    pub flags: u32,
    pub lod: LodTableGpu,
}

impl CullUniforms {
    pub const FRUSTUM: u32 = 1;
    pub const OCCLUSION: u32 = 1 << 1;
}
