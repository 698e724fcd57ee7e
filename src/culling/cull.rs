//! Per-instance cull and LOD selection.
//!
//! CPU reference of `shaders/cull.wgsl`. Each instance writes only its own
//! slot, so the whole population runs in parallel with rayon exactly as the
//! compute dispatch does on the GPU.

use glam::{Mat4, Vec2, Vec3, Vec4};
use rayon::prelude::*;

use crate::instance::InstanceData;
use crate::mesh::{BoundingSphere, LodTable};

use super::{CullUniforms, DrawCommand};

/// Read access to a depth pyramid
pub trait DepthSource: Sync {
    fn level_count(&self) -> u32;
    fn level_size(&self, level: u32) -> (u32, u32);
    /// Texel load with coordinates clamped to the level
    fn load(&self, level: u32, x: u32, y: u32) -> f32;
}

/// Which of the two per-frame passes is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullPhase {
    /// Tests against last frame's pyramid; only instances visible last frame are candidates
    Early,
    /// Tests against this frame's pyramid; draws what the early pass missed
    Late,
}

impl CullPhase {
    pub fn as_u32(self) -> u32 {
        match self {
            CullPhase::Early => 0,
            CullPhase::Late => 1,
        }
    }
}

/// Camera-derived inputs of the cull function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullParams {
    pub view: Mat4,
    /// Projection x and y scale terms
    pub p00: f32,
    pub p11: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Depth of a view-space point at distance `d` in front of the camera is `a + b / d`
    pub depth_a: f32,
    pub depth_b: f32,
    pub screen_size: Vec2,
    pub bounds: BoundingSphere,
    pub frustum_culling: bool,
    pub occlusion_culling: bool,
}

impl CullParams {
    /// Derive the parameters from a right-handed wgpu perspective projection
    pub fn new(view: Mat4, projection: Mat4, znear: f32, zfar: f32, screen_size: Vec2, bounds: BoundingSphere) -> Self {
        // clip.z = m22 * z + m32, clip.w = -z; with d = -z the depth is -m22 + m32 / d
        let m22 = projection.z_axis.z;
        let m32 = projection.w_axis.z;
        Self {
            view,
            p00: projection.x_axis.x,
            p11: projection.y_axis.y,
            znear,
            zfar,
            depth_a: -m22,
            depth_b: m32,
            screen_size,
            bounds,
            frustum_culling: true,
            occlusion_culling: true,
        }
    }

    /// Normalized depth of a point `distance` units in front of the camera
    pub fn depth_at(&self, distance: f32) -> f32 {
        self.depth_a + self.depth_b / distance
    }

    pub fn to_uniforms(&self, phase: CullPhase, instance_count: u32, pyramid_levels: u32, lod: &LodTable) -> CullUniforms {
        let mut flags = 0;
        if self.frustum_culling {
            flags |= CullUniforms::FRUSTUM;
        }
        if self.occlusion_culling {
            flags |= CullUniforms::OCCLUSION;
        }
        CullUniforms {
            view: self.view.to_cols_array_2d(),
            p00: self.p00,
            p11: self.p11,
            znear: self.znear,
            zfar: self.zfar,
            depth_a: self.depth_a,
            depth_b: self.depth_b,
            screen_width: self.screen_size.x,
            screen_height: self.screen_size.y,
            sphere_center: self.bounds.center.into(),
            sphere_radius: self.bounds.radius,
            instance_count,
            pyramid_levels,
            phase: phase.as_u32(),
            flags,
            lod: lod.to_gpu(),
        }
    }
}

/// Result of culling one instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullOutcome {
    pub command: DrawCommand,
    /// Passed frustum and occlusion in this pass
    pub visible: bool,
    pub lod_level: u32,
}

/// Conservative UV-space bounds of a sphere given in view space (camera looks down -z).
///
/// Returns `None` when the sphere reaches the near plane and cannot be projected.
pub fn project_sphere(center: Vec3, radius: f32, znear: f32, p00: f32, p11: f32) -> Option<Vec4> {
    // forward-positive depth
    let c = Vec3::new(center.x, center.y, -center.z);
    if c.z < radius + znear {
        return None;
    }

    let cr = c * radius;
    let czr2 = c.z * c.z - radius * radius;

    let vx = (c.x * c.x + czr2).sqrt();
    let minx = (vx * c.x - cr.z) / (vx * c.z + cr.x);
    let maxx = (vx * c.x + cr.z) / (vx * c.z - cr.x);

    let vy = (c.y * c.y + czr2).sqrt();
    let miny = (vy * c.y - cr.z) / (vy * c.z + cr.y);
    let maxy = (vy * c.y + cr.z) / (vy * c.z - cr.y);

    // NDC to UV, v grows downward
    Some(Vec4::new(
        minx * p00 * 0.5 + 0.5,
        -maxy * p11 * 0.5 + 0.5,
        maxx * p00 * 0.5 + 0.5,
        -miny * p11 * 0.5 + 0.5,
    ))
}

/// Sphere against the four side planes plus near and far
pub fn sphere_in_frustum(center: Vec3, radius: f32, params: &CullParams) -> bool {
    let depth = -center.z;

    let nx = Vec2::new(params.p00.abs(), 1.0).normalize();
    let ny = Vec2::new(params.p11.abs(), 1.0).normalize();

    depth * nx.y - center.x.abs() * nx.x > -radius
        && depth * ny.y - center.y.abs() * ny.x > -radius
        && depth + radius > params.znear
        && depth - radius < params.zfar
}

/// Max pyramid depth under a UV rectangle, sampled at the finest mip whose texels cover it
pub fn sample_pyramid(aabb: Vec4, params: &CullParams, pyramid: &dyn DepthSource) -> f32 {
    // Mip 0 holds one texel per 2x2 screen pixels
    let level0 = params.screen_size * 0.5;
    let width = (aabb.z - aabb.x) * level0.x;
    let height = (aabb.w - aabb.y) * level0.y;

    let max_level = pyramid.level_count().saturating_sub(1) as f32;
    // At this level the rectangle is at most one texel wide, so it touches at most 2x2 texels
    let level = width.max(height).max(1.0).log2().ceil().clamp(0.0, max_level) as u32;

    let scale = 1.0 / (1u32 << level) as f32;
    let (lw, lh) = pyramid.level_size(level);
    let texel = |u: f32, v: f32| {
        let x = (u.clamp(0.0, 1.0) * level0.x * scale) as u32;
        let y = (v.clamp(0.0, 1.0) * level0.y * scale) as u32;
        (x.min(lw - 1), y.min(lh - 1))
    };

    let (x0, y0) = texel(aabb.x, aabb.y);
    let (x1, y1) = texel(aabb.z, aabb.w);
    pyramid
        .load(level, x0, y0)
        .max(pyramid.load(level, x1, y0))
        .max(pyramid.load(level, x0, y1))
        .max(pyramid.load(level, x1, y1))
}

/// Cull one instance and build the command for its slot.
///
/// `visibility` is the instance's flag: "drawn last frame" on entry to the
/// early pass, "drawn early" on entry to the late pass. It is updated in place.
pub fn cull_instance(
    slot: u32,
    instance: &InstanceData,
    phase: CullPhase,
    params: &CullParams,
    lod: &LodTable,
    pyramid: Option<&dyn DepthSource>,
    visibility: &mut u32,
) -> CullOutcome {
    let hidden = CullOutcome {
        command: DrawCommand::hidden(slot),
        visible: false,
        lod_level: 0,
    };

    if phase == CullPhase::Early && *visibility == 0 {
        return hidden;
    }

    let model = instance.model_matrix();
    let world_center = model.transform_point3(params.bounds.center);
    let center = params.view.transform_point3(world_center);
    let radius = params.bounds.radius * instance.scale;

    let mut visible = !params.frustum_culling || sphere_in_frustum(center, radius, params);

    if visible && params.occlusion_culling {
        if let (Some(pyramid), Some(aabb)) = (pyramid, project_sphere(center, radius, params.znear, params.p00, params.p11)) {
            let pyramid_depth = sample_pyramid(aabb, params, pyramid);
            let sphere_depth = params.depth_at(-center.z - radius);
            visible = sphere_depth <= pyramid_depth;
        }
    }

    let draw = match phase {
        CullPhase::Early => visible,
        CullPhase::Late => visible && *visibility == 0,
    };

    *visibility = match phase {
        CullPhase::Early => draw as u32,
        CullPhase::Late => visible as u32,
    };

    // Larger instances stay detailed for longer
    let distance = center.length() / instance.scale.max(f32::EPSILON);
    let lod_level = lod.select(distance);

    if !draw {
        return CullOutcome {
            visible,
            lod_level: lod_level as u32,
            ..hidden
        };
    }

    let level = lod.level(lod_level);
    CullOutcome {
        command: DrawCommand {
            index_count: level.index_count,
            instance_count: 1,
            first_index: level.index_offset,
            base_vertex: 0,
            first_instance: slot,
        },
        visible,
        lod_level: lod_level as u32,
    }
}

/// Run one pass over the whole population
pub fn cull_all(
    instances: &[InstanceData],
    phase: CullPhase,
    params: &CullParams,
    lod: &LodTable,
    pyramid: Option<&dyn DepthSource>,
    visibility: &mut [u32],
) -> Vec<DrawCommand> {
    assert_eq!(instances.len(), visibility.len(), "one visibility flag per instance");

    instances
        .par_iter()
        .zip(visibility.par_iter_mut())
        .enumerate()
        .map(|(slot, (instance, flag))| {
            cull_instance(slot as u32, instance, phase, params, lod, pyramid, flag).command
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::PyramidLevels;
    use crate::mesh::LodLevel;
    use glam::Quat;

    fn table() -> LodTable {
        LodTable::new(vec![
            LodLevel::new(8.0, 0, 300),
            LodLevel::new(10.0, 300, 150),
            LodLevel::new(f32::MAX, 450, 30),
        ])
    }

    fn params() -> CullParams {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, 100.0);
        let bounds = BoundingSphere { center: Vec3::ZERO, radius: 1.0 };
        CullParams::new(view, proj, 0.1, 100.0, Vec2::new(512.0, 512.0), bounds)
    }

    fn at(position: Vec3, scale: f32) -> InstanceData {
        InstanceData::new(position, Quat::IDENTITY, scale)
    }

    #[test]
    fn depth_terms_match_projection() {
        let p = params();
        let proj = Mat4::perspective_rh(45f32.to_radians(), 1.0, 0.1, 100.0);
        for d in [0.1, 1.0, 50.0, 100.0] {
            let clip = proj * Vec4::new(0.0, 0.0, -d, 1.0);
            assert!((clip.z / clip.w - p.depth_at(d)).abs() < 1e-5);
        }
    }

    #[test]
    fn visible_instance_gets_a_draw() {
        let p = params();
        let mut flag = 1;
        let out = cull_instance(3, &at(Vec3::new(0.0, 0.0, -5.0), 1.0), CullPhase::Early, &p, &table(), None, &mut flag);
        assert_eq!(out.command.instance_count, 1);
        assert_eq!(out.command.first_instance, 3);
        assert_eq!(out.command.index_count, 300);
        assert_eq!(flag, 1);
    }

    #[test]
    fn instance_behind_camera_is_culled() {
        let p = params();
        let mut flag = 0;
        let out = cull_instance(0, &at(Vec3::new(0.0, 0.0, 20.0), 1.0), CullPhase::Late, &p, &table(), None, &mut flag);
        assert_eq!(out.command.instance_count, 0);
        assert!(!out.visible);
        assert_eq!(flag, 0);
    }

    #[test]
    fn scale_stretches_lod_bands() {
        let p = params();
        let mut flag = 0;
        let near_small = cull_instance(0, &at(Vec3::new(0.0, 0.0, -9.0), 1.0), CullPhase::Late, &p, &table(), None, &mut flag);
        assert_eq!(near_small.lod_level, 1);

        let mut flag = 0;
        let near_big = cull_instance(0, &at(Vec3::new(0.0, 0.0, -9.0), 2.0), CullPhase::Late, &p, &table(), None, &mut flag);
        assert_eq!(near_big.lod_level, 0);
    }

    #[test]
    fn early_pass_skips_previously_hidden() {
        let p = params();
        let mut flag = 0;
        let out = cull_instance(0, &at(Vec3::new(0.0, 0.0, -5.0), 1.0), CullPhase::Early, &p, &table(), None, &mut flag);
        assert_eq!(out.command.instance_count, 0);
        assert_eq!(flag, 0);
    }

    #[test]
    fn late_pass_does_not_redraw_early_draws() {
        let p = params();
        let instance = at(Vec3::new(0.0, 0.0, -5.0), 1.0);
        let mut flag = 1;
        let early = cull_instance(0, &instance, CullPhase::Early, &p, &table(), None, &mut flag);
        assert_eq!(early.command.instance_count, 1);

        let late = cull_instance(0, &instance, CullPhase::Late, &p, &table(), None, &mut flag);
        assert_eq!(late.command.instance_count, 0);
        assert!(late.visible);
        assert_eq!(flag, 1);
    }

    #[test]
    fn occluder_behind_instance_does_not_hide_it() {
        let p = params();
        let far = PyramidLevels::uniform(512, 512, 0.999);
        let mut flag = 0;
        let out = cull_instance(0, &at(Vec3::new(0.0, 0.0, -5.0), 1.0), CullPhase::Late, &p, &table(), Some(&far), &mut flag);
        assert_eq!(out.command.instance_count, 1);
    }

    #[test]
    fn projected_bounds_are_ordered() {
        let p = params();
        let aabb = project_sphere(Vec3::new(1.0, -0.5, -6.0), 0.5, p.znear, p.p00, p.p11).unwrap();
        assert!(aabb.x < aabb.z);
        assert!(aabb.y < aabb.w);
        // right of centre maps to u > 0.5, below centre to v > 0.5
        assert!(aabb.x > 0.5);
        assert!(aabb.y > 0.5);
    }

    #[test]
    fn sphere_touching_near_plane_is_not_projected() {
        let p = params();
        assert!(project_sphere(Vec3::new(0.0, 0.0, -0.5), 1.0, p.znear, p.p00, p.p11).is_none());
    }

    #[test]
    fn cull_all_fills_every_slot() {
        let p = params();
        let instances: Vec<_> = (0..256).map(|i| at(Vec3::new(0.0, 0.0, -2.0 - i as f32), 1.0)).collect();
        let mut visibility = vec![0u32; instances.len()];
        let commands = cull_all(&instances, CullPhase::Late, &p, &table(), None, &mut visibility);

        assert_eq!(commands.len(), 256);
        for (slot, command) in commands.iter().enumerate() {
            assert_eq!(command.first_instance, slot as u32);
        }
    }
}
