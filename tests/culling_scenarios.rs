//! End-to-end cull scenarios against the CPU reference of the cull shader

use glam::{Mat4, Quat, Vec2, Vec3};
use swarm_renderer::culling::{cull_all, cull_instance, CullParams, CullPhase, DrawCommand, PyramidLayout, PyramidLevels};
use swarm_renderer::mesh::{BoundingSphere, LodLevel, LodTable};
use swarm_renderer::{InstanceData, InstanceStore};

const SCREEN: u32 = 512;

fn table() -> LodTable {
    LodTable::new(vec![
        LodLevel::new(8.0, 0, 600),
        LodLevel::new(10.0, 600, 300),
        LodLevel::new(12.0, 900, 120),
        LodLevel::new(f32::MAX, 1020, 36),
    ])
}

/// Camera at the origin looking down -z
fn params(znear: f32, zfar: f32) -> CullParams {
    let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
    let projection = Mat4::perspective_rh(45f32.to_radians(), 1.0, znear, zfar);
    let bounds = BoundingSphere {
        center: Vec3::ZERO,
        radius: 1.0,
    };
    CullParams::new(view, projection, znear, zfar, Vec2::splat(SCREEN as f32), bounds)
}

fn at(position: Vec3, scale: f32) -> InstanceData {
    InstanceData::new(position, Quat::IDENTITY, scale)
}

#[test]
fn far_instance_selects_coarsest_level() {
    let mut p = params(0.1, 100.0);
    p.frustum_culling = false;
    let lod = table();

    for distance in [20.0, 500.0, 1.0e6] {
        let mut flag = 0;
        let out = cull_instance(0, &at(Vec3::new(0.0, 0.0, -distance), 1.0), CullPhase::Late, &p, &lod, None, &mut flag);
        assert_eq!(out.lod_level as usize, lod.coarsest());
        assert_eq!(out.command.first_index, 1020);
        assert_eq!(out.command.index_count, 36);
    }
}

#[test]
fn instance_outside_frustum_is_skipped() {
    let p = params(0.1, 100.0);
    let lod = table();
    let outside = [
        Vec3::new(0.0, 0.0, 10.0),   // behind
        Vec3::new(40.0, 0.0, -10.0), // right
        Vec3::new(-40.0, 0.0, -10.0),
        Vec3::new(0.0, 40.0, -10.0), // above
        Vec3::new(0.0, -40.0, -10.0),
        Vec3::new(0.0, 0.0, -500.0), // past far
    ];

    for position in outside {
        for phase in [CullPhase::Early, CullPhase::Late] {
            let mut flag = 1;
            let out = cull_instance(9, &at(position, 1.0), phase, &p, &lod, None, &mut flag);
            assert_eq!(out.command.instance_count, 0, "{:?} at {:?} should be culled", phase, position);
            assert_eq!(out.command.first_instance, 9);
            assert!(!out.visible);
        }
    }
}

#[test]
fn fully_occluded_instance_is_skipped() {
    // near 1, far 100: normalized depth 0.5 lies about 1.98 units out
    let p = params(1.0, 100.0);
    let nearest = 1.0 / (1.0 - 0.5 * 99.0 / 100.0);
    assert!((p.depth_at(nearest) - 0.5).abs() < 1e-4);

    let scale = 0.5;
    let instance = at(Vec3::new(0.0, 0.0, -(nearest + scale)), scale);
    let occluder = PyramidLevels::uniform(SCREEN, SCREEN, 0.1);

    let mut flag = 0;
    let out = cull_instance(0, &instance, CullPhase::Late, &p, &table(), Some(&occluder), &mut flag);
    assert_eq!(out.command.instance_count, 0);
    assert!(!out.visible);
    assert_eq!(flag, 0);

    // the same instance with nothing in front of it draws
    let open = PyramidLevels::uniform(SCREEN, SCREEN, 1.0);
    let mut flag = 0;
    let out = cull_instance(0, &instance, CullPhase::Late, &p, &table(), Some(&open), &mut flag);
    assert_eq!(out.command.instance_count, 1);
}

/// Depth image of nearest-possible depth with one far hole, screen pixels `[x0, x1) x [y0, y1)`
fn depth_with_gap(x0: u32, x1: u32, y0: u32, y1: u32) -> Vec<f32> {
    let mut depth = vec![0.0f32; (SCREEN * SCREEN) as usize];
    for y in y0..y1 {
        for x in x0..x1 {
            depth[(y * SCREEN + x) as usize] = 1.0;
        }
    }
    depth
}

#[test]
fn gap_inside_footprint_keeps_instance_visible() {
    let p = params(1.0, 100.0);
    // spans screen x 205..224; at mip 3 its corners land in texels 12 and 14, around the gap in 13
    let instance = at(Vec3::new(-2.67, 0.0, -40.0), 0.6);

    let gap = PyramidLevels::build(&depth_with_gap(208, 224, 246, 265), SCREEN, SCREEN);
    let mut flag = 0;
    let out = cull_instance(0, &instance, CullPhase::Late, &p, &table(), Some(&gap), &mut flag);
    assert_eq!(out.command.instance_count, 1, "instance seen through a gap was culled");
    assert_eq!(flag, 1);

    let wall = PyramidLevels::build(&depth_with_gap(0, 0, 0, 0), SCREEN, SCREEN);
    let mut flag = 0;
    let out = cull_instance(0, &instance, CullPhase::Late, &p, &table(), Some(&wall), &mut flag);
    assert_eq!(out.command.instance_count, 0);
}

#[test]
fn disabling_occlusion_ignores_the_pyramid() {
    let mut p = params(1.0, 100.0);
    p.occlusion_culling = false;
    let occluder = PyramidLevels::uniform(SCREEN, SCREEN, 0.0);

    let mut flag = 0;
    let out = cull_instance(0, &at(Vec3::new(0.0, 0.0, -5.0), 1.0), CullPhase::Late, &p, &table(), Some(&occluder), &mut flag);
    assert_eq!(out.command.instance_count, 1);
}

#[test]
fn slots_are_never_aliased() {
    let mut p = params(0.1, 100.0);
    p.frustum_culling = false;
    let mut store = InstanceStore::new(4096, Some(7));
    store.set(0, at(Vec3::new(0.0, 0.0, -3.0), 1.0));
    let mut visibility = vec![1u32; store.len()];

    for phase in [CullPhase::Early, CullPhase::Late] {
        let commands = cull_all(store.instances(), phase, &p, &table(), None, &mut visibility);
        assert_eq!(commands.len(), store.len());
        assert!(commands
            .iter()
            .enumerate()
            .all(|(slot, command)| command.first_instance == slot as u32));
        if phase == CullPhase::Early {
            assert_eq!(commands[0].instance_count, 1);
        }
    }
}

/// Two frames of the early/late protocol against a depth buffer that changes
/// between them.
#[test]
fn late_pass_catches_disoccluded_instances() {
    let p = params(1.0, 100.0);
    let lod = table();
    let instances = vec![at(Vec3::new(0.0, 0.0, -6.0), 1.0), at(Vec3::new(0.0, 0.0, -30.0), 1.0)];
    let mut visibility = vec![0u32; instances.len()];

    // first frame: the pyramid starts cleared, so nothing draws early and
    // the late pass draws everything in view
    let cleared = PyramidLevels::uniform(SCREEN, SCREEN, 1.0);
    let early = cull_all(&instances, CullPhase::Early, &p, &lod, Some(&cleared), &mut visibility);
    assert!(early.iter().all(|c| c.instance_count == 0));
    let late = cull_all(&instances, CullPhase::Late, &p, &lod, Some(&cleared), &mut visibility);
    assert!(late.iter().all(|c| c.instance_count == 1));
    assert_eq!(visibility, vec![1, 1]);

    // second frame: both are drawn early; a wall at distance 10 then hides the far one
    let early = cull_all(&instances, CullPhase::Early, &p, &lod, Some(&cleared), &mut visibility);
    assert!(early.iter().all(|c| c.instance_count == 1));
    let wall = PyramidLevels::uniform(SCREEN, SCREEN, p.depth_at(10.0));
    let late = cull_all(&instances, CullPhase::Late, &p, &lod, Some(&wall), &mut visibility);
    assert!(late.iter().all(|c| c.instance_count == 0), "late pass must not redraw early draws");
    assert_eq!(visibility, vec![1, 0]);

    // third frame: the far one is a candidate no longer
    let early = cull_all(&instances, CullPhase::Early, &p, &lod, Some(&wall), &mut visibility);
    assert_eq!(early[0].instance_count, 1);
    assert_eq!(early[1], DrawCommand::hidden(1));
}

#[test]
fn pyramid_levels_halve_down_to_one() {
    for (w, h) in [(1280, 720), (1920, 1080), (800, 600), (3, 1), (1, 1)] {
        let layout = PyramidLayout::new(w, h);
        let base = w.max(h).next_power_of_two();
        assert_eq!(layout.levels[0], ((base / 2).max(1), (base / 2).max(1)));
        for pair in layout.levels.windows(2) {
            assert_eq!(pair[1].0, pair[0].0.div_ceil(2));
            assert_eq!(pair[1].1, pair[0].1.div_ceil(2));
        }
        assert_eq!(*layout.levels.last().unwrap(), (1, 1));
    }
    assert_eq!(PyramidLayout::new(1280, 720).level_count(), 11);
}
