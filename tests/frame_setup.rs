//! Frame plan, configuration and per-frame uniforms without a GPU

use std::io::Write;

use swarm_renderer::culling::PyramidLayout;
use swarm_renderer::mesh::{LodMesh, LodSettings, MeshSource};
use swarm_renderer::renderer::frame_graph::{Access, FrameResource, PlanError, StageDecl};
use swarm_renderer::renderer::{FramePlan, FrameStage, FrameUniforms};
use swarm_renderer::{Camera, DebugSettings, DisplayMode, RendererConfig, RendererError};

#[test]
fn standard_frame_runs_both_cull_phases_in_order() {
    let plan = FramePlan::standard();
    assert_eq!(plan.validate(), Ok(()));

    let stages: Vec<FrameStage> = plan.stages().collect();
    assert_eq!(stages, FrameStage::ORDER.to_vec());
    let position = |stage| stages.iter().position(|&s| s == stage).unwrap();
    assert!(position(FrameStage::EarlyCull) < position(FrameStage::ShadowPass));
    assert!(position(FrameStage::EarlyGeometryPass) < position(FrameStage::DepthPyramidBuild));
    assert!(position(FrameStage::DepthPyramidBuild) < position(FrameStage::LateCull));
    assert!(position(FrameStage::LateCull) < position(FrameStage::LateGeometryPass));
}

#[test]
fn shadow_pass_reading_late_commands_is_rejected() {
    let stages = FrameStage::ORDER
        .iter()
        .map(|&stage| match stage {
            FrameStage::ShadowPass => StageDecl::new(
                stage,
                vec![
                    Access::Read(FrameResource::LateIndirect),
                    Access::Write(FrameResource::ShadowMap),
                ],
            ),
            other => StageDecl::standard(other),
        })
        .collect();

    assert_eq!(
        FramePlan::new(stages).validate(),
        Err(PlanError::ReadBeforeWrite {
            stage: FrameStage::ShadowPass,
            resource: FrameResource::LateIndirect,
        })
    );
}

#[test]
fn truncated_plan_is_rejected() {
    let stages = FrameStage::ORDER[..7].iter().map(|&s| StageDecl::standard(s)).collect();
    assert_eq!(FramePlan::new(stages).validate(), Err(PlanError::StageCount(7, 8)));
}

#[test]
fn config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
instance_count = 2048
lod_levels = 4
seed = 99
model_path = "assets/bunny.obj"

[window]
width = 800
height = 600
vsync = false
"#
    )
    .expect("write config");

    let config = RendererConfig::load(file.path()).expect("valid config");
    assert_eq!(config.instance_count, 2048);
    assert_eq!(config.lod_levels, 4);
    assert_eq!(config.seed, Some(99));
    assert_eq!(config.window.width, 800);
    assert!(!config.window.vsync);
    assert_eq!(config.window.title, RendererConfig::default().window.title);
    assert_eq!(config.frames_in_flight, RendererConfig::default().frames_in_flight);

    let settings = LodSettings::from(&config);
    assert_eq!(settings.levels, 4);
    let mesh = LodMesh::build(&MeshSource::cube(), &settings);
    assert_eq!(mesh.table.len(), 4);
}

#[test]
fn invalid_config_file_is_a_config_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "frames_in_flight = 9").expect("write config");
    assert!(matches!(RendererConfig::load(file.path()), Err(RendererError::Config(_))));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = RendererConfig::load(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(RendererError::Io(_))));
}

#[test]
fn uniforms_follow_debug_settings() {
    let mesh = LodMesh::build(&MeshSource::cube(), &LodSettings::default());
    let camera = Camera::new(1280, 720);
    let mut settings = DebugSettings::new(mesh.material, &mesh.table);
    let levels = PyramidLayout::new(1280, 720).level_count();

    let uniforms = FrameUniforms::new(&camera, &settings, (1280, 720), levels, mesh.bounds);
    assert_eq!(uniforms.display_mode, DisplayMode::Composed.code());
    assert_eq!(
        uniforms.flags,
        FrameUniforms::MODEL | FrameUniforms::TEXTURE | FrameUniforms::LIGHTING | FrameUniforms::PCF
    );
    assert_eq!(uniforms.pyramid_levels, 11);
    assert_eq!(uniforms.lod_level_count, 5);

    settings.pcf_enabled = false;
    settings.texture_enabled = false;
    settings.display_mode = DisplayMode::PyramidMip(3);
    let uniforms = FrameUniforms::new(&camera, &settings, (1280, 720), levels, mesh.bounds);
    assert_eq!(uniforms.flags, FrameUniforms::MODEL | FrameUniforms::LIGHTING);
    assert_eq!(uniforms.display_mode, 10);
    assert_eq!(DisplayMode::from_code(uniforms.display_mode), Some(DisplayMode::PyramidMip(3)));
}

#[test]
fn mip_view_never_leaves_the_pyramid() {
    let levels = PyramidLayout::new(1280, 720).level_count();
    let mut mode = DisplayMode::PyramidMip(0);
    for _ in 0..50 {
        mode = mode.step_mip(1, levels);
    }
    assert_eq!(mode, DisplayMode::PyramidMip(levels - 1));
    assert!(mode.code() <= 20);
}
