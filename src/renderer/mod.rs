//! Two-phase GPU-driven renderer
//!
//! Each frame runs the stages of [`FramePlan`] in order: early cull of the
//! instances visible last frame, shadow and deferred geometry + lighting for
//! them, a depth pyramid from the resulting depth, a late cull of everything
//! against that pyramid, then geometry + lighting for the newly visible ones.
//!
//! Resources are split by lifetime. Persistent resources (mesh, textures,
//! pipelines, frame slots) are created once. Per-resolution resources
//! (G-buffer, depth pyramid and everything bound to them) are rebuilt on
//! every resize, which also re-scatters the instances.

pub mod bounds_pass;
pub mod cull_pass;
pub mod debug;
pub mod depth_pyramid;
pub mod frame_graph;
pub mod geometry_pass;
pub mod lighting_pass;
pub mod resources;
pub mod shadow_pass;
pub mod uniforms;

use std::time::Instant;

use glam::Vec2;

use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::constants::frames;
use crate::culling::{CullParams, CullPhase};
use crate::error::Result;
use crate::gpu::{FrameRing, FrameSlot, GpuContext, PerfCounters, TextureImage};
use crate::instance::{InstanceBuffers, InstanceStore};
use crate::mesh::{load_obj, LodMesh, LodSettings};

pub use debug::{DebugSettings, DisplayMode, FrameStats, LogOverlay, OverlayRenderer};
pub use frame_graph::{FramePlan, FrameStage};
pub use uniforms::FrameUniforms;

use bounds_pass::BoundsPass;
use cull_pass::CullPass;
use depth_pyramid::{DepthPyramid, DepthPyramidPass};
use geometry_pass::GeometryPass;
use lighting_pass::LightingPass;
use resources::{AlbedoTexture, GBuffer, MeshBuffers, ShadowMap};
use shadow_pass::ShadowPass;

/// Created once at startup
struct PersistentResources {
    mesh: LodMesh,
    mesh_buffers: MeshBuffers,
    /// Only referenced through the geometry bind groups
    _albedo: AlbedoTexture,
    shadow_map: ShadowMap,
    instance_buffers: InstanceBuffers,
    instance_debug: wgpu::Buffer,
    frames: FrameRing,

    cull: CullPass,
    pyramid: DepthPyramidPass,
    shadow: ShadowPass,
    geometry: GeometryPass,
    lighting: LightingPass,
    bounds: BoundsPass,

    /// Per frame slot
    shadow_groups: Vec<wgpu::BindGroup>,
    geometry_groups: Vec<wgpu::BindGroup>,
    bounds_group: wgpu::BindGroup,
}

/// Rebuilt whenever the surface size changes
struct ResolutionResources {
    width: u32,
    height: u32,
    gbuffer: GBuffer,
    pyramid: DepthPyramid,
    pyramid_groups: Vec<wgpu::BindGroup>,
    /// Per frame slot, early then late
    cull_groups: Vec<[wgpu::BindGroup; 2]>,
    /// Per frame slot
    lighting_groups: Vec<wgpu::BindGroup>,
}

pub struct Renderer {
    gpu: GpuContext,
    plan: FramePlan,
    persistent: PersistentResources,
    /// `None` while the window is minimised
    resolution: Option<ResolutionResources>,
    instances: InstanceStore,

    pub camera: Camera,
    pub settings: DebugSettings,

    perf: PerfCounters,
    overlay: Option<Box<dyn OverlayRenderer>>,
    frame_count: u64,
    last_frame: Instant,
}

impl Renderer {
    pub fn new(gpu: GpuContext, config: &RendererConfig) -> Result<Self> {
        log::info!("[Renderer::new] Setting up renderer");

        let plan = FramePlan::standard();
        plan.validate()?;

        let instances = InstanceStore::new(config.instance_count, config.seed);
        let persistent = create_persistent_resources(&gpu, config, &instances)?;
        let settings = DebugSettings::new(persistent.mesh.material, &persistent.mesh.table);

        let (width, height) = gpu.size();
        let mut renderer = Self {
            camera: Camera::new(width, height),
            settings,
            gpu,
            plan,
            persistent,
            resolution: None,
            instances,
            perf: PerfCounters::new(frames::PERF_HISTORY),
            overlay: None,
            frame_count: 0,
            last_frame: Instant::now(),
        };
        renderer.resize(width, height);

        log::info!(
            "[Renderer::new] Ready: {} instances, {} LOD levels, {} frames in flight",
            renderer.persistent.instance_buffers.count(),
            renderer.persistent.mesh.table.len(),
            renderer.persistent.frames.len()
        );
        Ok(renderer)
    }

    pub fn size(&self) -> (u32, u32) {
        self.gpu.size()
    }

    pub fn is_minimized(&self) -> bool {
        self.resolution.is_none()
    }

    pub fn perf(&self) -> &PerfCounters {
        &self.perf
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn instance_count(&self) -> u32 {
        self.persistent.instance_buffers.count()
    }

    /// Mip count of the current pyramid; 0 while minimised
    pub fn pyramid_levels(&self) -> u32 {
        self.resolution.as_ref().map_or(0, |r| r.pyramid.level_count())
    }

    pub fn set_overlay(&mut self, overlay: Box<dyn OverlayRenderer>) {
        self.overlay = Some(overlay);
    }

    /// Rebuild everything that depends on the surface size.
    ///
    /// A zero size means the window is minimised: rendering is skipped until
    /// the next non-zero resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::info!("[Renderer::resize] Window minimised, pausing rendering");
            self.resolution = None;
            return;
        }

        log::info!("[Renderer::resize] Resizing to {}x{}", width, height);
        self.gpu.wait_idle();
        self.gpu.resize(width, height);
        self.camera.resize(width, height);
        self.persistent.frames.reset();

        let resolution = create_per_resolution_resources(&self.gpu, &self.persistent, &mut self.instances, width, height);
        self.resolution = Some(resolution);
    }

    /// Re-scatter the instances without touching the render targets
    pub fn regenerate_instances(&mut self) {
        self.gpu.wait_idle();
        self.instances.regenerate();
        self.persistent.instance_buffers.upload(&self.gpu.queue, &self.instances);
        log::info!("[Renderer::regenerate_instances] Placed {} instances", self.instances.len());
    }

    /// Write this frame's uniforms into the current slot
    fn update_uniforms(&mut self) {
        let Some(resolution) = self.resolution.as_ref() else {
            return;
        };

        self.settings.apply_lod_distances(&mut self.persistent.mesh.table);

        let screen = (resolution.width, resolution.height);
        let levels = resolution.pyramid.level_count();
        let bounds = self.persistent.mesh.bounds;
        let count = self.persistent.instance_buffers.count();
        let slot = self.persistent.frames.current();

        let frame = FrameUniforms::new(&self.camera, &self.settings, screen, levels, bounds);
        self.gpu.queue.write_buffer(&slot.frame_uniforms, 0, bytemuck::bytes_of(&frame));

        let mut params = CullParams::new(
            self.camera.view_matrix(),
            self.camera.projection_matrix(),
            self.camera.znear,
            self.camera.zfar,
            Vec2::new(screen.0 as f32, screen.1 as f32),
            bounds,
        );
        params.frustum_culling = self.settings.frustum_culling;
        params.occlusion_culling = self.settings.occlusion_culling;

        for phase in [CullPhase::Early, CullPhase::Late] {
            let uniforms = params.to_uniforms(phase, count, levels, &self.persistent.mesh.table);
            self.gpu.queue.write_buffer(slot.cull_uniforms(phase), 0, bytemuck::bytes_of(&uniforms));
        }
    }

    /// Record, submit and present one frame.
    ///
    /// Surface errors are returned to the caller: `Lost` and `Outdated` are
    /// answered with a resize, `Timeout` skips the frame, `OutOfMemory` is fatal.
    pub fn render(&mut self) -> std::result::Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let cpu_frame_ms = now.duration_since(self.last_frame).as_secs_f32() * 1000.0;
        self.last_frame = now;

        if self.resolution.is_none() {
            return Ok(());
        }

        // The slot's buffers may only be rewritten once its last frame has executed
        let slot = self.persistent.frames.current_mut();
        slot.wait(&self.gpu.device);
        if let Some(timer) = slot.timer.as_mut() {
            timer.collect(&mut self.perf);
        }

        self.update_uniforms();

        let stats = FrameStats::gather(
            self.frame_count,
            cpu_frame_ms,
            self.persistent.instance_buffers.count(),
            &self.settings,
            &self.perf,
        );

        let Self {
            gpu,
            plan,
            persistent,
            resolution,
            settings,
            overlay,
            ..
        } = self;
        let Some(resolution) = resolution.as_ref() else {
            return Ok(());
        };

        let device = &gpu.device;
        let slot_index = persistent.frames.current().index;
        let count = persistent.instance_buffers.count();
        let transforms = persistent.instance_buffers.transforms();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        let mut output: Option<wgpu::SurfaceTexture> = None;
        let mut target: Option<wgpu::TextureView> = None;

        for stage in plan.stages() {
            let slot = persistent.frames.current();
            let timer = slot.timer.as_ref();

            match stage {
                FrameStage::AcquireImage => {
                    let frame = gpu.surface.get_current_texture()?;
                    target = Some(frame.texture.create_view(&wgpu::TextureViewDescriptor::default()));
                    output = Some(frame);
                }
                FrameStage::EarlyCull => persistent.cull.record(
                    &mut encoder,
                    &resolution.cull_groups[slot_index][0],
                    CullPhase::Early,
                    count,
                    timer,
                ),
                FrameStage::ShadowPass => persistent.shadow.record(
                    &mut encoder,
                    &persistent.shadow_map,
                    &persistent.shadow_groups[slot_index],
                    &persistent.mesh_buffers,
                    transforms,
                    slot.indirect(CullPhase::Early),
                    count,
                    timer,
                ),
                FrameStage::EarlyGeometryPass => {
                    persistent.geometry.record(
                        &mut encoder,
                        &resolution.gbuffer,
                        &persistent.geometry_groups[slot_index],
                        CullPhase::Early,
                        &persistent.mesh_buffers,
                        transforms,
                        slot.indirect(CullPhase::Early),
                        count,
                        timer,
                    );
                    if let Some(view) = target.as_ref() {
                        persistent.lighting.record(
                            &mut encoder,
                            view,
                            &resolution.lighting_groups[slot_index],
                            CullPhase::Early,
                            timer,
                        );
                    }
                }
                FrameStage::DepthPyramidBuild => {
                    persistent
                        .pyramid
                        .record(&mut encoder, &resolution.pyramid, &resolution.pyramid_groups, timer)
                }
                FrameStage::LateCull => persistent.cull.record(
                    &mut encoder,
                    &resolution.cull_groups[slot_index][1],
                    CullPhase::Late,
                    count,
                    timer,
                ),
                FrameStage::LateGeometryPass => {
                    persistent.geometry.record(
                        &mut encoder,
                        &resolution.gbuffer,
                        &persistent.geometry_groups[slot_index],
                        CullPhase::Late,
                        &persistent.mesh_buffers,
                        transforms,
                        slot.indirect(CullPhase::Late),
                        count,
                        timer,
                    );
                    if let Some(view) = target.as_ref() {
                        persistent.lighting.record(
                            &mut encoder,
                            view,
                            &resolution.lighting_groups[slot_index],
                            CullPhase::Late,
                            timer,
                        );
                        if settings.display_mode.shows_bounds() {
                            persistent.bounds.record(&mut encoder, view, &persistent.bounds_group, count);
                        }
                        if let Some(overlay) = overlay.as_mut() {
                            overlay.render(device, &gpu.queue, &mut encoder, view, &stats);
                        }
                    }
                }
                FrameStage::Present => {
                    let slot = persistent.frames.current_mut();
                    if let Some(timer) = slot.timer.as_mut() {
                        timer.resolve(&mut encoder);
                    }
                    let index = gpu.queue.submit(Some(encoder.finish()));
                    slot.submitted(index);
                    if let Some(timer) = slot.timer.as_mut() {
                        timer.begin_readback();
                    }
                    break;
                }
            }
        }

        let mut suboptimal = false;
        if let Some(frame) = output {
            suboptimal = frame.suboptimal;
            frame.present();
        }

        self.persistent.frames.advance();
        self.frame_count += 1;

        if suboptimal {
            log::debug!("[Renderer::render] Surface is suboptimal, reconfiguring");
            let (width, height) = self.gpu.size();
            self.resize(width, height);
        }
        Ok(())
    }
}

/// Mesh, textures, pipelines and frame slots; none of it depends on the surface size
fn create_persistent_resources(
    gpu: &GpuContext,
    config: &RendererConfig,
    instances: &InstanceStore,
) -> Result<PersistentResources> {
    let device = &gpu.device;
    let queue = &gpu.queue;

    let source = load_obj(&config.model_path)?;
    let mesh = LodMesh::build(&source, &LodSettings::from(config));
    let mesh_buffers = MeshBuffers::new(device, queue, &mesh);

    let image = match &config.texture_path {
        Some(path) => TextureImage::load(path)?,
        None => TextureImage::white(),
    };
    let albedo = AlbedoTexture::new(device, queue, &image);
    let shadow_map = ShadowMap::new(device, config.shadow_map_size);

    let instance_buffers = InstanceBuffers::new(device, instances);
    let instance_debug = cull_pass::create_debug_buffer(device, instance_buffers.count());

    let timestamps = config.enable_gpu_timing && gpu.supports_timestamps();
    if config.enable_gpu_timing && !timestamps {
        log::warn!("[Renderer] Adapter lacks timestamp queries; GPU timings disabled");
    }
    let frames = FrameRing::new(
        (0..config.frames_in_flight)
            .map(|index| {
                FrameSlot::new(
                    device,
                    queue,
                    index,
                    FrameUniforms::SIZE,
                    instance_buffers.count(),
                    timestamps,
                )
            })
            .collect(),
    );

    let cull = CullPass::new(device);
    let pyramid = DepthPyramidPass::new(device);
    let shadow = ShadowPass::new(device);
    let geometry = GeometryPass::new(device);
    let lighting = LightingPass::new(device, gpu.surface_format());
    let bounds = BoundsPass::new(device, gpu.surface_format());

    let shadow_groups = frames
        .slots()
        .iter()
        .map(|slot| shadow.bind_group(device, &slot.frame_uniforms))
        .collect();
    let geometry_groups = frames
        .slots()
        .iter()
        .map(|slot| geometry.bind_group(device, &slot.frame_uniforms, &albedo, &instance_debug))
        .collect();
    let bounds_group = bounds.bind_group(device, &instance_debug);

    Ok(PersistentResources {
        mesh,
        mesh_buffers,
        _albedo: albedo,
        shadow_map,
        instance_buffers,
        instance_debug,
        frames,
        cull,
        pyramid,
        shadow,
        geometry,
        lighting,
        bounds,
        shadow_groups,
        geometry_groups,
        bounds_group,
    })
}

/// Targets and bind groups for one surface size; also re-scatters the instances
fn create_per_resolution_resources(
    gpu: &GpuContext,
    persistent: &PersistentResources,
    instances: &mut InstanceStore,
    width: u32,
    height: u32,
) -> ResolutionResources {
    let device = &gpu.device;

    instances.regenerate();
    // Also forgets last frame's visibility
    persistent.instance_buffers.upload(&gpu.queue, instances);

    let gbuffer = GBuffer::new(device, width, height);
    let pyramid = DepthPyramid::new(device, &gpu.queue, width, height);
    let pyramid_groups = persistent.pyramid.bind_groups(device, &gbuffer.depth, &pyramid);

    let slots = persistent.frames.slots();
    let cull_groups = slots
        .iter()
        .map(|slot| {
            [CullPhase::Early, CullPhase::Late].map(|phase| {
                persistent.cull.bind_group(
                    device,
                    slot.cull_uniforms(phase),
                    &persistent.instance_buffers,
                    slot.indirect(phase),
                    &persistent.instance_debug,
                    pyramid.view(),
                )
            })
        })
        .collect();
    let lighting_groups = slots
        .iter()
        .map(|slot| {
            persistent
                .lighting
                .bind_group(device, &slot.frame_uniforms, &gbuffer, &persistent.shadow_map, &pyramid)
        })
        .collect();

    ResolutionResources {
        width,
        height,
        gbuffer,
        pyramid,
        pyramid_groups,
        cull_groups,
        lighting_groups,
    }
}
