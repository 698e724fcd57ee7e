//! Depth pyramid texture and the compute passes that build it.
//!
//! Mip 0 is half the next power of two above the larger screen side; every
//! further mip halves (rounding up) down to 1x1. Each texel holds the maximum
//! depth of its 2x2 footprint in the level below, so a test against one texel
//! is conservative for everything it covers.

use wgpu::ShaderStages;

use crate::culling::PyramidLayout;
use crate::gpu::{layouts, upload, BindGroupBuilder, BindLayout, GpuTimer, TimedStage};

pub const PYRAMID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Pyramid storage for the current resolution
pub struct DepthPyramid {
    texture: wgpu::Texture,
    /// All mips, for sampling in the cull and lighting shaders
    view: wgpu::TextureView,
    /// One view per mip, for the reduction passes
    mip_views: Vec<wgpu::TextureView>,
    layout: PyramidLayout,
}

impl DepthPyramid {
    /// Create the pyramid for a screen size, with every texel at the far plane
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, screen_width: u32, screen_height: u32) -> Self {
        let layout = PyramidLayout::new(screen_width, screen_height);
        let size = layout.size();

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Pyramid"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: layout.level_count(),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: PYRAMID_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Depth Pyramid View"),
            ..Default::default()
        });

        let mip_views = (0..layout.level_count())
            .map(|level| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(&format!("Depth Pyramid Mip {} View", level)),
                    format: Some(PYRAMID_FORMAT),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    base_array_layer: 0,
                    array_layer_count: None,
                })
            })
            .collect();

        // Nothing is occluded until the first build
        upload::fill_r32_mips(queue, &texture, &layout.levels, 1.0);

        log::info!(
            "[DepthPyramid::new] {}x{} screen -> {}x{} pyramid, {} mips",
            screen_width,
            screen_height,
            size,
            size,
            layout.level_count()
        );

        Self {
            texture,
            view,
            mip_views,
            layout,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn mip_view(&self, level: usize) -> &wgpu::TextureView {
        &self.mip_views[level]
    }

    pub fn layout(&self) -> &PyramidLayout {
        &self.layout
    }

    pub fn level_count(&self) -> u32 {
        self.layout.level_count()
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

/// Reduction pipelines: scene depth into mip 0, then mip k-1 into mip k
pub struct DepthPyramidPass {
    reduce_depth: wgpu::ComputePipeline,
    reduce_mip: wgpu::ComputePipeline,
    depth_layout: BindLayout,
    mip_layout: BindLayout,
}

impl DepthPyramidPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Depth Pyramid Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/depth_pyramid.wgsl").into()),
        });

        let depth_layout = BindLayout::new(
            device,
            "Depth Pyramid Base Layout",
            vec![
                layouts::depth_texture(0, ShaderStages::COMPUTE),
                layouts::storage_texture(1, PYRAMID_FORMAT),
            ],
        );
        let mip_layout = BindLayout::new(
            device,
            "Depth Pyramid Mip Layout",
            vec![
                layouts::storage_texture(1, PYRAMID_FORMAT),
                layouts::texture(2, ShaderStages::COMPUTE, false),
            ],
        );

        let pipeline = |label: &str, layout: &BindLayout, entry_point: &str| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layout.layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point,
            })
        };

        Self {
            reduce_depth: pipeline("Depth Pyramid Base Pipeline", &depth_layout, "reduce_depth"),
            reduce_mip: pipeline("Depth Pyramid Mip Pipeline", &mip_layout, "reduce_mip"),
            depth_layout,
            mip_layout,
        }
    }

    /// One bind group per mip; rebuilt whenever the pyramid or the scene depth is
    pub fn bind_groups(
        &self,
        device: &wgpu::Device,
        scene_depth: &wgpu::TextureView,
        pyramid: &DepthPyramid,
    ) -> Vec<wgpu::BindGroup> {
        (0..pyramid.level_count() as usize)
            .map(|level| {
                if level == 0 {
                    BindGroupBuilder::new(device, &self.depth_layout)
                        .label("Depth Pyramid Mip 0 Bind Group")
                        .texture(0, scene_depth)
                        .texture(1, pyramid.mip_view(0))
                        .build()
                } else {
                    BindGroupBuilder::new(device, &self.mip_layout)
                        .label("Depth Pyramid Mip Bind Group")
                        .texture(1, pyramid.mip_view(level))
                        .texture(2, pyramid.mip_view(level - 1))
                        .build()
                }
            })
            .collect()
    }

    /// One compute pass per mip so each level sees the previous one finished
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pyramid: &DepthPyramid,
        bind_groups: &[wgpu::BindGroup],
        timer: Option<&GpuTimer>,
    ) {
        let last = bind_groups.len().saturating_sub(1);
        for (level, bind_group) in bind_groups.iter().enumerate() {
            let timestamp_writes = timer.map(|t| {
                t.compute_writes_partial(TimedStage::DepthPyramid, level == 0, level == last)
            });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Depth Pyramid Pass"),
                timestamp_writes,
            });
            pass.set_pipeline(if level == 0 { &self.reduce_depth } else { &self.reduce_mip });
            pass.set_bind_group(0, bind_group, &[]);
            let (x, y) = pyramid.layout().dispatch_size(level);
            pass.dispatch_workgroups(x, y, 1);
        }
    }
}
