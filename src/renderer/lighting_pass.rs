//! Full-screen lighting of the G-buffer into the surface image.
//!
//! Runs after each geometry pass. The composed view shades with ambient,
//! diffuse, specular and emissive terms and the light's shadow map; the
//! debug views show a single G-buffer channel or a pyramid mip instead.

use wgpu::ShaderStages;

use crate::culling::CullPhase;
use crate::gpu::{layouts, BindGroupBuilder, BindLayout, GpuTimer, TimedStage};

use super::depth_pyramid::DepthPyramid;
use super::resources::{GBuffer, ShadowMap};

pub struct LightingPass {
    pipeline: wgpu::RenderPipeline,
    layout: BindLayout,
    shadow_hard: wgpu::Sampler,
    shadow_pcf: wgpu::Sampler,
}

impl LightingPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lighting Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/lighting.wgsl").into()),
        });

        let layout = BindLayout::new(
            device,
            "Lighting Bind Group Layout",
            vec![
                layouts::uniform(0, ShaderStages::FRAGMENT),
                layouts::texture(1, ShaderStages::FRAGMENT, false),
                layouts::texture(2, ShaderStages::FRAGMENT, false),
                layouts::texture(3, ShaderStages::FRAGMENT, false),
                layouts::depth_texture(4, ShaderStages::FRAGMENT),
                layouts::depth_texture(5, ShaderStages::FRAGMENT),
                layouts::sampler(6, ShaderStages::FRAGMENT, wgpu::SamplerBindingType::Comparison),
                layouts::sampler(7, ShaderStages::FRAGMENT, wgpu::SamplerBindingType::Comparison),
                layouts::texture(8, ShaderStages::FRAGMENT, false),
            ],
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lighting Pipeline Layout"),
            bind_group_layouts: &[&layout.layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Lighting Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let compare_sampler = |label: &str, filter: wgpu::FilterMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                compare: Some(wgpu::CompareFunction::LessEqual),
                ..Default::default()
            })
        };

        Self {
            pipeline,
            layout,
            shadow_hard: compare_sampler("Shadow Hard Sampler", wgpu::FilterMode::Nearest),
            shadow_pcf: compare_sampler("Shadow PCF Sampler", wgpu::FilterMode::Linear),
        }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        frame_uniforms: &wgpu::Buffer,
        gbuffer: &GBuffer,
        shadow_map: &ShadowMap,
        pyramid: &DepthPyramid,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new(device, &self.layout)
            .label("Lighting Bind Group")
            .buffer(0, frame_uniforms)
            .texture(1, &gbuffer.position)
            .texture(2, &gbuffer.normal)
            .texture(3, &gbuffer.albedo)
            .texture(4, &gbuffer.depth)
            .texture(5, &shadow_map.view)
            .sampler(6, &self.shadow_hard)
            .sampler(7, &self.shadow_pcf)
            .texture(8, pyramid.view())
            .build()
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
        phase: CullPhase,
        timer: Option<&GpuTimer>,
    ) {
        let (label, stage) = match phase {
            CullPhase::Early => ("Early Lighting Pass", TimedStage::EarlyRender),
            CullPhase::Late => ("Late Lighting Pass", TimedStage::LateRender),
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: timer.map(|t| t.render_writes(stage, false, true)),
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
