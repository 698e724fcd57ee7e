//! G-buffer fill
//!
//! The early pass clears the G-buffer and scene depth; the late pass loads
//! them and adds the instances the late cull found newly visible.

use wgpu::ShaderStages;

use crate::culling::CullPhase;
use crate::gpu::{layouts, BindGroupBuilder, BindLayout, GpuTimer, TimedStage};
use crate::instance::InstanceData;
use crate::mesh::Vertex;

use super::resources::{AlbedoTexture, GBuffer, MeshBuffers, DEPTH_FORMAT};

pub struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
    layout: BindLayout,
}

impl GeometryPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Geometry Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/geometry.wgsl").into()),
        });

        let layout = BindLayout::new(
            device,
            "Geometry Bind Group Layout",
            vec![
                layouts::uniform(0, ShaderStages::VERTEX | ShaderStages::FRAGMENT),
                layouts::texture(1, ShaderStages::FRAGMENT, true),
                layouts::sampler(2, ShaderStages::FRAGMENT, wgpu::SamplerBindingType::Filtering),
                layouts::storage(3, ShaderStages::VERTEX, true),
            ],
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Geometry Pipeline Layout"),
            bind_group_layouts: &[&layout.layout],
            push_constant_ranges: &[],
        });

        let targets = GBuffer::COLOR_FORMATS.map(|format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Geometry Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc(), InstanceData::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &targets,
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline, layout }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        frame_uniforms: &wgpu::Buffer,
        albedo: &AlbedoTexture,
        instance_debug: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new(device, &self.layout)
            .label("Geometry Bind Group")
            .buffer(0, frame_uniforms)
            .texture(1, &albedo.view)
            .sampler(2, &albedo.sampler)
            .buffer(3, instance_debug)
            .build()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &GBuffer,
        bind_group: &wgpu::BindGroup,
        phase: CullPhase,
        mesh: &MeshBuffers,
        transforms: &wgpu::Buffer,
        indirect: &wgpu::Buffer,
        instance_count: u32,
        timer: Option<&GpuTimer>,
    ) {
        let clear = phase == CullPhase::Early;
        // Late render timing starts with the late geometry pass
        let timestamp_writes = match phase {
            CullPhase::Early => None,
            CullPhase::Late => timer.map(|t| t.render_writes(TimedStage::LateRender, true, false)),
        };

        let color_attachments = gbuffer.color_attachments(clear);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(if clear { "Early Geometry Pass" } else { "Late Geometry Pass" }),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(gbuffer.depth_attachment(clear)),
            timestamp_writes,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        mesh.draw_indirect(&mut pass, transforms, indirect, instance_count);
    }
}
