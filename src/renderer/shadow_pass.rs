//! Depth-only render from the light, fed by the early indirect buffer

use wgpu::ShaderStages;

use crate::gpu::{layouts, BindGroupBuilder, BindLayout, GpuTimer, TimedStage};
use crate::instance::InstanceData;
use crate::mesh::Vertex;

use super::resources::{MeshBuffers, ShadowMap, DEPTH_FORMAT};

pub struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    layout: BindLayout,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });

        let layout = BindLayout::new(
            device,
            "Shadow Bind Group Layout",
            vec![layouts::uniform(0, ShaderStages::VERTEX)],
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&layout.layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc(), InstanceData::desc()],
            },
            fragment: None,
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
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline, layout }
    }

    pub fn bind_group(&self, device: &wgpu::Device, frame_uniforms: &wgpu::Buffer) -> wgpu::BindGroup {
        BindGroupBuilder::new(device, &self.layout)
            .label("Shadow Bind Group")
            .buffer(0, frame_uniforms)
            .build()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        shadow_map: &ShadowMap,
        bind_group: &wgpu::BindGroup,
        mesh: &MeshBuffers,
        transforms: &wgpu::Buffer,
        indirect: &wgpu::Buffer,
        instance_count: u32,
        timer: Option<&GpuTimer>,
    ) {
        // Early render timing starts here and ends with early lighting
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &shadow_map.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: timer.map(|t| t.render_writes(TimedStage::EarlyRender, true, false)),
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        mesh.draw_indirect(&mut pass, transforms, indirect, instance_count);
    }
}
