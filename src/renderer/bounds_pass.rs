//! Screen-space bounds overlay for the two bounds display modes
//!
//! Draws one line rectangle per instance from the bounds the late cull wrote
//! into the instance debug buffer.

use wgpu::ShaderStages;

use crate::gpu::{layouts, BindGroupBuilder, BindLayout};

/// Line-list vertices per instance rectangle
pub const VERTICES_PER_INSTANCE: u32 = 8;

pub struct BoundsPass {
    pipeline: wgpu::RenderPipeline,
    layout: BindLayout,
}

impl BoundsPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bounds Overlay Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bounds.wgsl").into()),
        });

        let layout = BindLayout::new(
            device,
            "Bounds Overlay Bind Group Layout",
            vec![layouts::storage(0, ShaderStages::VERTEX, true)],
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Bounds Overlay Pipeline Layout"),
            bind_group_layouts: &[&layout.layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Bounds Overlay Pipeline"),
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
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline, layout }
    }

    pub fn bind_group(&self, device: &wgpu::Device, instance_debug: &wgpu::Buffer) -> wgpu::BindGroup {
        BindGroupBuilder::new(device, &self.layout)
            .label("Bounds Overlay Bind Group")
            .buffer(0, instance_debug)
            .build()
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
        instance_count: u32,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Bounds Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..VERTICES_PER_INSTANCE, 0..instance_count);
    }
}
