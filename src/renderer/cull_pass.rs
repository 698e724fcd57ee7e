//! GPU cull and LOD select
//!
//! One invocation per instance slot writes that slot's indirect command, so
//! the draw buffers always hold exactly `instance_count` commands.

use wgpu::ShaderStages;

use crate::constants::workgroups;
use crate::culling::{CullPhase, InstanceDebug};
use crate::gpu::{layouts, BindGroupBuilder, BindLayout, GpuTimer, TimedStage};
use crate::instance::InstanceBuffers;

pub struct CullPass {
    pipeline: wgpu::ComputePipeline,
    layout: BindLayout,
}

impl CullPass {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cull Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/cull.wgsl").into()),
        });

        let layout = BindLayout::new(
            device,
            "Cull Bind Group Layout",
            vec![
                // Cull uniforms
                layouts::uniform(0, ShaderStages::COMPUTE),
                // Instance transforms
                layouts::storage(1, ShaderStages::COMPUTE, true),
                // Visibility flags
                layouts::storage(2, ShaderStages::COMPUTE, false),
                // Indirect commands
                layouts::storage(3, ShaderStages::COMPUTE, false),
                // Instance debug records
                layouts::storage(4, ShaderStages::COMPUTE, false),
                // Depth pyramid, all mips
                layouts::texture(5, ShaderStages::COMPUTE, false),
            ],
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cull Pipeline Layout"),
            bind_group_layouts: &[&layout.layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cull Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "main",
        });

        Self { pipeline, layout }
    }

    pub fn bind_group(
        &self,
        device: &wgpu::Device,
        uniforms: &wgpu::Buffer,
        instances: &InstanceBuffers,
        indirect: &wgpu::Buffer,
        instance_debug: &wgpu::Buffer,
        pyramid: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        BindGroupBuilder::new(device, &self.layout)
            .label("Cull Bind Group")
            .buffer(0, uniforms)
            .buffer(1, instances.transforms())
            .buffer(2, instances.visibility())
            .buffer(3, indirect)
            .buffer(4, instance_debug)
            .texture(5, pyramid)
            .build()
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        phase: CullPhase,
        instance_count: u32,
        timer: Option<&GpuTimer>,
    ) {
        let stage = match phase {
            CullPhase::Early => TimedStage::EarlyCull,
            CullPhase::Late => TimedStage::LateCull,
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(match phase {
                CullPhase::Early => "Early Cull Pass",
                CullPhase::Late => "Late Cull Pass",
            }),
            timestamp_writes: timer.map(|t| t.compute_writes(stage)),
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(dispatch_size(instance_count), 1, 1);
    }
}

/// Workgroups covering every slot
pub fn dispatch_size(instance_count: u32) -> u32 {
    instance_count.div_ceil(workgroups::CULL)
}

/// Zeroed per-instance debug records
pub fn create_debug_buffer(device: &wgpu::Device, instance_count: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Debug Buffer"),
        size: InstanceDebug::SIZE * instance_count.max(1) as u64,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_every_slot() {
        assert_eq!(dispatch_size(0), 0);
        assert_eq!(dispatch_size(1), 1);
        assert_eq!(dispatch_size(64), 1);
        assert_eq!(dispatch_size(65), 2);
        assert_eq!(dispatch_size(150_000), 2344);
    }
}
