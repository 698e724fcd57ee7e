//! Frames in flight
//!
//! Each slot owns every resource the CPU writes while recording a frame:
//! uniform buffers and the two indirect buffers. A slot is reused only after
//! its previous submission has completed.

use crate::culling::{CullPhase, CullUniforms, DrawCommand};

use super::timing::GpuTimer;

/// Per-frame-in-flight resources
pub struct FrameSlot {
    pub index: usize,
    /// Camera, light and shading parameters shared by the graphics passes
    pub frame_uniforms: wgpu::Buffer,
    cull_uniforms: [wgpu::Buffer; 2],
    indirect: [wgpu::Buffer; 2],
    submission: Option<wgpu::SubmissionIndex>,
    pub timer: Option<GpuTimer>,
}

impl FrameSlot {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        index: usize,
        frame_uniform_size: u64,
        instance_count: u32,
        timestamps: bool,
    ) -> Self {
        let frame_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("Frame {} Uniform Buffer", index)),
            size: frame_uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cull_uniforms = [CullPhase::Early, CullPhase::Late].map(|phase| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Frame {} {:?} Cull Uniform Buffer", index, phase)),
                size: std::mem::size_of::<CullUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        let indirect_size = DrawCommand::SIZE * instance_count.max(1) as u64;
        let indirect = [CullPhase::Early, CullPhase::Late].map(|phase| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("Frame {} {:?} Indirect Buffer", index, phase)),
                size: indirect_size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        Self {
            index,
            frame_uniforms,
            cull_uniforms,
            indirect,
            submission: None,
            timer: timestamps.then(|| GpuTimer::new(device, queue)),
        }
    }

    pub fn cull_uniforms(&self, phase: CullPhase) -> &wgpu::Buffer {
        &self.cull_uniforms[phase.as_u32() as usize]
    }

    pub fn indirect(&self, phase: CullPhase) -> &wgpu::Buffer {
        &self.indirect[phase.as_u32() as usize]
    }

    /// Block until the slot's last submission has executed
    pub fn wait(&mut self, device: &wgpu::Device) {
        if let Some(index) = self.submission.take() {
            device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
        }
    }

    pub fn submitted(&mut self, index: wgpu::SubmissionIndex) {
        self.submission = Some(index);
    }
}

/// Round-robin over the frame slots
pub struct FrameRing {
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameRing {
    pub fn new(slots: Vec<FrameSlot>) -> Self {
        assert!(!slots.is_empty(), "at least one frame slot is required");
        Self { slots, current: 0 }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    pub fn current_mut(&mut self) -> &mut FrameSlot {
        &mut self.slots[self.current]
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    pub fn advance(&mut self) {
        self.current = next_slot(self.current, self.slots.len());
    }

    /// Forget every pending submission; the caller has waited for the device to idle
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.submission = None;
        }
        self.current = 0;
    }
}

pub fn next_slot(current: usize, count: usize) -> usize {
    (current + 1) % count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_rotate() {
        assert_eq!(next_slot(0, 2), 1);
        assert_eq!(next_slot(1, 2), 0);
        assert_eq!(next_slot(2, 3), 0);
        assert_eq!(next_slot(0, 1), 0);
    }
}
