//! Render targets and uploaded scene data
//!
//! `MeshBuffers`, `ShadowMap` and `AlbedoTexture` live for the whole run.
//! `GBuffer` follows the surface size and is rebuilt on every resize.

use crate::gpu::{upload, TextureImage};
use crate::mesh::LodMesh;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Packed LOD chain on the GPU
pub struct MeshBuffers {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub index_count: u32,
}

impl MeshBuffers {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, mesh: &LodMesh) -> Self {
        let vertices = upload::create_buffer(
            device,
            queue,
            "Mesh Vertex Buffer",
            bytemuck::cast_slice(&mesh.vertices),
            wgpu::BufferUsages::VERTEX,
        );
        let indices = upload::create_buffer(
            device,
            queue,
            "Mesh LOD Index Buffer",
            bytemuck::cast_slice(&mesh.indices),
            wgpu::BufferUsages::INDEX,
        );

        log::info!(
            "[MeshBuffers::new] {} vertices, {} indices across {} LOD levels",
            mesh.vertices.len(),
            mesh.indices.len(),
            mesh.table.len()
        );

        Self {
            vertices,
            indices,
            index_count: mesh.indices.len() as u32,
        }
    }

    /// Nothing to draw; culling still runs but draws are skipped
    pub fn is_empty(&self) -> bool {
        self.index_count == 0
    }

    /// Bind the mesh and the per-instance transforms, then issue one indirect draw per slot
    pub fn draw_indirect<'a>(
        &'a self,
        pass: &mut wgpu::RenderPass<'a>,
        transforms: &'a wgpu::Buffer,
        indirect: &'a wgpu::Buffer,
        instance_count: u32,
    ) {
        if self.is_empty() {
            return;
        }
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.set_vertex_buffer(1, transforms.slice(..));
        pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.multi_draw_indexed_indirect(indirect, 0, instance_count);
    }
}

/// Diffuse texture of the mesh and its sampler
pub struct AlbedoTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl AlbedoTexture {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, image: &TextureImage) -> Self {
        let texture = upload::create_texture(device, queue, "Albedo Texture", image);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Albedo Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self { texture, view, sampler }
    }
}

/// Square depth target rendered from the light
pub struct ShadowMap {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: u32,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, size: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, size }
    }
}

/// Geometry subpass outputs, read by the lighting subpass
pub struct GBuffer {
    pub position: wgpu::TextureView,
    pub normal: wgpu::TextureView,
    pub albedo: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GBuffer {
    pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
    pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub const COLOR_FORMATS: [wgpu::TextureFormat; 3] =
        [Self::POSITION_FORMAT, Self::NORMAL_FORMAT, Self::ALBEDO_FORMAT];

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let target = |label: &str, format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };

        log::debug!("[GBuffer::new] {}x{}", width, height);
        Self {
            position: target("GBuffer Position", Self::POSITION_FORMAT),
            normal: target("GBuffer Normal", Self::NORMAL_FORMAT),
            albedo: target("GBuffer Albedo", Self::ALBEDO_FORMAT),
            depth: target("Scene Depth", DEPTH_FORMAT),
            width,
            height,
        }
    }

    pub fn color_attachments(&self, clear: bool) -> [Option<wgpu::RenderPassColorAttachment<'_>>; 3] {
        let load = if clear {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        [&self.position, &self.normal, &self.albedo].map(|view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })
        })
    }

    pub fn depth_attachment(&self, clear: bool) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth,
            depth_ops: Some(wgpu::Operations {
                load: if clear { wgpu::LoadOp::Clear(1.0) } else { wgpu::LoadOp::Load },
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }
}
