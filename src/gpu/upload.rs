//! One-shot transfers used at startup.
//!
//! Each upload records its own command buffer and blocks until the GPU has
//! executed it. None of this runs per frame.

use std::path::Path;

use wgpu::util::DeviceExt;

use crate::error::{RendererError, Result};

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RendererError::asset(path, "file not found"));
        }
        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("[TextureImage::load] {} ({}x{})", path.display(), width, height);
        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }

    /// 1x1 opaque white, used when no texture is configured
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        }
    }
}

/// Submit `encoder` and block until the GPU has executed it
fn flush(device: &wgpu::Device, queue: &wgpu::Queue, encoder: wgpu::CommandEncoder) {
    let index = queue.submit(Some(encoder.finish()));
    device.poll(wgpu::Maintain::WaitForSubmissionIndex(index));
}

/// Device-local buffer filled through a staging copy
pub fn create_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    let size = (contents.len() as u64).max(align).div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    if contents.is_empty() {
        return buffer;
    }

    let mut padded = contents.to_vec();
    padded.resize(size as usize, 0);
    let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Upload Staging Buffer"),
        contents: &padded,
        usage: wgpu::BufferUsages::COPY_SRC,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Buffer Upload Encoder"),
    });
    encoder.copy_buffer_to_buffer(&staging, 0, &buffer, 0, size);
    flush(device, queue, encoder);

    log::debug!("[upload::create_buffer] {} ({} bytes)", label, size);
    buffer
}

/// Single-mip sampled RGBA8 sRGB texture
pub fn create_texture(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, image: &TextureImage) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );

    let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Upload Encoder"),
    });
    flush(device, queue, encoder);

    texture
}

/// Fill every mip of an R32Float texture with `value`
pub fn fill_r32_mips(queue: &wgpu::Queue, texture: &wgpu::Texture, levels: &[(u32, u32)], value: f32) {
    for (mip, &(width, height)) in levels.iter().enumerate() {
        let texels = vec![value; (width * height) as usize];
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: mip as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_fallback_is_one_opaque_texel() {
        let white = TextureImage::white();
        assert_eq!((white.width, white.height), (1, 1));
        assert_eq!(white.rgba, vec![255, 255, 255, 255]);
    }

    #[test]
    fn missing_texture_is_an_asset_error() {
        let err = TextureImage::load(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, RendererError::AssetLoad { .. }));
    }

    #[test]
    fn decodes_png_to_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        let mut img = image::RgbaImage::new(2, 3);
        img.put_pixel(1, 2, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let loaded = TextureImage::load(&path).unwrap();
        assert_eq!((loaded.width, loaded.height), (2, 3));
        assert_eq!(loaded.rgba.len(), 2 * 3 * 4);
        assert_eq!(&loaded.rgba[(2 * 2 + 1) * 4..(2 * 2 + 1) * 4 + 4], &[10, 20, 30, 255]);
    }
}
