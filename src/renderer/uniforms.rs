use bytemuck::{Pod, Zeroable};

use crate::camera::Camera;
use crate::mesh::BoundingSphere;

use super::debug::DebugSettings;

/// Uniform block of the shadow, geometry and lighting shaders (304 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub light_position: [f32; 4],
    pub ka: [f32; 4],
    pub kd: [f32; 4],
    pub ks: [f32; 4],
    pub ke: [f32; 4],
    pub screen_size: [f32; 2],
    pub znear: f32,
    pub zfar: f32,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub ns: f32,
    pub shadow_bias: f32,
    pub display_mode: u32,
    pub flags: u32,
    pub pyramid_levels: u32,
    pub sphere_center: [f32; 3],
    pub sphere_radius: f32,
    pub lod_level_count: u32,
    pub _padding: [u32; 3],
}

impl FrameUniforms {
    pub const MODEL: u32 = 1;
    pub const TEXTURE: u32 = 1 << 1;
    pub const LIGHTING: u32 = 1 << 2;
    pub const PCF: u32 = 1 << 3;

    pub const SIZE: u64 = std::mem::size_of::<FrameUniforms>() as u64;

    pub fn new(
        camera: &Camera,
        settings: &DebugSettings,
        screen: (u32, u32),
        pyramid_levels: u32,
        bounds: BoundingSphere,
    ) -> Self {
        let mut flags = 0;
        for (enabled, bit) in [
            (settings.model_enabled, Self::MODEL),
            (settings.texture_enabled, Self::TEXTURE),
            (settings.lighting_enabled, Self::LIGHTING),
            (settings.pcf_enabled, Self::PCF),
        ] {
            if enabled {
                flags |= bit;
            }
        }

        let rgb = |c: [f32; 3]| [c[0], c[1], c[2], 1.0];
        let material = &settings.material;

        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_view_proj: settings.light.view_projection(camera.aspect()).to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).into(),
            light_position: settings.light.position().extend(1.0).into(),
            ka: rgb(material.ka),
            kd: rgb(material.kd),
            ks: rgb(material.ks),
            ke: rgb(material.ke),
            screen_size: [screen.0 as f32, screen.1 as f32],
            znear: camera.znear,
            zfar: camera.zfar,
            ambient: settings.ambient,
            diffuse: settings.diffuse,
            specular: settings.specular,
            ns: material.ns,
            shadow_bias: settings.shadow_bias(),
            display_mode: settings.display_mode.code(),
            flags,
            pyramid_levels,
            sphere_center: bounds.center.into(),
            sphere_radius: bounds.radius,
            lod_level_count: settings.lod_distances().len() as u32,
            _padding: [0; 3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{LodLevel, LodTable, Material};

    #[test]
    fn block_size_is_uniform_aligned() {
        assert_eq!(FrameUniforms::SIZE, 304);
        assert_eq!(FrameUniforms::SIZE % 16, 0);
    }

    #[test]
    fn toggles_become_flags() {
        let table = LodTable::new(vec![LodLevel::new(f32::MAX, 0, 36)]);
        let mut settings = DebugSettings::new(Material::default(), &table);
        settings.texture_enabled = false;
        settings.pcf_enabled = false;

        let camera = Camera::new(640, 480);
        let uniforms = FrameUniforms::new(&camera, &settings, (640, 480), 10, BoundingSphere::default());
        assert_eq!(uniforms.flags, FrameUniforms::MODEL | FrameUniforms::LIGHTING);
        assert_eq!(uniforms.display_mode, 24);
        assert_eq!(uniforms.lod_level_count, 1);
        assert_eq!(uniforms.screen_size, [640.0, 480.0]);
    }
}
