/// Camera Module
///
/// Free-fly Euler camera for the viewer and the fixed-target shadow light.
/// Both build wgpu-convention projections (depth 0 at near, 1 at far).

use glam::{Mat4, Vec3};

use crate::constants::{camera, light};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Degrees; 0 looks down +x
    pub yaw: f32,
    /// Degrees, clamped to +-89
    pub pitch: f32,
    aspect: f32,
    pub fov_y: f32,
    pub znear: f32,
    pub zfar: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Vec3::from(camera::START_POSITION),
            yaw: camera::START_YAW_DEGREES,
            pitch: camera::START_PITCH_DEGREES,
            aspect: aspect_ratio(width, height),
            fov_y: camera::FOV_Y_DEGREES,
            znear: camera::ZNEAR,
            zfar: camera::ZFAR,
            speed: camera::MOVE_SPEED,
            sensitivity: camera::MOUSE_SENSITIVITY,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.to_radians().sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.to_radians().sin_cos();
        Vec3::new(cos_pitch * cos_yaw, sin_pitch, cos_pitch * sin_yaw).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect, self.znear, self.zfar)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Move along the view axes; `sprint` multiplies and `crawl` divides the speed
    pub fn process_keyboard(&mut self, direction: Movement, delta_time: f32, sprint: bool, crawl: bool) {
        let mut velocity = self.speed * delta_time;
        if sprint {
            velocity *= camera::SPRINT_MULTIPLIER;
        }
        if crawl {
            velocity /= camera::CRAWL_DIVISOR;
        }

        match direction {
            Movement::Forward => self.position += self.forward() * velocity,
            Movement::Backward => self.position -= self.forward() * velocity,
            Movement::Left => self.position -= self.right() * velocity,
            Movement::Right => self.position += self.right() * velocity,
        }
    }

    /// Mouse deltas in pixels; screen y grows downward
    pub fn process_mouse(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity)
            .clamp(-camera::PITCH_LIMIT_DEGREES, camera::PITCH_LIMIT_DEGREES);
    }
}

/// Shadow-casting light orbiting the origin
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Light {
    /// Rotation angles in radians around X, Y and Z
    pub rotation: Vec3,
}

impl Light {
    pub fn rotation_matrix(&self) -> Mat4 {
        Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_z(self.rotation.z)
    }

    pub fn position(&self) -> Vec3 {
        self.rotation_matrix().transform_point3(Vec3::from(light::BASE_POSITION))
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        let eye = self.position();
        // look_at degenerates when the light sits straight above or below the origin
        let up = if eye.normalize_or_zero().dot(Vec3::Y).abs() > 0.999 { Vec3::Z } else { Vec3::Y };
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, up);
        let proj = Mat4::perspective_rh(light::FOV_Y_DEGREES.to_radians(), aspect, light::ZNEAR, light::ZFAR);
        proj * view
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_looking_down_positive_x() {
        let cam = Camera::new(1280, 720);
        assert!((cam.forward() - Vec3::X).length() < 1e-6);
        assert_eq!(cam.position, Vec3::new(-2.0, 0.0, 0.0));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = Camera::new(800, 600);
        cam.process_mouse(0.0, -10_000.0);
        assert_eq!(cam.pitch, 89.0);
        cam.process_mouse(0.0, 10_000.0);
        assert_eq!(cam.pitch, -89.0);
    }

    #[test]
    fn sprint_and_crawl_scale_velocity() {
        let mut cam = Camera::new(800, 600);
        cam.process_keyboard(Movement::Forward, 1.0, true, false);
        assert!((cam.position.x - (-2.0 + 2.5 * 4.0)).abs() < 1e-5);

        let mut cam = Camera::new(800, 600);
        cam.process_keyboard(Movement::Forward, 1.0, false, true);
        assert!((cam.position.x - (-2.0 + 0.25)).abs() < 1e-5);
    }

    #[test]
    fn origin_projects_inside_depth_range() {
        let cam = Camera::new(800, 600);
        let clip = cam.view_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn default_light_sits_on_negative_x() {
        let light = Light::default();
        assert!((light.position() - Vec3::new(-2.5, 0.0, 0.0)).length() < 1e-6);
    }
}
