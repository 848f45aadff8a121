//! Free-look camera.
//!
//! Orientation is yaw/pitch; the forward vector is derived, never stored.
//! Reflection rendering uses [`Camera::mirrored_across`], which returns a
//! derived camera and leaves the canonical one untouched.

use glam::{Mat4, Vec3};

const FOV_Y_DEGREES: f32 = 60.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 1000.0;

/// Pitch is kept shy of straight up/down so the view basis stays valid.
const PITCH_LIMIT: f32 = 1.55;

/// Movement keys held this frame plus the mouse delta. Built by the host's
/// event loop; consumed exactly once per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub yaw_delta: f32,
    pub pitch_delta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Radians, 0 looking down +X, positive toward +Z.
    pub yaw: f32,
    /// Radians, positive looking up.
    pub pitch: f32,
    /// World units per second.
    pub speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 15.0),
            yaw: -std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            speed: 5.0,
        }
    }
}

impl Camera {
    pub fn front(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR)
    }

    /// Apply one frame of movement and look input.
    pub fn apply_input(&mut self, input: &CameraInput, dt: f32) {
        self.yaw += input.yaw_delta;
        self.pitch = (self.pitch + input.pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let step = self.speed * dt;
        let front = self.front();
        let right = self.right();
        if input.forward {
            self.position += front * step;
        }
        if input.backward {
            self.position -= front * step;
        }
        if input.left {
            self.position -= right * step;
        }
        if input.right {
            self.position += right * step;
        }
    }

    /// Camera mirrored across the horizontal plane at `height`:
    /// `y' = 2 * height - y`, pitch negated. Pure; `self` is unchanged.
    pub fn mirrored_across(&self, height: f32) -> Camera {
        let mut mirrored = *self;
        mirrored.position.y = 2.0 * height - self.position.y;
        mirrored.pitch = -self.pitch;
        mirrored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_reflects_height_and_pitch() {
        let camera = Camera {
            position: Vec3::new(1.0, 5.0, -3.0),
            yaw: 0.4,
            pitch: 0.25,
            speed: 5.0,
        };
        let mirrored = camera.mirrored_across(-2.0);
        assert_eq!(mirrored.position.y, 2.0 * -2.0 - 5.0);
        assert_eq!(mirrored.pitch, -0.25);
        assert_eq!(mirrored.position.x, 1.0);
        assert_eq!(mirrored.position.z, -3.0);
        assert_eq!(mirrored.yaw, 0.4);
    }

    #[test]
    fn mirror_leaves_canonical_camera_untouched() {
        let camera = Camera {
            position: Vec3::new(0.5, 3.5, 2.0),
            yaw: 1.1,
            pitch: -0.3,
            speed: 5.0,
        };
        let before = camera;
        let _ = camera.mirrored_across(-2.0);
        // bit-for-bit
        assert_eq!(camera.position.to_array(), before.position.to_array());
        assert_eq!(camera.yaw.to_bits(), before.yaw.to_bits());
        assert_eq!(camera.pitch.to_bits(), before.pitch.to_bits());
    }

    #[test]
    fn mirror_is_an_involution() {
        let camera = Camera::default();
        let twice = camera.mirrored_across(-2.0).mirrored_across(-2.0);
        assert_eq!(twice.position, camera.position);
        assert_eq!(twice.pitch, camera.pitch);
    }

    #[test]
    fn input_moves_along_front() {
        let mut camera = Camera {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            speed: 5.0,
        };
        let input = CameraInput { forward: true, ..Default::default() };
        camera.apply_input(&input, 0.5);
        assert!((camera.position.x - 2.5).abs() < 1e-5);
        assert!(camera.position.y.abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        let input = CameraInput { pitch_delta: 10.0, ..Default::default() };
        camera.apply_input(&input, 0.016);
        assert!(camera.pitch <= PITCH_LIMIT);
    }
}
