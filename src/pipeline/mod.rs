//! Frame orchestration: pass sequencing and shared draw plumbing.

pub mod composite_pass;
pub mod forward_pass;
pub mod geometry;
pub mod water_pass;

use glam::Vec4;

/// How a frame is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    Forward,
    #[default]
    Deferred,
}

/// Uniform-block slot of the global parameter block (camera + lights).
pub const GLOBAL_PARAMS_SLOT: u32 = 0;
/// Uniform-block slot of the per-entity block (world + WVP matrices).
pub const LOCAL_PARAMS_SLOT: u32 = 1;
/// Uniform-block slot of the water block (view/projection/model).
pub const WATER_PARAMS_SLOT: u32 = 1;

/// A plane far above the scene; keeps everything visible.
pub const CLIP_DISABLED: Vec4 = Vec4::new(0.0, -1.0, 0.0, 15.0);

/// Keep geometry above the water surface at `height`.
pub fn reflection_clip_plane(height: f32) -> Vec4 {
    Vec4::new(0.0, 1.0, 0.0, -height)
}

/// Keep geometry below the water surface at `height`.
pub fn refraction_clip_plane(height: f32) -> Vec4 {
    Vec4::new(0.0, -1.0, 0.0, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_planes_bracket_the_surface() {
        let h = -2.0;
        let above = glam::Vec4::new(0.0, 1.0, 0.0, 1.0);
        let below = glam::Vec4::new(0.0, -5.0, 0.0, 1.0);
        // reflection keeps what is above the surface
        assert!(reflection_clip_plane(h).dot(above) > 0.0);
        assert!(reflection_clip_plane(h).dot(below) < 0.0);
        // refraction keeps what is below
        assert!(refraction_clip_plane(h).dot(above) < 0.0);
        assert!(refraction_clip_plane(h).dot(below) > 0.0);
        // disabled plane keeps both
        assert!(CLIP_DISABLED.dot(above) > 0.0);
        assert!(CLIP_DISABLED.dot(below) > 0.0);
    }
}
