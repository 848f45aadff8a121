//! Light sources.

use glam::Vec3;

/// Discriminant values match the shader-side light records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
}

#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub direction: Vec3,
    pub position: Vec3,
}

impl Light {
    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            direction: direction.normalize_or_zero(),
            position: Vec3::ZERO,
        }
    }

    pub fn point(color: Vec3, position: Vec3) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            direction: Vec3::ZERO,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_normalizes_direction() {
        let light = Light::directional(Vec3::ONE, Vec3::new(0.0, -2.0, 0.0));
        assert_eq!(light.direction, Vec3::NEG_Y);
        assert_eq!(light.kind as u32, 0);
    }

    #[test]
    fn point_has_kind_one() {
        let light = Light::point(Vec3::ONE, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.kind as u32, 1);
    }
}
