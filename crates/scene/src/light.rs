//! Point light parameters.

use glam::Vec3;

/// Intensity used when a light does not specify one.
pub const DEFAULT_INTENSITY: f32 = 50.0;

/// Specular coefficient shared by every lit surface.
pub const DEFAULT_SPECULAR: Vec3 = Vec3::splat(0.8);

/// A point light (omnidirectional).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    /// Light position in world space
    pub position: Vec3,
    /// Radiant intensity, never negative.
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            intensity: DEFAULT_INTENSITY,
        }
    }
}

impl PointLight {
    /// Negative intensities are clamped to zero.
    pub fn new(position: Vec3, intensity: f32) -> Self {
        Self {
            position,
            intensity: intensity.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_light_defaults() {
        let light = PointLight::default();
        assert_eq!(light.intensity, 50.0);
        assert_eq!(light.position, Vec3::ZERO);
    }

    #[test]
    fn test_negative_intensity_clamped() {
        assert_eq!(PointLight::new(Vec3::ONE, -3.0).intensity, 0.0);
    }
}
