//! Object placement: position, Euler rotation in degrees, scale.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Placement of a scene object.
///
/// Rotation is stored as Euler angles in degrees (pitch about X, yaw about
/// Y, roll about Z) and composed as `yaw * pitch * roll`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Degrees, each component in `[0, 360)` once rotated.
    pub rotation: Vec3,
    /// Per-axis, may be non-uniform.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Identity placement.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, degrees: Vec3) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// The Euler rotation as a quaternion.
    pub fn quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        )
    }

    /// Scale, then rotate, then translate.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }

    /// Adds `degrees` to the rotation, keeping each angle in `[0, 360)`.
    pub fn rotate(&mut self, degrees: Vec3) {
        self.rotation = wrap_degrees(self.rotation + degrees);
    }
}

/// Wraps each component into `[0, 360)`.
pub fn wrap_degrees(v: Vec3) -> Vec3 {
    Vec3::new(
        v.x.rem_euclid(360.0),
        v.y.rem_euclid(360.0),
        v.z.rem_euclid(360.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Vec3::ZERO);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_model_matrix_order() {
        let t = Transform::new()
            .with_position(Vec3::new(10.0, 0.0, 0.0))
            .with_rotation(Vec3::new(0.0, 90.0, 0.0))
            .with_scale(Vec3::splat(2.0));

        // (1,0,0) scaled to (2,0,0), yawed to (0,0,-2), then moved.
        let p = t.model_matrix().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::new(10.0, 0.0, -2.0)), "got {p:?}");
    }

    #[test]
    fn test_roll_about_z() {
        let t = Transform::new().with_rotation(Vec3::new(0.0, 0.0, 90.0));
        let p = t.model_matrix().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::Y), "got {p:?}");
    }

    #[test]
    fn test_rotate_wraps() {
        let mut t = Transform::new().with_rotation(Vec3::new(350.0, 0.0, 10.0));
        t.rotate(Vec3::new(20.0, -30.0, 0.0));
        assert!(approx_eq_vec3(t.rotation, Vec3::new(10.0, 330.0, 10.0)));
    }
}
