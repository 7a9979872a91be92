//! Cameras: a perspective projection plus one of two view strategies.
//!
//! [`CameraRig::Orbit`] circles a target point under mouse drag.
//! [`CameraRig::Fly`] moves freely with WASD and rotates with Euler angles.
//! Both are driven by the same per-frame [`CameraInput`].

use glam::{Mat4, Vec2, Vec3};

use crate::transform::wrap_degrees;

/// Perspective projection with the Vulkan clip-space Y flip applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_y: 70.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    /// Takes the field of view in degrees and stores it in radians.
    pub fn new(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    /// Updates the aspect ratio; a zero-sized viewport keeps the old one.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Right-handed perspective mapping depth to `[0, 1]`.
    pub fn matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        // Flip Y for Vulkan coordinate system
        proj.y_axis.y *= -1.0;
        proj
    }
}

/// Input sampled for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraInput {
    /// Cursor movement in pixels since the last frame.
    pub mouse_delta: Vec2,
    /// Whether the rotate button (right mouse) is held.
    pub looking: bool,
    /// Movement intent in camera space: x right, y up, z forward, each in `[-1, 1]`.
    pub movement: Vec3,
    /// Roll intent in `[-1, 1]`, positive rolls clockwise.
    pub roll: f32,
    /// Scroll wheel lines since the last frame.
    pub scroll: f32,
}

/// Degrees of roll per second at full roll input.
pub const ROLL_RATE: f32 = 60.0;

/// Free camera.
///
/// The world transform is `T(position) * Ry(yaw) * Rz(roll) * Rx(pitch)`
/// and the view matrix is its inverse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlyCamera {
    pub position: Vec3,
    /// Degrees: pitch (x), yaw (y), roll (z), each in `[0, 360)`.
    pub rotation: Vec3,
    /// World units per second.
    pub move_speed: f32,
    /// Degrees per pixel of mouse movement.
    pub rotate_speed: f32,
}

impl FlyCamera {
    /// Wraps `rotation` into `[0, 360)`.
    pub fn new(position: Vec3, rotation: Vec3, move_speed: f32, rotate_speed: f32) -> Self {
        Self {
            position,
            rotation: wrap_degrees(rotation),
            move_speed,
            rotate_speed,
        }
    }

    /// Fly camera at `position` with no roll, facing `target`.
    pub fn looking_at(position: Vec3, target: Vec3, move_speed: f32, rotate_speed: f32) -> Self {
        let dir = (target - position).normalize_or_zero();
        let rotation = if dir == Vec3::ZERO {
            Vec3::ZERO
        } else {
            Vec3::new(
                dir.y.clamp(-1.0, 1.0).asin().to_degrees(),
                (-dir.x).atan2(-dir.z).to_degrees(),
                0.0,
            )
        };
        Self::new(position, rotation, move_speed, rotate_speed)
    }

    /// `Ry * Rz * Rx` of the Euler angles.
    fn rotation_matrix(&self) -> Mat4 {
        Mat4::from_rotation_y(self.rotation.y.to_radians())
            * Mat4::from_rotation_z(self.rotation.z.to_radians())
            * Mat4::from_rotation_x(self.rotation.x.to_radians())
    }

    /// Camera-to-world transform.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * self.rotation_matrix()
    }

    /// World-to-camera transform.
    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix().inverse()
    }

    /// Unit view direction, -Z in camera space.
    pub fn forward(&self) -> Vec3 {
        self.rotation_matrix().transform_vector3(Vec3::NEG_Z)
    }

    pub fn right(&self) -> Vec3 {
        self.rotation_matrix().transform_vector3(Vec3::X)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation_matrix().transform_vector3(Vec3::Y)
    }

    /// Adds `degrees` to the Euler angles, wrapping each into `[0, 360)`.
    pub fn rotate(&mut self, degrees: Vec3) {
        self.rotation = wrap_degrees(self.rotation + degrees);
    }

    /// Moves by `delta` in world space.
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    /// Applies look, roll and translation from one frame of input.
    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        if input.looking {
            // Dragging right turns right; dragging down pitches down.
            self.rotate(Vec3::new(
                -input.mouse_delta.y * self.rotate_speed,
                -input.mouse_delta.x * self.rotate_speed,
                0.0,
            ));
        }
        if input.roll != 0.0 {
            self.rotate(Vec3::new(0.0, 0.0, input.roll * ROLL_RATE * dt));
        }

        let m = input.movement;
        if m != Vec3::ZERO {
            let delta = self.right() * m.x + self.up() * m.y + self.forward() * m.z;
            self.translate(delta * self.move_speed * dt);
        }
    }
}

/// Distance below which the orbit camera stops zooming in.
pub const MIN_ORBIT_DISTANCE: f32 = 0.5;
/// Degrees, keeps the view off the poles.
const MAX_PITCH: f32 = 89.0;
/// Fraction of the distance removed per scroll line.
const ZOOM_STEP: f32 = 0.1;

/// Camera on a sphere around `target`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    /// Never below [`MIN_ORBIT_DISTANCE`].
    pub distance: f32,
    /// Degrees around the Y axis, 0 looks down -Z.
    pub yaw: f32,
    /// Degrees above the horizon, clamped to avoid the poles.
    pub pitch: f32,
    /// Zoom speed for forward/back movement, units per second.
    pub move_speed: f32,
    /// Degrees per pixel of mouse drag.
    pub rotate_speed: f32,
}

impl OrbitCamera {
    /// Orbit that starts at `position` looking at `target`.
    pub fn looking_at(position: Vec3, target: Vec3, move_speed: f32, rotate_speed: f32) -> Self {
        let offset = position - target;
        let distance = offset.length().max(MIN_ORBIT_DISTANCE);
        let (yaw, pitch) = if offset.length_squared() > 0.0 {
            let dir = offset / offset.length();
            (
                dir.x.atan2(dir.z).to_degrees(),
                dir.y.clamp(-1.0, 1.0).asin().to_degrees(),
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            target,
            distance,
            yaw,
            pitch: pitch.clamp(-MAX_PITCH, MAX_PITCH),
            move_speed,
            rotate_speed,
        }
    }

    /// Eye position derived from the spherical coordinates.
    pub fn position(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.target
            + self.distance * Vec3::new(pitch.cos() * yaw.sin(), pitch.sin(), pitch.cos() * yaw.cos())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Drag orbits, scroll zooms by a fixed ratio per line, forward/back
    /// movement dollies toward the target.
    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        if input.looking {
            self.yaw = (self.yaw - input.mouse_delta.x * self.rotate_speed).rem_euclid(360.0);
            self.pitch = (self.pitch + input.mouse_delta.y * self.rotate_speed)
                .clamp(-MAX_PITCH, MAX_PITCH);
        }

        let mut distance = self.distance;
        if input.scroll != 0.0 {
            distance *= 1.0 - ZOOM_STEP * input.scroll;
        }
        distance -= input.movement.z * self.move_speed * dt;
        self.distance = distance.max(MIN_ORBIT_DISTANCE);
    }
}

/// The two camera strategies, switchable from configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraRig {
    Orbit(OrbitCamera),
    Fly(FlyCamera),
}

impl CameraRig {
    pub fn view_matrix(&self) -> Mat4 {
        match self {
            CameraRig::Orbit(orbit) => orbit.view_matrix(),
            CameraRig::Fly(fly) => fly.view_matrix(),
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            CameraRig::Orbit(orbit) => orbit.position(),
            CameraRig::Fly(fly) => fly.position,
        }
    }

    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        match self {
            CameraRig::Orbit(orbit) => orbit.update(input, dt),
            CameraRig::Fly(fly) => fly.update(input, dt),
        }
    }

    /// Strategy label used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CameraRig::Orbit(_) => "orbit",
            CameraRig::Fly(_) => "fly",
        }
    }
}

/// A view strategy and its projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub rig: CameraRig,
    pub projection: Projection,
}

impl Camera {
    /// Pairs a rig with its projection.
    pub fn new(rig: CameraRig, projection: Projection) -> Self {
        Self { rig, projection }
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.rig.view_matrix()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    pub fn position(&self) -> Vec3 {
        self.rig.position()
    }

    /// Advances the rig by one frame of `input`; `dt` is in seconds.
    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        self.rig.update(input, dt);
    }

    /// Keeps the aspect ratio in step with the swapchain extent.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.projection.set_viewport(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    #[test]
    fn test_projection_flips_y() {
        let proj = Projection::default().matrix();
        let unflipped =
            Mat4::perspective_rh(70.0_f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0);
        assert_eq!(proj.y_axis.y, -unflipped.y_axis.y);
        assert_eq!(proj.x_axis.x, unflipped.x_axis.x);
    }

    #[test]
    fn test_projection_ignores_zero_viewport() {
        let mut proj = Projection::default();
        proj.set_viewport(800, 400);
        assert_eq!(proj.aspect, 2.0);
        proj.set_viewport(0, 400);
        assert_eq!(proj.aspect, 2.0);
    }

    #[test]
    fn test_fly_view_is_inverse_of_world() {
        let cam = FlyCamera::new(Vec3::new(3.0, 3.0, 3.0), Vec3::new(10.0, 45.0, 5.0), 1.0, 0.5);
        let product = cam.view_matrix() * cam.world_matrix();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, EPSILON));
        // Camera origin maps to the view-space origin.
        let origin = cam.view_matrix().transform_point3(cam.position);
        assert!(approx_eq_vec3(origin, Vec3::ZERO));
    }

    #[test]
    fn test_fly_yaw_turns_forward() {
        let cam = FlyCamera::new(Vec3::ZERO, Vec3::new(0.0, 90.0, 0.0), 1.0, 0.5);
        assert!(approx_eq_vec3(cam.forward(), Vec3::NEG_X));
        assert!(approx_eq_vec3(cam.right(), Vec3::NEG_Z));
    }

    #[test]
    fn test_fly_moves_along_forward() {
        let mut cam = FlyCamera::new(Vec3::ZERO, Vec3::ZERO, 2.0, 0.5);
        let input = CameraInput {
            movement: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        cam.update(&input, 0.5);
        assert!(approx_eq_vec3(cam.position, Vec3::new(0.0, 0.0, -1.0)));

        let input = CameraInput {
            movement: Vec3::new(1.0, 1.0, 0.0),
            ..Default::default()
        };
        cam.update(&input, 1.0);
        assert!(approx_eq_vec3(cam.position, Vec3::new(2.0, 2.0, -1.0)));
    }

    #[test]
    fn test_fly_mouse_only_while_looking() {
        let mut cam = FlyCamera::new(Vec3::ZERO, Vec3::ZERO, 1.0, 0.5);
        let mut input = CameraInput {
            mouse_delta: Vec2::new(10.0, 4.0),
            ..Default::default()
        };
        cam.update(&input, 0.016);
        assert_eq!(cam.rotation, Vec3::ZERO);

        input.looking = true;
        cam.update(&input, 0.016);
        // -4 * 0.5 pitch and -10 * 0.5 yaw, wrapped into [0, 360).
        assert!(approx_eq_vec3(cam.rotation, Vec3::new(358.0, 355.0, 0.0)));
    }

    #[test]
    fn test_fly_roll_rate() {
        let mut cam = FlyCamera::new(Vec3::ZERO, Vec3::ZERO, 1.0, 0.5);
        let input = CameraInput {
            roll: 1.0,
            ..Default::default()
        };
        cam.update(&input, 0.5);
        assert!((cam.rotation.z - ROLL_RATE * 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_fly_looking_at_faces_target() {
        let position = Vec3::new(3.0, 3.0, 3.0);
        let cam = FlyCamera::looking_at(position, Vec3::ZERO, 3.0, 0.5);
        let expected = (-position).normalize();
        assert!(approx_eq_vec3(cam.forward(), expected), "got {:?}", cam.forward());
        assert_eq!(cam.rotation.z, 0.0);
    }

    #[test]
    fn test_orbit_looking_at_round_trips_position() {
        let orbit = OrbitCamera::looking_at(Vec3::new(3.0, 3.0, 3.0), Vec3::ZERO, 1.0, 0.5);
        assert!(approx_eq_vec3(orbit.position(), Vec3::new(3.0, 3.0, 3.0)));
        assert!((orbit.yaw - 45.0).abs() < EPSILON);
    }

    #[test]
    fn test_orbit_view_targets_center() {
        let orbit = OrbitCamera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0, 0.5);
        let target = orbit.view_matrix().transform_point3(Vec3::ZERO);
        // Target sits straight ahead on the view-space -Z axis.
        assert!(approx_eq_vec3(target, Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn test_orbit_pitch_clamped_and_zoom_floor() {
        let mut orbit = OrbitCamera::looking_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, 1.0, 1.0);
        let input = CameraInput {
            looking: true,
            mouse_delta: Vec2::new(0.0, 500.0),
            scroll: 100.0,
            ..Default::default()
        };
        orbit.update(&input, 0.016);
        assert_eq!(orbit.pitch, 89.0);
        assert_eq!(orbit.distance, MIN_ORBIT_DISTANCE);
    }

    #[test]
    fn test_rig_dispatch() {
        let fly = FlyCamera::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, 1.0, 0.5);
        let rig = CameraRig::Fly(fly);
        assert_eq!(rig.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(rig.view_matrix(), fly.view_matrix());
        assert_eq!(rig.name(), "fly");

        let mut camera = Camera::new(rig, Projection::default());
        camera.set_viewport(100, 100);
        assert_eq!(camera.projection.aspect, 1.0);
    }
}
