//! Scene-side math.
//!
//! - Object transforms with Euler rotation in degrees
//! - Orbit and fly cameras behind a single [`CameraRig`]
//! - Point light parameters

pub mod camera;
pub mod light;
pub mod transform;

pub use camera::{Camera, CameraInput, CameraRig, FlyCamera, OrbitCamera, Projection};
pub use light::PointLight;
pub use transform::Transform;
