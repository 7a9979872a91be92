//! Uniform payloads shared with the shaders.
//!
//! Every struct is `#[repr(C)]` with std140-compatible padding, so the byte
//! image produced by `bytemuck` is exactly what the shader block expects.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Per-object transform block (set 0).
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl ObjectUniform {
    /// Byte length a ring for this block is created with.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(model: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self { model, view, proj }
    }
}

/// Per-light and material block (set 1).
///
/// # Memory Layout
///
/// - Offset 0: camera position (12 bytes)
/// - Offset 12: light intensity (4 bytes)
/// - Offset 16: light position (12 bytes) + padding
/// - Offset 32: specular coefficient (12 bytes) + padding
/// - Total size: 48 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct LightingUniform {
    pub camera_position: Vec3,
    /// Already clamped to be non-negative.
    pub light_intensity: f32,
    pub light_position: Vec3,
    pub _pad0: f32,
    /// Blinn-Phong specular coefficient per channel.
    pub ks: Vec3,
    pub _pad1: f32,
}

impl LightingUniform {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(camera_position: Vec3, light_position: Vec3, light_intensity: f32, ks: Vec3) -> Self {
        Self {
            camera_position,
            light_intensity,
            light_position,
            _pad0: 0.0,
            ks,
            _pad1: 0.0,
        }
    }
}

/// Compute-pass parameters.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ComputeParams {
    /// Seconds since the previous frame.
    pub delta: f32,
    pub _pad: [f32; 3],
}

impl ComputeParams {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(delta: f32) -> Self {
        Self {
            delta,
            _pad: [0.0; 3],
        }
    }
}

/// The closed set of uniform payloads a ring can be created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformShape {
    Object,
    Lighting,
    Compute,
}

impl UniformShape {
    /// Exact payload length in bytes.
    pub fn size(self) -> usize {
        match self {
            UniformShape::Object => ObjectUniform::SIZE,
            UniformShape::Lighting => LightingUniform::SIZE,
            UniformShape::Compute => ComputeParams::SIZE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UniformShape::Object => "object",
            UniformShape::Lighting => "lighting",
            UniformShape::Compute => "compute",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(ObjectUniform::SIZE, 192);
        assert_eq!(LightingUniform::SIZE, 48);
        assert_eq!(ComputeParams::SIZE, 16);
        assert_eq!(UniformShape::Lighting.size(), 48);
    }

    #[test]
    fn test_lighting_field_offsets() {
        assert_eq!(std::mem::offset_of!(LightingUniform, light_intensity), 12);
        assert_eq!(std::mem::offset_of!(LightingUniform, light_position), 16);
        assert_eq!(std::mem::offset_of!(LightingUniform, ks), 32);
    }

    #[test]
    fn test_object_uniform_bytes() {
        let ubo = ObjectUniform::new(Mat4::IDENTITY, Mat4::ZERO, Mat4::IDENTITY);
        let bytes = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), ObjectUniform::SIZE);
        // model[0][0] is 1.0, view[0][0] is 0.0
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[64..68], &0.0f32.to_ne_bytes());
    }
}
