//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! Thin RAII wrappers over `ash` for everything the frame pipeline touches:
//! - Instance, adapter selection and the logical device
//! - Swapchain management with explicit staleness tracking
//! - Images, samplers, buffers and per-frame uniform rings
//! - Descriptor layouts and per-frame descriptor sets
//! - The MSAA render pass, framebuffers and the graphics pipeline
//! - Command recording and synchronization primitives

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod uniform;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_device_is_shareable() {
        assert_send_sync::<device::Device>();
    }

    #[test]
    fn test_gpu_resources_are_shareable() {
        assert_send_sync::<buffer::Buffer>();
        assert_send_sync::<image::GpuImage>();
        assert_send_sync::<sampler::Sampler>();
        assert_send_sync::<uniform::UniformRing>();
    }
}
