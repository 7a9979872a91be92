//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
///
/// Everything here is fatal to the caller. Per-frame swapchain staleness is
/// reported through [`crate::swapchain::AcquireOutcome`] and
/// [`crate::swapchain::PresentOutcome`] instead.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No GPU satisfies the device requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A required queue family is missing on the selected device
    #[error("Queue family not found: {0}")]
    QueueFamilyNotFound(&'static str),

    /// No candidate format supports the requested features
    #[error("No supported format among {candidates:?} for {features:?}")]
    NoSupportedFormat {
        candidates: Vec<vk::Format>,
        features: vk::FormatFeatureFlags,
    },

    /// A layout pair outside the supported transition table
    #[error("Unsupported image layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    /// The format cannot be blitted with a linear filter
    #[error("Format {0:?} does not support linear blitting")]
    UnsupportedBlitFormat(vk::Format),

    /// A uniform payload does not match the shape the ring was created for
    #[error("Uniform payload is {actual} bytes, ring expects exactly {expected}")]
    PayloadSizeMismatch { expected: usize, actual: usize },

    /// A frame slot index outside `0..slots`
    #[error("Frame slot {slot} out of range (slots: {slots})")]
    FrameSlotOutOfRange { slot: usize, slots: usize },

    /// Descriptor targets do not fit the binding shape
    #[error("Descriptor binding mismatch: {0}")]
    BindingMismatch(String),

    /// Shader loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Buffer or image parameters rejected before reaching Vulkan
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
