//! Multisampled color and depth attachments sized to the swapchain.
//!
//! Both are rebuilt together with the swapchain; the framebuffers that
//! reference them must be rebuilt right after.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use vkpipe_rhi::RhiResult;
use vkpipe_rhi::command::{CommandPool, submit_one_time};
use vkpipe_rhi::device::Device;
use vkpipe_rhi::image::{GpuImage, ImageDesc};

/// Depth formats in order of preference.
pub const DEPTH_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate usable as an optimal-tiling depth attachment.
pub fn find_depth_format(device: &Device) -> RhiResult<vk::Format> {
    device.find_supported_format(
        &DEPTH_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
    )
}

/// Attachments 0 and 1 of the render pass.
pub struct RenderTargets {
    /// Transient, resolved into the swapchain image each frame.
    color: GpuImage,
    /// Left in DEPTH_STENCIL_ATTACHMENT_OPTIMAL after creation.
    depth: GpuImage,
}

impl RenderTargets {
    /// Creates both targets at `extent` with the device's MSAA sample count
    /// and moves depth into its attachment layout.
    ///
    /// # Errors
    ///
    /// Returns an error if either image cannot be created or the layout
    /// transition submission fails.
    pub fn new(
        device: Arc<Device>,
        pool: &CommandPool,
        extent: vk::Extent2D,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RhiResult<Self> {
        let samples = device.msaa_samples();
        let color = GpuImage::new(
            device.clone(),
            ImageDesc::color_target(extent, color_format, samples),
            "msaa color",
        )?;
        let mut depth = GpuImage::new(
            device.clone(),
            ImageDesc::depth_target(extent, depth_format, samples),
            "depth",
        )?;

        submit_one_time(&device, pool, |cmd| {
            depth.transition(cmd, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        })?;

        debug!(
            "Created render targets {}x{} ({:?}, {:?}, {:?})",
            extent.width, extent.height, color_format, depth_format, samples
        );
        Ok(Self { color, depth })
    }

    #[inline]
    pub fn color_view(&self) -> vk::ImageView {
        self.color.view()
    }

    #[inline]
    pub fn depth_view(&self) -> vk::ImageView {
        self.depth.view()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.color.desc().extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkpipe_rhi::image::{aspect_for, has_stencil};

    #[test]
    fn test_depth_candidates_preference() {
        assert_eq!(DEPTH_CANDIDATES[0], vk::Format::D32_SFLOAT);
        assert!(!has_stencil(DEPTH_CANDIDATES[0]));
        assert!(DEPTH_CANDIDATES[1..].iter().all(|&f| has_stencil(f)));
    }

    #[test]
    fn test_stencil_candidates_barrier_aspect() {
        for format in &DEPTH_CANDIDATES[1..] {
            assert!(aspect_for(*format).contains(vk::ImageAspectFlags::STENCIL));
        }
    }
}
