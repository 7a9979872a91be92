//! Framebuffers, one per swapchain image.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Framebuffers in swapchain image order.
///
/// Each one references the shared color and depth targets plus its own
/// swapchain view as the resolve attachment, so any of the three being
/// replaced means this set must be rebuilt.
pub struct Framebuffers {
    device: Arc<Device>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl Framebuffers {
    /// Creates one framebuffer per entry of `swapchain_views`.
    ///
    /// # Arguments
    ///
    /// * `render_pass` - The three-attachment pass the framebuffers must match
    /// * `color_view` - Shared multisampled color target
    /// * `depth_view` - Shared multisampled depth target
    /// * `swapchain_views` - Resolve targets, in swapchain image order
    /// * `extent` - Size of every attachment
    ///
    /// # Errors
    ///
    /// Returns an error if any framebuffer cannot be created. Those already
    /// created are destroyed.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        swapchain_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let mut built = Self {
            device,
            framebuffers: Vec::with_capacity(swapchain_views.len()),
            extent,
        };

        for &resolve_view in swapchain_views {
            let attachments = attachments_for(color_view, depth_view, resolve_view);
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            // Already created framebuffers are released by Drop on failure.
            let framebuffer = unsafe { built.device.handle().create_framebuffer(&create_info, None)? };
            built.framebuffers.push(framebuffer);
        }

        debug!(
            "Created {} framebuffer(s) at {}x{}",
            built.framebuffers.len(),
            extent.width,
            extent.height
        );
        Ok(built)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    #[inline]
    pub fn get(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        for framebuffer in self.framebuffers.drain(..) {
            unsafe { self.device.handle().destroy_framebuffer(framebuffer, None) };
        }
    }
}

/// Attachment order matches the render pass: color, depth, resolve.
fn attachments_for(
    color_view: vk::ImageView,
    depth_view: vk::ImageView,
    resolve_view: vk::ImageView,
) -> [vk::ImageView; 3] {
    [color_view, depth_view, resolve_view]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_attachment_order_matches_render_pass() {
        let color = vk::ImageView::from_raw(1);
        let depth = vk::ImageView::from_raw(2);
        let resolve = vk::ImageView::from_raw(3);
        let attachments = attachments_for(color, depth, resolve);
        assert_eq!(
            attachments[crate::render_pass::COLOR_ATTACHMENT as usize],
            color
        );
        assert_eq!(
            attachments[crate::render_pass::DEPTH_ATTACHMENT as usize],
            depth
        );
        assert_eq!(
            attachments[crate::render_pass::RESOLVE_ATTACHMENT as usize],
            resolve
        );
    }
}
