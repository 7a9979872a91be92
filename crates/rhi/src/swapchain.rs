//! Swapchain management.
//!
//! The [`Swapchain`] owns the presentable image chain and its views. It is
//! never patched in place: when the surface goes stale the whole chain is
//! rebuilt through [`Swapchain::recreate`].
//!
//! Staleness reported by acquire or present is not an error. It comes back as
//! [`AcquireOutcome::OutOfDate`] or [`PresentOutcome::Stale`] and moves the
//! swapchain into [`SwapchainState::StaleDetected`].
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use ash::vk;
//! # use vkpipe_rhi::swapchain::{AcquireOutcome, Swapchain, SwapchainConfig};
//! # fn demo(
//! #     instance: &vkpipe_rhi::instance::Instance,
//! #     device: Arc<vkpipe_rhi::device::Device>,
//! #     surface: vk::SurfaceKHR,
//! #     image_available: vk::Semaphore,
//! # ) -> vkpipe_rhi::RhiResult<()> {
//! let extent = vk::Extent2D { width: 1280, height: 720 };
//! let mut swapchain = Swapchain::new(instance, device, surface, extent, SwapchainConfig::default())?;
//!
//! match swapchain.acquire_next_image(image_available)? {
//!     AcquireOutcome::Acquired { image_index, .. } => { /* record and present */ }
//!     AcquireOutcome::OutOfDate => swapchain.recreate(extent)?,
//! }
//! # Ok(()) }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::QueueFamilyIndices;

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    pub fn query(
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count {}..{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            describe_max(capabilities.max_image_count)
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// At least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Lifecycle of the presentable image chain.
///
/// `Uninitialized -> Ready -> StaleDetected -> Rebuilding -> Ready`.
/// A rebuild that fails leaves the chain in `Rebuilding`, where acquire
/// refuses to hand out images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// No chain has been built yet.
    Uninitialized,
    /// Images may be acquired and presented.
    Ready,
    /// Out of date or suboptimal was reported; the current frame may still
    /// present, the next one rebuilds.
    StaleDetected,
    /// Old chain torn down, new chain not yet complete.
    Rebuilding,
}

impl SwapchainState {
    /// Staleness is sticky until a rebuild starts.
    pub fn mark_stale(self) -> Self {
        match self {
            Self::Ready | Self::StaleDetected => Self::StaleDetected,
            other => other,
        }
    }

    /// Any state may start a rebuild.
    pub fn begin_rebuild(self) -> Self {
        Self::Rebuilding
    }

    /// Only valid from `Rebuilding`.
    pub fn finish_rebuild(self) -> Self {
        debug_assert_eq!(self, Self::Rebuilding);
        Self::Ready
    }

    /// Frame work may be submitted against the chain.
    pub fn accepts_frames(self) -> bool {
        matches!(self, Self::Ready | Self::StaleDetected)
    }
}

/// Result of asking for the next presentable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. `suboptimal` still allows this frame to be
    /// drawn, but the chain should be rebuilt after presenting.
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface no longer matches the chain; nothing was acquired.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Presented or dropped, but the chain must be rebuilt before the next frame.
    Stale,
}

/// Creation preferences that survive rebuilds.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    /// Image count to ask for; `None` means `min_image_count + 1`.
    pub requested_image_count: Option<u32>,
    /// Use MAILBOX when available instead of FIFO.
    pub prefer_mailbox: bool,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            requested_image_count: None,
            prefer_mailbox: true,
        }
    }
}

/// Vulkan swapchain wrapper.
///
/// Not thread-safe; the frame loop drives it from one thread.
pub struct Swapchain {
    device: Arc<Device>,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    /// Borrowed; the window owns and destroys the surface.
    surface: vk::SurfaceKHR,
    /// Preferences reapplied on every rebuild.
    config: SwapchainConfig,
    swapchain: vk::SwapchainKHR,
    /// Owned by the swapchain, never destroyed here.
    images: Vec<vk::Image>,
    /// Owned here, destroyed before each rebuild and on drop.
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    state: SwapchainState,
}

/// Raw parts of a freshly built chain.
struct Chain {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates the chain for `surface`.
    ///
    /// `extent_hint` is the window's framebuffer size, used only when the
    /// surface leaves the extent up to the application.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the surface offers no format
    /// or present mode, otherwise any swapchain or view creation error.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        extent_hint: vk::Extent2D,
        config: SwapchainConfig,
    ) -> RhiResult<Self> {
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let mut swapchain = Self {
            device,
            surface_loader,
            swapchain_loader,
            surface,
            config,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            state: SwapchainState::Uninitialized,
        };

        let chain = swapchain.build(extent_hint, vk::SwapchainKHR::null())?;
        swapchain.install(chain);
        swapchain.state = SwapchainState::Ready;
        Ok(swapchain)
    }

    /// Rebuilds the chain for the current surface.
    ///
    /// Blocks until the device is idle, then destroys the old views and the
    /// old swapchain handle. A zero-sized surface is rejected; callers wait
    /// until the window has area again.
    ///
    /// # Errors
    ///
    /// Returns an error if the idle wait or chain creation fails. The
    /// state then stays `Rebuilding`.
    pub fn recreate(&mut self, extent_hint: vk::Extent2D) -> RhiResult<()> {
        self.state = self.state.begin_rebuild();
        self.device.wait_idle()?;

        info!(
            "Recreating swapchain for {}x{}",
            extent_hint.width, extent_hint.height
        );

        self.destroy_image_views();
        let old_swapchain = self.swapchain;
        let built = self.build(extent_hint, old_swapchain);

        // Retired either way: the new chain was created from it, or the
        // surface is lost for it too.
        unsafe {
            self.swapchain_loader.destroy_swapchain(old_swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
        self.images.clear();

        self.install(built?);
        self.state = self.state.finish_rebuild();
        Ok(())
    }

    fn build(&self, extent_hint: vk::Extent2D, old_swapchain: vk::SwapchainKHR) -> RhiResult<Chain> {
        let support = SwapchainSupportDetails::query(
            &self.surface_loader,
            self.device.physical_device(),
            self.surface,
        )?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "surface offers no formats or present modes".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes, self.config.prefer_mailbox);
        let extent = choose_extent(&support.capabilities, extent_hint);
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::SwapchainError(format!(
                "surface extent is {}x{}",
                extent.width, extent.height
            )));
        }
        let image_count =
            determine_image_count(self.config.requested_image_count, &support.capabilities);

        info!(
            "Creating swapchain: {}x{}, {:?}/{:?}, {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        let (sharing_mode, family_indices) = sharing_for(self.device.queue_families())?;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };

        let images = match unsafe { self.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        let image_views = match create_image_views(&self.device, &images, surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };
        debug!("Swapchain has {} images and views", images.len());

        Ok(Chain {
            swapchain,
            images,
            image_views,
            surface_format,
            extent,
            present_mode,
        })
    }

    fn install(&mut self, chain: Chain) {
        self.swapchain = chain.swapchain;
        self.images = chain.images;
        self.image_views = chain.image_views;
        self.format = chain.surface_format.format;
        self.color_space = chain.surface_format.color_space;
        self.extent = chain.extent;
        self.present_mode = chain.present_mode;
    }

    /// Acquires the next image, signalling `semaphore` when it is available.
    ///
    /// A stale chain yields [`AcquireOutcome::OutOfDate`] without touching
    /// the driver, so `semaphore` is left unsignaled.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] while the chain is not ready,
    /// and any acquire error other than out of date.
    pub fn acquire_next_image(&mut self, semaphore: vk::Semaphore) -> RhiResult<AcquireOutcome> {
        match self.state {
            SwapchainState::Ready => {}
            SwapchainState::StaleDetected => return Ok(AcquireOutcome::OutOfDate),
            state => {
                return Err(RhiError::SwapchainError(format!(
                    "cannot acquire while {state:?}"
                )));
            }
        }

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    debug!("Acquire reported a suboptimal swapchain");
                    self.state = self.state.mark_stale();
                }
                Ok(AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Acquire reported an out-of-date swapchain");
                self.state = self.state.mark_stale();
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Queues `image_index` for presentation after `wait_semaphore`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the chain does not accept
    /// frames, and any present error other than out of date or suboptimal.
    pub fn present(
        &mut self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<PresentOutcome> {
        if !self.state.accepts_frames() {
            return Err(RhiError::SwapchainError(format!(
                "cannot present while {:?}",
                self.state
            )));
        }

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };
        match result {
            Ok(false) if self.state == SwapchainState::Ready => Ok(PresentOutcome::Presented),
            Ok(_) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.state = self.state.mark_stale();
                Ok(PresentOutcome::Stale)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Flags the chain stale from outside, e.g. on a window resize.
    pub fn mark_stale(&mut self) {
        self.state = self.state.mark_stale();
    }

    #[inline]
    pub fn state(&self) -> SwapchainState {
        self.state
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// One view per image, in image order.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_image_views(&mut self) {
        for image_view in self.image_views.drain(..) {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

fn describe_max(max_image_count: u32) -> String {
    if max_image_count == 0 {
        "unbounded".to_string()
    } else {
        max_image_count.to_string()
    }
}

/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR, then the first offered format.
///
/// `formats` must be non-empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => format,
        None => {
            warn!(
                "Preferred sRGB surface format unavailable, using {:?}",
                formats[0].format
            );
            formats[0]
        }
    }
}

/// MAILBOX when preferred and offered, else FIFO, which every surface supports.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    prefer_mailbox: bool,
) -> vk::PresentModeKHR {
    if prefer_mailbox && present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }
    vk::PresentModeKHR::FIFO
}

/// The surface's current extent, or the hint clamped to the surface limits
/// when the surface reports `u32::MAX` (extent chosen by the swapchain).
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    extent_hint: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: extent_hint.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: extent_hint.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Image count to request from the surface.
///
/// `requested` is clamped to `[min_image_count, max_image_count]`, with a
/// max of 0 meaning unbounded. Without a request, `min_image_count + 1`.
pub fn determine_image_count(
    requested: Option<u32>,
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> u32 {
    let wanted = requested.unwrap_or(capabilities.min_image_count + 1);
    let at_least_min = wanted.max(capabilities.min_image_count);
    if capabilities.max_image_count > 0 {
        at_least_min.min(capabilities.max_image_count)
    } else {
        at_least_min
    }
}

/// CONCURRENT sharing over both families when graphics and present differ.
fn sharing_for(families: &QueueFamilyIndices) -> RhiResult<(vk::SharingMode, Vec<u32>)> {
    let graphics = families.graphics()?;
    let present = families.present()?;
    if graphics != present {
        Ok((vk::SharingMode::CONCURRENT, vec![graphics, present]))
    } else {
        Ok((vk::SharingMode::EXCLUSIVE, Vec::new()))
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(e.into());
            }
        }
    }

    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        assert_eq!(
            choose_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_choose_present_mode() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, true),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO], true),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };
        assert_eq!(choose_extent(&capabilities, extent(800, 600)), extent(1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(100, 100),
            max_image_extent: extent(2000, 2000),
            ..Default::default()
        };

        assert_eq!(choose_extent(&capabilities, extent(3000, 3000)), extent(2000, 2000));
        assert_eq!(choose_extent(&capabilities, extent(50, 50)), extent(100, 100));
        assert_eq!(choose_extent(&capabilities, extent(800, 600)), extent(800, 600));
    }

    #[test]
    fn test_requested_count_within_bounds_is_kept() {
        assert_eq!(determine_image_count(Some(2), &caps(2, 3)), 2);
        assert_eq!(determine_image_count(Some(3), &caps(2, 3)), 3);
    }

    #[test]
    fn test_requested_count_is_clamped() {
        assert_eq!(determine_image_count(Some(5), &caps(2, 3)), 3);
        assert_eq!(determine_image_count(Some(1), &caps(2, 3)), 2);
        // max == 0 is unbounded
        assert_eq!(determine_image_count(Some(6), &caps(2, 0)), 6);
    }

    #[test]
    fn test_default_count_is_min_plus_one() {
        assert_eq!(determine_image_count(None, &caps(2, 8)), 3);
        assert_eq!(determine_image_count(None, &caps(2, 0)), 3);
        assert_eq!(determine_image_count(None, &caps(3, 3)), 3);
    }

    #[test]
    fn test_state_machine_cycle() {
        let state = SwapchainState::Uninitialized;
        assert!(!state.accepts_frames());
        // Staleness cannot be flagged before the chain exists.
        assert_eq!(state.mark_stale(), SwapchainState::Uninitialized);

        let ready = SwapchainState::Ready;
        let stale = ready.mark_stale();
        assert_eq!(stale, SwapchainState::StaleDetected);
        assert_eq!(stale.mark_stale(), SwapchainState::StaleDetected);
        assert!(stale.accepts_frames());

        let rebuilding = stale.begin_rebuild();
        assert!(!rebuilding.accepts_frames());
        assert_eq!(rebuilding.mark_stale(), SwapchainState::Rebuilding);
        assert_eq!(rebuilding.finish_rebuild(), SwapchainState::Ready);
    }

    #[test]
    fn test_sharing_mode_follows_family_split() {
        let shared = QueueFamilyIndices {
            graphics_compute_family: Some(0),
            present_family: Some(0),
        };
        let (mode, indices) = sharing_for(&shared).unwrap();
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());

        let split = QueueFamilyIndices {
            graphics_compute_family: Some(0),
            present_family: Some(2),
        };
        let (mode, indices) = sharing_for(&split).unwrap();
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate.clone()
        };
        assert!(!no_modes.is_adequate());
    }
}
