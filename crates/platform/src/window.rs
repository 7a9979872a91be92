//! Window management using winit, and Vulkan surface creation.
//!
//! [`Window`] tracks the framebuffer size and a pending-resize flag which the
//! renderer consumes through [`SurfaceSource`]. [`Surface`] destroys its
//! `VkSurfaceKHR` on drop.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkpipe_core::{Error, Result};
use vkpipe_rhi::instance::Instance;
use vkpipe_rhi::{RhiError, RhiResult};

/// What the frame renderer needs from the windowing system.
pub trait SurfaceSource {
    /// Current framebuffer size in pixels. Either side may be zero while
    /// the window is minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Returns whether a resize happened since the last call, clearing the flag.
    fn take_resized(&mut self) -> bool;
}

/// RAII wrapper for a Vulkan surface.
///
/// The caller must ensure that the Vulkan instance outlives this surface.
pub struct Surface {
    handle: vk::SurfaceKHR,
    /// Instance-level loader used for queries and destruction.
    surface_loader: ash::khr::surface::Instance,
}

impl Surface {
    /// The raw surface handle.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Loader for `VK_KHR_surface` support queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: created by ash_window::create_surface from the same instance
        // as the loader, and destroyed only here.
        unsafe {
            self.surface_loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// A winit window plus the resize bookkeeping the renderer polls.
pub struct Window {
    window: Arc<WinitWindow>,
    /// Last known inner size in physical pixels.
    width: u32,
    height: u32,
    /// Set by [`Window::resize`], cleared by `take_resized`.
    resized: bool,
}

impl Window {
    /// Opens a resizable window with an inner size of `width` x `height`.
    ///
    /// # Errors
    ///
    /// Returns an error if winit cannot create the window.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        // The compositor may not honour the requested size.
        let size = window.inner_size();
        tracing::info!("Window created: {}x{}", size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
            resized: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records a new size (call this when handling resize events).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resized = true;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Display handle used to pick the instance's surface extensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the handle is unavailable.
    pub fn raw_display_handle(&self) -> Result<raw_window_handle::RawDisplayHandle> {
        self.window
            .display_handle()
            .map(|handle| handle.as_raw())
            .map_err(|e| Error::Window(format!("Failed to get display handle: {e}")))
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    /// Creates a Vulkan surface for this window.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SurfaceError`] if a raw handle is unavailable,
    /// otherwise any surface creation error.
    pub fn create_surface(&self, instance: &Instance) -> RhiResult<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {e}")))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get window handle: {e}")))?;

        // SAFETY: the instance is valid and the handles come from a live
        // winit window. The surface is destroyed in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                instance.entry(),
                instance.handle(),
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )?
        };

        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            surface_loader,
        })
    }
}

impl SurfaceSource for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }
}
