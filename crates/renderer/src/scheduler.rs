//! The per-frame draw protocol, independent of what is drawn.
//!
//! [`FrameScheduler::draw`] runs one tick of
//! `wait -> acquire -> reset -> record -> submit -> present -> advance`
//! against a [`FrameBackend`] and decides when the swapchain and everything
//! derived from it must be rebuilt. The backend only executes the steps it
//! is told to, so the whole protocol can be driven by a scripted backend.

use ash::vk;
use tracing::{debug, trace};

use vkpipe_platform::SurfaceSource;
use vkpipe_rhi::RhiResult;
use vkpipe_rhi::swapchain::{AcquireOutcome, PresentOutcome};

/// The GPU-facing half of a frame.
///
/// Every method is called with the frame slot the scheduler is currently
/// working on. Errors are fatal and propagate out of [`FrameScheduler::draw`].
pub trait FrameBackend {
    /// Blocks until the slot's fence has signaled.
    fn wait_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Asks for the next presentable image, signalling the slot's
    /// image-available semaphore.
    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    /// Unsignals the slot's fence. Only called after a successful acquire.
    fn reset_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Writes the slot's uniform data and records its command buffer for
    /// `image_index`.
    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Submits the slot's command buffer, signalling its fence on completion.
    fn submit(&mut self, slot: usize) -> RhiResult<()>;

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Rebuilds the swapchain and every resource derived from it.
    fn rebuild(&mut self, extent: vk::Extent2D) -> RhiResult<()>;
}

/// Where a frame slot is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Idle,
    Recording,
    Submitted,
    Presented,
}

/// What one call to [`FrameScheduler::draw`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame went through the whole cycle. `rebuilt` is set when the
    /// swapchain was rebuilt after presenting.
    Presented {
        slot: usize,
        image_index: u32,
        rebuilt: bool,
    },
    /// Acquire reported the swapchain out of date. It was rebuilt and the
    /// slot was not advanced.
    Rebuilt,
    /// The surface has no area; nothing was touched.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    pub presented: u64,
    pub rebuilds: u64,
    pub skipped: u64,
}

/// Frame slot ring plus the pending-rebuild flag.
#[derive(Debug)]
pub struct FrameScheduler {
    current: usize,
    states: Vec<SlotState>,
    rebuild_pending: bool,
    stats: FrameStats,
}

impl FrameScheduler {
    /// A scheduler cycling through `slots` frame slots (at least one).
    pub fn new(slots: usize) -> Self {
        Self {
            current: 0,
            states: vec![SlotState::Idle; slots.max(1)],
            rebuild_pending: false,
            stats: FrameStats::default(),
        }
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// State of `slot`, or `None` past the last slot.
    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.states.get(slot).copied()
    }

    /// Forces a rebuild at the start of the next frame.
    pub fn request_rebuild(&mut self) {
        self.rebuild_pending = true;
    }

    #[inline]
    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Runs one frame.
    pub fn draw<B, S>(&mut self, backend: &mut B, surface: &mut S) -> RhiResult<FrameOutcome>
    where
        B: FrameBackend + ?Sized,
        S: SurfaceSource + ?Sized,
    {
        if surface.take_resized() {
            self.rebuild_pending = true;
        }

        let Some(extent) = surface_extent(surface) else {
            // Rebuild once the window has area again.
            self.rebuild_pending = true;
            self.stats.skipped += 1;
            trace!("Surface has no area, skipping frame");
            return Ok(FrameOutcome::Skipped);
        };

        if self.rebuild_pending {
            self.rebuild(backend, extent)?;
        }

        let slot = self.current;
        backend.wait_slot(slot)?;
        self.states[slot] = SlotState::Idle;

        let (image_index, suboptimal) = match backend.acquire(slot)? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date on acquire (slot {})", slot);
                self.rebuild(backend, extent)?;
                return Ok(FrameOutcome::Rebuilt);
            }
        };

        backend.reset_slot(slot)?;
        self.states[slot] = SlotState::Recording;
        backend.record(slot, image_index)?;
        backend.submit(slot)?;
        self.states[slot] = SlotState::Submitted;
        let presented = backend.present(slot, image_index)?;
        self.states[slot] = SlotState::Presented;

        self.current = (slot + 1) % self.states.len();
        self.stats.presented += 1;

        let resized = surface.take_resized();
        let stale = suboptimal || presented == PresentOutcome::Stale || resized;
        let mut rebuilt = false;
        if stale {
            debug!(
                "Rebuilding after present (suboptimal: {}, stale: {}, resized: {})",
                suboptimal,
                presented == PresentOutcome::Stale,
                resized
            );
            match surface_extent(surface) {
                Some(extent) => {
                    self.rebuild(backend, extent)?;
                    rebuilt = true;
                }
                None => self.rebuild_pending = true,
            }
        }

        Ok(FrameOutcome::Presented {
            slot,
            image_index,
            rebuilt,
        })
    }

    fn rebuild<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        extent: vk::Extent2D,
    ) -> RhiResult<()> {
        backend.rebuild(extent)?;
        self.rebuild_pending = false;
        self.stats.rebuilds += 1;
        Ok(())
    }
}

fn surface_extent<S: SurfaceSource + ?Sized>(surface: &S) -> Option<vk::Extent2D> {
    let (width, height) = surface.framebuffer_size();
    (width > 0 && height > 0).then_some(vk::Extent2D { width, height })
}
