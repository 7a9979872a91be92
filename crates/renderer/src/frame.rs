//! Per-frame-slot command buffer and synchronization.
//!
//! The renderer keeps one [`FrameSlot`] per frame in flight and cycles
//! through them in order.

use std::sync::Arc;

use tracing::debug;

use vkpipe_rhi::RhiResult;
use vkpipe_rhi::command::{CommandBuffer, CommandPool};
use vkpipe_rhi::device::Device;
use vkpipe_rhi::sync::SlotSync;

/// One frame in flight: its command buffer plus the semaphores and fence
/// guarding it.
pub struct FrameSlot {
    /// Re-recorded every time the slot is reused.
    pub cmd: CommandBuffer,
    pub sync: SlotSync,
}

impl FrameSlot {
    /// Creates `count` slots with buffers from `pool`. Fences start signaled.
    ///
    /// # Errors
    ///
    /// Returns an error if command buffer allocation or sync object creation
    /// fails.
    pub fn create_all(
        device: &Arc<Device>,
        pool: &CommandPool,
        count: usize,
    ) -> RhiResult<Vec<FrameSlot>> {
        let buffers = pool.allocate(count as u32)?;
        let slots = buffers
            .into_iter()
            .map(|cmd| {
                Ok(FrameSlot {
                    cmd,
                    sync: SlotSync::new(device.clone())?,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;
        debug!("Created {} frame slot(s)", slots.len());
        Ok(slots)
    }
}
