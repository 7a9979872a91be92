//! Hook for UI drawn inside the main render pass.
//!
//! The renderer calls [`UiOverlay::record`] once per frame, after the scene
//! draws and before the render pass ends.

use vkpipe_rhi::RhiResult;
use vkpipe_rhi::command::CommandBuffer;

/// Appends draw commands after every scene object has been drawn.
///
/// `cmd` is mid-render-pass with the mesh pipeline bound; an overlay that
/// binds its own pipeline leaves it bound when it returns.
pub trait UiOverlay {
    fn record(&mut self, cmd: &CommandBuffer) -> RhiResult<()>;
}

/// Draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOverlay;

impl UiOverlay for NoOverlay {
    fn record(&mut self, _cmd: &CommandBuffer) -> RhiResult<()> {
        Ok(())
    }
}
