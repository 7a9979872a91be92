//! Frame pipeline on top of the RHI.
//!
//! This crate orchestrates the rendering process:
//! - The per-frame draw protocol and swapchain rebuild decisions
//! - Frame slots, render targets and framebuffers
//! - Per-object GPU state: meshes, textures, uniform rings, descriptor sets
//! - The UI overlay hook

pub mod frame;
pub mod mesh;
pub mod object;
pub mod overlay;
pub mod renderer;
pub mod scheduler;
pub mod targets;
pub mod texture;
pub mod ubo;

pub use object::{ObjectDesc, ObjectKind, SceneObject};
pub use overlay::{NoOverlay, UiOverlay};
pub use renderer::{FrameView, Renderer};
pub use scheduler::{FrameBackend, FrameOutcome, FrameScheduler, FrameStats, SlotState};

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
