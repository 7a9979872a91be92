//! Platform layer: winit window, Vulkan surface and input state.

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, SurfaceSource, Window};

// Re-export winit types that users might need
pub use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
