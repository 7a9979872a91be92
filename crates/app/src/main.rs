//! vkpipe demo
//!
//! Renders the configured scene through the frame pipeline. The first
//! command-line argument, if any, is the path of a TOML config file.

mod controls;
mod scene;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use vkpipe_core::{Config, FpsCounter, Timer};
use vkpipe_platform::{InputState, MouseButton, Window};
use vkpipe_renderer::{FrameOutcome, FrameView, NoOverlay, Renderer};
use vkpipe_resources::builtin;
use vkpipe_scene::Camera;

/// Pixels per scroll line for touchpad-style wheel events.
const PIXELS_PER_LINE: f64 = 20.0;

/// Application state driven by the winit event loop.
struct App {
    config: Config,
    // Declared before the window so it drops first.
    renderer: Option<Renderer>,
    window: Option<Window>,
    camera: Camera,
    input: InputState,
    timer: Timer,
    fps: FpsCounter,
    /// Index into [`builtin::TEXTURE_NAMES`] applied by the texture cycle key.
    texture_cycle: usize,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        let camera = scene::build_camera(&config.camera, config.window.width, config.window.height);
        Self {
            config,
            renderer: None,
            window: None,
            camera,
            input: InputState::new(),
            timer: Timer::new(),
            fps: FpsCounter::default(),
            texture_cycle: 0,
            fatal: None,
        }
    }

    /// Creates the window and renderer and uploads the scene.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_config = &self.config.window;
        let window = Window::new(
            event_loop,
            window_config.width,
            window_config.height,
            &window_config.title,
        )
        .context("failed to create window")?;

        let mut renderer =
            Renderer::new(&window, &self.config.graphics).context("failed to create renderer")?;

        for desc in scene::object_descs(&self.config.scene)? {
            renderer
                .add_object(&desc)
                .with_context(|| format!("failed to upload object '{}'", desc.name))?;
        }

        let extent = renderer.extent();
        self.camera.set_viewport(extent.width, extent.height);

        info!(
            "Initialization complete: {} objects, {} swapchain images",
            renderer.objects().len(),
            renderer.image_count()
        );
        self.window = Some(window);
        self.renderer = Some(renderer);
        self.timer.reset();
        Ok(())
    }

    /// Advances the simulation by one frame and renders it.
    fn redraw(&mut self) -> Result<()> {
        let (Some(window), Some(renderer)) = (self.window.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let frame_time = self.timer.tick();
        let dt = frame_time.as_secs_f32();

        if self.input.is_key_just_pressed(controls::CYCLE_TEXTURE) {
            self.texture_cycle = (self.texture_cycle + 1) % builtin::TEXTURE_NAMES.len();
            let name = builtin::TEXTURE_NAMES[self.texture_cycle];
            let data = builtin::texture(name)?;
            let renderables: Vec<usize> = renderer
                .objects()
                .iter()
                .enumerate()
                .filter(|(_, object)| object.light().is_none())
                .map(|(index, _)| index)
                .collect();
            for index in renderables {
                renderer
                    .replace_texture(index, 0, &data)
                    .with_context(|| format!("failed to swap texture of object {index}"))?;
            }
            info!("Textures switched to '{}'", name);
        }

        self.camera.update(&controls::camera_input(&self.input), dt);
        for object in renderer.objects_mut() {
            let body = object.body_mut();
            scene::spin(&mut body.transform, body.rotate_speed, dt);
        }

        let view = FrameView::from_camera(&self.camera);
        let outcome = renderer.render_frame(window, &view, &mut NoOverlay)?;
        if matches!(outcome, FrameOutcome::Presented { rebuilt: true, .. } | FrameOutcome::Rebuilt) {
            let extent = renderer.extent();
            self.camera.set_viewport(extent.width, extent.height);
        }

        if let Some(fps) = self.fps.record(frame_time) {
            window.set_title(&format!("{} - {:.0} fps", self.config.window.title, fps));
            let stats = renderer.stats();
            debug!(
                "{:.1} fps ({:.2} ms), presented {}, rebuilds {}, skipped {}",
                fps,
                1000.0 / fps.max(f32::EPSILON),
                stats.presented,
                stats.rebuilds,
                stats.skipped
            );
        }

        self.input.begin_frame();
        Ok(())
    }

    /// Logs `err`, keeps it for `main` and stops the loop.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && let Err(err) = self.init(event_loop)
        {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                self.camera.set_viewport(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if key == controls::QUIT && event.state.is_pressed() {
                        info!("Escape pressed, shutting down");
                        event_loop.exit();
                    } else if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = MouseButton::from(button);
                match state {
                    ElementState::Pressed => self.input.on_mouse_pressed(button),
                    ElementState::Released => self.input.on_mouse_released(button),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.on_mouse_moved(position.x as f32, position.y as f32);
            }
            WindowEvent::CursorLeft { .. } => self.input.on_cursor_left(),
            WindowEvent::MouseWheel { delta, .. } => {
                let (x, y) = match delta {
                    MouseScrollDelta::LineDelta(x, y) => (x, y),
                    MouseScrollDelta::PixelDelta(pos) => {
                        ((pos.x / PIXELS_PER_LINE) as f32, (pos.y / PIXELS_PER_LINE) as f32)
                    }
                };
                self.input.on_scroll(x, y);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.as_ref()
            && let Err(err) = renderer.wait_idle()
        {
            error!("Failed to idle device on exit: {}", err);
        }
        self.renderer = None;
        self.window = None;
    }
}

fn main() -> Result<()> {
    let cli_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(cli_path.as_deref()).context("failed to load configuration")?;

    vkpipe_core::init_logging(config.logging.filter.as_deref());
    info!("Starting vkpipe");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_starts_without_window() {
        let app = App::new(Config::default());
        assert!(app.camera.position().length() > 0.0);
        assert!(app.window.is_none());
        assert!(app.renderer.is_none());
        assert!(app.fatal.is_none());
    }
}
