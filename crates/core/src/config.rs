//! TOML configuration with defaults for every field.
//!
//! A missing file is not an error: the pipeline starts with [`Config::default`].
//! A file that exists but fails to parse or validate is reported.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{Error, Result};

/// Environment variable consulted when no explicit path is given.
pub const CONFIG_ENV: &str = "VKPIPE_CONFIG";

/// File name looked up in the working directory as the last resort.
pub const CONFIG_FILE: &str = "vkpipe.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `[window]` table.
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub camera: CameraConfig,
    pub logging: LoggingConfig,
    pub scene: SceneConfig,
}

/// Initial window state. The window stays resizable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Base title; the live frame rate is appended.
    pub title: String,
    /// Inner size in physical pixels, must be non-zero.
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vkpipe".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Renderer creation options, fixed for the life of the process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Enable the Khronos validation layer.
    pub validation: bool,
    /// Prefer MAILBOX when the surface offers it; FIFO otherwise.
    pub prefer_mailbox: bool,
    /// Upper bound on the MSAA sample count. Must be a power of two.
    pub max_msaa_samples: u32,
    /// Swapchain image count to ask for. `None` means `min + 1`.
    pub requested_image_count: Option<u32>,
    /// Compiled SPIR-V, relative to the working directory.
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            prefer_mailbox: true,
            max_msaa_samples: 8,
            requested_image_count: None,
            vertex_shader: PathBuf::from("shaders/mesh.vert.spv"),
            fragment_shader: PathBuf::from("shaders/mesh.frag.spv"),
        }
    }
}

/// Which of the two camera models drives the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStrategy {
    /// Mouse-drag spherical coordinates around a target.
    Orbit,
    /// WASD translation with Euler-angle rotation.
    Fly,
}

/// Starting camera and projection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub strategy: CameraStrategy,
    /// Vertical field of view.
    pub fov_degrees: f32,
    /// Clip planes, `0 < near < far`.
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    /// Point the camera initially looks at; the orbit center.
    pub target: [f32; 3],
    /// World units per second.
    pub move_speed: f32,
    /// Degrees per pixel of mouse drag.
    pub rotate_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            strategy: CameraStrategy::Orbit,
            fov_degrees: 70.0,
            near: 0.1,
            far: 1000.0,
            position: [3.0, 3.0, 3.0],
            target: [0.0, 0.0, 0.0],
            move_speed: 3.0,
            rotate_speed: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

/// `kind = "renderable"` or `kind = "point_light"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKindConfig {
    Renderable,
    PointLight,
}

/// One (mesh, texture) pair of an object.
#[derive(Debug, Clone, Deserialize)]
pub struct PartConfig {
    /// Builtin mesh name (`cube`, `plane`, `sphere`) or a Wavefront OBJ path.
    pub mesh: String,
    /// Builtin texture name (`checker`, `white`, ...) or an image file path.
    pub texture: String,
}

/// One `[[scene.objects]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectConfig {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: ObjectKindConfig,
    pub parts: Vec<PartConfig>,
    #[serde(default)]
    pub position: [f32; 3],
    /// Euler angles in degrees.
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
    /// Only meaningful for point lights.
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub move_speed: f32,
    /// Degrees per second of spin about the world Y axis.
    #[serde(default)]
    pub rotate_speed: f32,
}

fn default_kind() -> ObjectKindConfig {
    ObjectKindConfig::Renderable
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_intensity() -> f32 {
    50.0
}

/// Objects created at startup, in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub objects: Vec<ObjectConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let part = |mesh: &str, texture: &str| PartConfig {
            mesh: mesh.to_string(),
            texture: texture.to_string(),
        };
        Self {
            objects: vec![
                ObjectConfig {
                    name: "Floor".to_string(),
                    kind: ObjectKindConfig::Renderable,
                    parts: vec![part("plane", "checker")],
                    position: [0.0, -0.5, 0.0],
                    rotation: [0.0, 0.0, 0.0],
                    scale: [10.0, 1.0, 10.0],
                    intensity: default_intensity(),
                    move_speed: 0.0,
                    rotate_speed: 0.0,
                },
                ObjectConfig {
                    name: "Crate".to_string(),
                    kind: ObjectKindConfig::Renderable,
                    parts: vec![part("cube", "checker")],
                    position: [0.0, 0.0, 0.0],
                    rotation: [0.0, 0.0, 0.0],
                    scale: default_scale(),
                    intensity: default_intensity(),
                    move_speed: 0.0,
                    rotate_speed: 20.0,
                },
                ObjectConfig {
                    name: "Light".to_string(),
                    kind: ObjectKindConfig::PointLight,
                    parts: vec![part("sphere", "white")],
                    position: [3.0, 2.0, 0.0],
                    rotation: [0.0, 0.0, 0.0],
                    scale: [0.2, 0.2, 0.2],
                    intensity: default_intensity(),
                    move_speed: 0.0,
                    rotate_speed: 0.0,
                },
            ],
        }
    }
}

impl Config {
    /// Resolve the config path (CLI argument, then env var, then working
    /// directory) and load it.
    ///
    /// # Errors
    ///
    /// Fails like [`Config::load_from_path`].
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = cli_path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        Self::load_from_path(&path)
    }

    /// Load from a specific path; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read,
    /// [`Error::ConfigParse`] for invalid TOML, and [`Error::Config`] when
    /// validation fails.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!("Loaded configuration from {:?}", path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    /// Parse from an in-memory TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the renderer cannot start with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        let samples = self.graphics.max_msaa_samples;
        if samples == 0 || !samples.is_power_of_two() || samples > 64 {
            return Err(Error::Config(format!(
                "max_msaa_samples must be a power of two in 1..=64, got {samples}"
            )));
        }
        if self.graphics.requested_image_count == Some(0) {
            return Err(Error::Config(
                "requested_image_count must be at least 1".to_string(),
            ));
        }
        if self.camera.near <= 0.0 || self.camera.near >= self.camera.far {
            return Err(Error::Config(format!(
                "camera planes must satisfy 0 < near < far, got near={} far={}",
                self.camera.near, self.camera.far
            )));
        }
        for object in &self.scene.objects {
            if object.parts.is_empty() {
                return Err(Error::Config(format!(
                    "object '{}' has no mesh/texture parts",
                    object.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.strategy, CameraStrategy::Orbit);
        assert_eq!(config.scene.objects.len(), 3);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 800

            [camera]
            strategy = "fly"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.camera.strategy, CameraStrategy::Fly);
        assert_eq!(config.graphics.max_msaa_samples, 8);
    }

    #[test]
    fn test_scene_objects_parse() {
        let config = Config::from_toml_str(
            r#"
            [[scene.objects]]
            name = "Lamp"
            kind = "point_light"
            intensity = 12.5
            parts = [{ mesh = "sphere", texture = "white" }]
            "#,
        )
        .unwrap();

        let lamp = &config.scene.objects[0];
        assert_eq!(lamp.kind, ObjectKindConfig::PointLight);
        assert_eq!(lamp.intensity, 12.5);
        assert_eq!(lamp.scale, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_rejects_zero_window() {
        let result = Config::from_toml_str("[window]\nwidth = 0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_non_power_of_two_msaa() {
        let result = Config::from_toml_str("[graphics]\nmax_msaa_samples = 6\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_inverted_clip_planes() {
        let result = Config::from_toml_str("[camera]\nnear = 10.0\nfar = 1.0\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = Config::from_toml_str("[window\nwidth = 3");
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from_path(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(config.window.title, "vkpipe");
    }
}
