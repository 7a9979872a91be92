//! Error types for asset loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A mesh has no vertices or no indices.
    #[error("Mesh '{0}' is empty")]
    EmptyMesh(String),

    /// An index refers past the end of the vertex list.
    #[error("Index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    /// Index count is not a whole number of triangles.
    #[error("Index count {0} is not a multiple of 3")]
    PartialTriangle(usize),

    /// Pixel buffer length does not match `width * height * 4`.
    #[error("Texture {width}x{height} needs {expected} bytes, got {actual}")]
    PixelSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Width or height is zero.
    #[error("Texture dimensions must be non-zero, got {0}x{1}")]
    ZeroDimensions(u32, u32),

    /// A name that is neither a builtin asset nor a file path.
    #[error("Unknown builtin asset '{0}'")]
    UnknownBuiltin(String),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Wavefront OBJ parsing error.
    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
