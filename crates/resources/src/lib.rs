//! CPU-side asset payloads.
//!
//! This crate produces the data the GPU layer uploads:
//! - Indexed triangle meshes, including procedural builtins
//! - RGBA8 textures, builtin or decoded from image files
//! - Name resolution from configuration strings

pub mod builtin;
mod error;
pub mod mesh;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use mesh::MeshData;
pub use texture::TextureData;
