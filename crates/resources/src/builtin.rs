//! Name resolution for meshes and textures referenced from configuration.
//!
//! A name matching one of [`MESH_NAMES`] or [`TEXTURE_NAMES`] resolves to a
//! procedural asset. Any other name that looks like a path is loaded from
//! disk: meshes as Wavefront OBJ, textures through the `image` decoders.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::MeshData;
use crate::texture::TextureData;

pub const MESH_NAMES: [&str; 3] = ["cube", "plane", "sphere"];
pub const TEXTURE_NAMES: [&str; 3] = ["checker", "white", "gray"];

const SPHERE_STACKS: u32 = 24;
const SPHERE_SECTORS: u32 = 48;

/// Resolves a mesh name from configuration.
///
/// # Errors
///
/// Returns [`ResourceError::UnknownBuiltin`] for a name that is neither
/// builtin nor path-like, and the [`MeshData::load_obj`] errors for paths.
pub fn mesh(name: &str) -> ResourceResult<MeshData> {
    let mesh = match name {
        "cube" => MeshData::cube(),
        "plane" => MeshData::plane(),
        "sphere" => MeshData::uv_sphere(SPHERE_STACKS, SPHERE_SECTORS),
        path if looks_like_path(path) => {
            debug!("Loading mesh from file {}", path);
            return MeshData::load_obj(Path::new(path));
        }
        other => return Err(ResourceError::UnknownBuiltin(other.to_string())),
    };
    mesh.validate(name)?;
    Ok(mesh)
}

/// Resolves a texture name from configuration.
///
/// # Errors
///
/// Returns [`ResourceError::UnknownBuiltin`] for a name that is neither
/// builtin nor path-like, and the [`TextureData::load`] errors for paths.
pub fn texture(name: &str) -> ResourceResult<TextureData> {
    match name {
        "checker" => TextureData::checkerboard(
            256,
            8,
            [230, 230, 230, 255],
            [40, 40, 40, 255],
        ),
        "white" => TextureData::solid(4, 4, [255, 255, 255, 255]),
        "gray" => TextureData::solid(4, 4, [128, 128, 128, 255]),
        path if looks_like_path(path) => {
            debug!("Loading texture from file {}", path);
            TextureData::load(Path::new(path))
        }
        other => Err(ResourceError::UnknownBuiltin(other.to_string())),
    }
}

fn looks_like_path(name: &str) -> bool {
    name.contains(['/', '\\', '.'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtin_meshes_resolve() {
        for name in MESH_NAMES {
            let mesh = mesh(name).unwrap();
            assert!(mesh.index_count() > 0, "{name}");
        }
    }

    #[test]
    fn test_all_builtin_textures_resolve() {
        for name in TEXTURE_NAMES {
            let tex = texture(name).unwrap();
            assert!(tex.width() > 0, "{name}");
        }
    }

    #[test]
    fn test_unknown_names() {
        assert!(matches!(
            mesh("teapot"),
            Err(ResourceError::UnknownBuiltin(_))
        ));
        assert!(matches!(
            texture("marble"),
            Err(ResourceError::UnknownBuiltin(_))
        ));
    }

    #[test]
    fn test_path_like_names_go_to_disk() {
        assert!(looks_like_path("textures/wood.png"));
        assert!(looks_like_path("wood.jpg"));
        assert!(!looks_like_path("checker"));
        assert!(matches!(
            texture("missing/wood.png"),
            Err(ResourceError::FileNotFound(_))
        ));
    }
}
