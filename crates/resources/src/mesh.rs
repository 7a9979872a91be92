//! CPU-side indexed triangle meshes and the procedural builtins.
//!
//! All builtin meshes are unit sized (centered at the origin, extent 1) and
//! wound counter-clockwise when seen from outside.

use std::f32::consts::PI;
use std::path::Path;

use glam::{Vec2, Vec3};
use tracing::debug;
use vkpipe_rhi::vertex::Vertex;

use crate::error::{ResourceError, ResourceResult};

/// Indexed triangle list with 32-bit indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    /// Counter-clockwise triangles indexing into `vertices`.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Wraps existing buffers without validating them.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Number of indices to draw.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Loads every model of a Wavefront OBJ file into one mesh.
    ///
    /// Faces are triangulated and positions and texture coordinates share one
    /// index stream. Missing texture coordinates become `(0, 0)`, missing
    /// vertex colors become white. V is flipped to Vulkan's top-left origin.
    /// Materials are ignored.
    ///
    /// # Errors
    ///
    /// [`ResourceError::FileNotFound`] when `path` does not exist,
    /// [`ResourceError::Obj`] when parsing fails, and the
    /// [`validate`](Self::validate) errors when the result is not drawable.
    pub fn load_obj(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, _materials) = tobj::load_obj(path, &options)?;

        let mut mesh = Self::default();
        for model in &models {
            let source = &model.mesh;
            let base = mesh.vertices.len() as u32;
            for i in 0..source.positions.len() / 3 {
                let position = Vec3::new(
                    source.positions[3 * i],
                    source.positions[3 * i + 1],
                    source.positions[3 * i + 2],
                );
                let color = if source.vertex_color.len() >= 3 * (i + 1) {
                    Vec3::new(
                        source.vertex_color[3 * i],
                        source.vertex_color[3 * i + 1],
                        source.vertex_color[3 * i + 2],
                    )
                } else {
                    Vec3::ONE
                };
                let uv = if source.texcoords.len() >= 2 * (i + 1) {
                    Vec2::new(source.texcoords[2 * i], 1.0 - source.texcoords[2 * i + 1])
                } else {
                    Vec2::ZERO
                };
                mesh.vertices.push(Vertex::new(position, color, uv));
            }
            mesh.indices
                .extend(source.indices.iter().map(|&index| base + index));
        }

        let name = path.to_string_lossy();
        mesh.validate(&name)?;
        debug!(
            "Loaded OBJ {:?}: {} model(s), {} vertices, {} indices",
            path,
            models.len(),
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(mesh)
    }

    /// Checks that the mesh is drawable as an indexed triangle list.
    pub fn validate(&self, name: &str) -> ResourceResult<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(ResourceError::EmptyMesh(name.to_string()));
        }
        if !self.indices.len().is_multiple_of(3) {
            return Err(ResourceError::PartialTriangle(self.indices.len()));
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(ResourceError::IndexOutOfRange {
                index,
                vertex_count: self.vertices.len(),
            });
        }
        Ok(())
    }

    /// Pushes a quad given its corners counter-clockwise from the front.
    fn push_quad(&mut self, corners: [Vec3; 4], color: Vec3) {
        const UV: [Vec2; 4] = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];
        let base = self.vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(UV) {
            self.vertices.push(Vertex::new(corner, color, uv));
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    /// Unit cube with one textured quad per face.
    pub fn cube() -> Self {
        let h = 0.5;
        let v = |x: f32, y: f32, z: f32| Vec3::new(x * h, y * h, z * h);
        let faces = [
            // +Z
            [v(-1., -1., 1.), v(1., -1., 1.), v(1., 1., 1.), v(-1., 1., 1.)],
            // -Z
            [v(1., -1., -1.), v(-1., -1., -1.), v(-1., 1., -1.), v(1., 1., -1.)],
            // +X
            [v(1., -1., 1.), v(1., -1., -1.), v(1., 1., -1.), v(1., 1., 1.)],
            // -X
            [v(-1., -1., -1.), v(-1., -1., 1.), v(-1., 1., 1.), v(-1., 1., -1.)],
            // +Y
            [v(-1., 1., 1.), v(1., 1., 1.), v(1., 1., -1.), v(-1., 1., -1.)],
            // -Y
            [v(-1., -1., -1.), v(1., -1., -1.), v(1., -1., 1.), v(-1., -1., 1.)],
        ];

        let mut mesh = Self::default();
        for face in faces {
            mesh.push_quad(face, Vec3::ONE);
        }
        mesh
    }

    /// Unit square in the XZ plane, facing +Y.
    pub fn plane() -> Self {
        let mut mesh = Self::default();
        mesh.push_quad(
            [
                Vec3::new(-0.5, 0.0, 0.5),
                Vec3::new(0.5, 0.0, 0.5),
                Vec3::new(0.5, 0.0, -0.5),
                Vec3::new(-0.5, 0.0, -0.5),
            ],
            Vec3::ONE,
        );
        mesh
    }

    /// UV sphere of diameter 1. `stacks` and `sectors` are clamped to at
    /// least 2 and 3.
    pub fn uv_sphere(stacks: u32, sectors: u32) -> Self {
        let stacks = stacks.max(2);
        let sectors = sectors.max(3);
        let radius = 0.5;

        let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
        for i in 0..=stacks {
            let phi = PI * i as f32 / stacks as f32;
            let (ring, y) = (phi.sin() * radius, phi.cos() * radius);
            for j in 0..=sectors {
                let theta = 2.0 * PI * j as f32 / sectors as f32;
                let position = Vec3::new(ring * theta.cos(), y, ring * theta.sin());
                let uv = Vec2::new(j as f32 / sectors as f32, i as f32 / stacks as f32);
                vertices.push(Vertex::new(position, Vec3::ONE, uv));
            }
        }

        let mut indices = Vec::new();
        let row = sectors + 1;
        for i in 0..stacks {
            for j in 0..sectors {
                let k1 = i * row + j;
                let k2 = k1 + row;
                // Pole rows collapse to a point: one triangle per quad there.
                if i != 0 {
                    indices.extend_from_slice(&[k1, k1 + 1, k2]);
                }
                if i != stacks - 1 {
                    indices.extend_from_slice(&[k1 + 1, k2 + 1, k2]);
                }
            }
        }

        Self { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every triangle's normal must point away from the origin.
    fn assert_outward(mesh: &MeshData) {
        for tri in mesh.indices.chunks_exact(3) {
            let a = mesh.vertices[tri[0] as usize].position;
            let b = mesh.vertices[tri[1] as usize].position;
            let c = mesh.vertices[tri[2] as usize].position;
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(
                normal.dot(centroid) > 0.0,
                "triangle {:?} is wound inward",
                tri
            );
        }
    }

    #[test]
    fn test_cube_shape() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.index_count(), 36);
        cube.validate("cube").unwrap();
        assert_outward(&cube);
        assert!(
            cube.vertices
                .iter()
                .all(|v| v.position.abs().max_element() == 0.5)
        );
    }

    #[test]
    fn test_plane_faces_up() {
        let plane = MeshData::plane();
        plane.validate("plane").unwrap();
        let p = |i: usize| plane.vertices[plane.indices[i] as usize].position;
        let normal = (p(1) - p(0)).cross(p(2) - p(0));
        assert!(normal.y > 0.0);
        assert_eq!(normal.x, 0.0);
    }

    #[test]
    fn test_sphere_is_closed_and_outward() {
        let sphere = MeshData::uv_sphere(8, 12);
        sphere.validate("sphere").unwrap();
        assert_eq!(sphere.vertices.len(), 9 * 13);
        // Two triangles per quad, minus one per quad on each pole row.
        assert_eq!(sphere.indices.len(), (8 * 12 * 2 - 2 * 12) * 3);
        assert_outward(&sphere);
        for v in &sphere.vertices {
            assert!((v.position.length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_sphere_minimum_resolution() {
        let sphere = MeshData::uv_sphere(0, 0);
        sphere.validate("sphere").unwrap();
        assert_eq!(sphere.vertices.len(), 3 * 4);
    }

    #[test]
    fn test_validate_rejects_bad_indices() {
        let mut mesh = MeshData::plane();
        mesh.indices.push(0);
        assert!(matches!(
            mesh.validate("bad"),
            Err(ResourceError::PartialTriangle(7))
        ));

        let mut mesh = MeshData::plane();
        mesh.indices[5] = 9;
        assert!(matches!(
            mesh.validate("bad"),
            Err(ResourceError::IndexOutOfRange {
                index: 9,
                vertex_count: 4
            })
        ));

        assert!(matches!(
            MeshData::default().validate("empty"),
            Err(ResourceError::EmptyMesh(_))
        ));
    }
}
