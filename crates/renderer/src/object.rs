//! Scene objects and the GPU state each one owns.
//!
//! Every object carries its own uniform rings and descriptor sets:
//!
//! | set | shape | contents |
//! |-----|-------|----------|
//! | 0 | uniform buffer | [`ObjectUniform`], one buffer per frame slot |
//! | 1 | uniform buffer | [`LightingUniform`], one buffer per frame slot |
//! | 2 | combined image sampler | the part's texture, shared by all slots |
//!
//! Objects must be dropped before the device that created them.

use std::sync::Arc;

use tracing::{debug, info};

use vkpipe_resources::{MeshData, TextureData};
use vkpipe_rhi::command::{CommandBuffer, CommandPool};
use vkpipe_rhi::descriptor::{DescriptorManager, DescriptorShape, FrameBindings};
use vkpipe_rhi::device::Device;
use vkpipe_rhi::uniform::UniformRing;
use vkpipe_rhi::vk;
use vkpipe_rhi::{RhiError, RhiResult};
use vkpipe_scene::{PointLight, Transform};
use vkpipe_scene::light::DEFAULT_SPECULAR;

use crate::FrameView;
use crate::mesh::GpuMesh;
use crate::texture::GpuTexture;
use crate::ubo::{LightingUniform, ObjectUniform, UniformShape};

/// Set index of the per-object transform block.
pub const TRANSFORM_SET: u32 = 0;
/// Set index of the lighting block.
pub const LIGHTING_SET: u32 = 1;
/// Set index of a part's texture.
pub const TEXTURE_SET: u32 = 2;

/// Descriptor shapes in set order, as the pipeline layout expects them.
pub const SET_SHAPES: [DescriptorShape; 3] = [
    DescriptorShape::UniformBuffer,
    DescriptorShape::UniformBuffer,
    DescriptorShape::CombinedImageSampler,
];

/// Role of an object in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectKind {
    Renderable,
    /// Also lights the scene. Negative intensities are clamped to zero.
    PointLight { intensity: f32 },
}

/// CPU-side description of an object to create.
#[derive(Debug, Clone)]
pub struct ObjectDesc {
    /// Used in labels and log messages.
    pub name: String,
    pub kind: ObjectKind,
    pub transform: Transform,
    /// Drawn in order, each with its own texture set.
    pub parts: Vec<(MeshData, TextureData)>,
    /// World units per second.
    pub move_speed: f32,
    /// Degrees per second about the world Y axis.
    pub rotate_speed: f32,
}

impl ObjectDesc {
    /// An object with no parts at the origin, moving at 1 unit/s.
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::default(),
            parts: Vec::new(),
            move_speed: 1.0,
            rotate_speed: 0.0,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Appends a mesh drawn with `texture`. Parts draw in insertion order.
    pub fn with_part(mut self, mesh: MeshData, texture: TextureData) -> Self {
        self.parts.push((mesh, texture));
        self
    }

    /// Movement in units per second, rotation in degrees per second.
    pub fn with_speeds(mut self, move_speed: f32, rotate_speed: f32) -> Self {
        self.move_speed = move_speed;
        self.rotate_speed = rotate_speed;
        self
    }

    /// Checks that there is at least one part and every mesh is drawable.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] naming the object and part.
    pub fn validate(&self) -> RhiResult<()> {
        if self.parts.is_empty() {
            return Err(RhiError::InvalidResource(format!(
                "object '{}' has no mesh/texture parts",
                self.name
            )));
        }
        for (index, (mesh, _)) in self.parts.iter().enumerate() {
            mesh.validate(&format!("{}[{}]", self.name, index))
                .map_err(|e| {
                    RhiError::InvalidResource(format!("object '{}' part {}: {e}", self.name, index))
                })?;
        }
        Ok(())
    }
}

/// What object creation borrows from the renderer.
pub struct GpuUploader<'a> {
    pub device: &'a Arc<Device>,
    /// Pool for one-time staging copies.
    pub pool: &'a CommandPool,
    pub descriptors: &'a DescriptorManager,
    /// Frame slots every ring and descriptor set is sized for.
    pub slots: usize,
}

impl GpuUploader<'_> {
    /// One combined image sampler set per frame slot, all pointing at `texture`.
    fn texture_bindings(&self, texture: &GpuTexture) -> RhiResult<FrameBindings> {
        let mut bindings = self
            .descriptors
            .allocate(DescriptorShape::CombinedImageSampler, self.slots)?;
        bindings.rewrite_shared(texture.binding())?;
        Ok(bindings)
    }
}

/// One mesh drawn with one texture.
struct ObjectPart {
    mesh: GpuMesh,
    texture: GpuTexture,
    texture_sets: FrameBindings,
}

/// State shared by every object kind.
pub struct ObjectBody {
    name: String,
    pub transform: Transform,
    pub move_speed: f32,
    pub rotate_speed: f32,
    parts: Vec<ObjectPart>,
    transform_ring: UniformRing,
    transform_sets: FrameBindings,
    lighting_ring: UniformRing,
    lighting_sets: FrameBindings,
}

impl ObjectBody {
    /// Validates `desc` and uploads every part and ring.
    fn new(uploader: &GpuUploader<'_>, desc: &ObjectDesc) -> RhiResult<Self> {
        desc.validate()?;
        let device = uploader.device;

        let parts = desc
            .parts
            .iter()
            .enumerate()
            .map(|(index, (mesh, texture))| {
                let label = format!("{}[{}]", desc.name, index);
                let mesh = GpuMesh::upload(device.clone(), uploader.pool, mesh, &label)?;
                let texture = GpuTexture::upload(device.clone(), uploader.pool, texture, &label)?;
                let texture_sets = uploader.texture_bindings(&texture)?;
                Ok(ObjectPart {
                    mesh,
                    texture,
                    texture_sets,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let (transform_ring, transform_sets) =
            uniform_bindings(uploader, &desc.name, UniformShape::Object)?;
        let (lighting_ring, lighting_sets) =
            uniform_bindings(uploader, &desc.name, UniformShape::Lighting)?;

        Ok(Self {
            name: desc.name.clone(),
            transform: desc.transform,
            move_speed: desc.move_speed,
            rotate_speed: desc.rotate_speed,
            parts,
            transform_ring,
            transform_sets,
            lighting_ring,
            lighting_sets,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Writes this object's uniform blocks for `slot`.
    ///
    /// The slot's fence must have signaled.
    pub fn write_uniforms(&self, slot: usize, view: &FrameView, light: &PointLight) -> RhiResult<()> {
        let object = ObjectUniform::new(self.transform.model_matrix(), view.view, view.proj);
        self.transform_ring.write(slot, &object)?;

        let lighting = LightingUniform::new(
            view.camera_position,
            light.position,
            light.intensity,
            DEFAULT_SPECULAR,
        );
        self.lighting_ring.write(slot, &lighting)
    }

    /// Binds sets 0 and 1, then draws every part with its texture at set 2.
    pub fn draw(&self, cmd: &CommandBuffer, layout: vk::PipelineLayout, slot: usize) -> RhiResult<()> {
        let sets = [self.transform_sets.set(slot)?, self.lighting_sets.set(slot)?];
        cmd.bind_descriptor_sets(layout, TRANSFORM_SET, &sets);
        for part in &self.parts {
            cmd.bind_descriptor_sets(layout, TEXTURE_SET, &[part.texture_sets.set(slot)?]);
            part.mesh.draw(cmd);
        }
        Ok(())
    }

    /// Swaps the texture of part `index` and rewrites its sets in every slot.
    ///
    /// No frame may be in flight that still samples the old texture.
    pub fn replace_texture(
        &mut self,
        uploader: &GpuUploader<'_>,
        index: usize,
        data: &TextureData,
    ) -> RhiResult<()> {
        let part_count = self.parts.len();
        let part = self.parts.get_mut(index).ok_or_else(|| {
            RhiError::InvalidResource(format!(
                "object '{}' has {} part(s), no part {}",
                self.name, part_count, index
            ))
        })?;

        let label = format!("{}[{}]", self.name, index);
        let texture = GpuTexture::upload(uploader.device.clone(), uploader.pool, data, &label)?;
        part.texture_sets.rewrite_shared(texture.binding())?;
        part.texture = texture;
        debug!("Replaced texture of '{}'", label);
        Ok(())
    }
}

/// Creates a uniform ring for `shape` and one set per slot bound to its buffers.
fn uniform_bindings(
    uploader: &GpuUploader<'_>,
    name: &str,
    shape: UniformShape,
) -> RhiResult<(UniformRing, FrameBindings)> {
    let ring = UniformRing::new(
        uploader.device.clone(),
        &format!("{name} {}", shape.name()),
        shape.size(),
        uploader.slots,
    )?;
    let mut sets = uploader
        .descriptors
        .allocate(DescriptorShape::UniformBuffer, uploader.slots)?;
    sets.rewrite_all(&ring.handles())?;
    Ok((ring, sets))
}

/// A drawable entity. Point lights are drawn like any other object and also
/// light the scene.
pub enum SceneObject {
    Renderable(ObjectBody),
    PointLight { body: ObjectBody, intensity: f32 },
}

impl SceneObject {
    /// Uploads every part and creates the object's rings and sets.
    ///
    /// # Errors
    ///
    /// Returns an error if `desc` fails [`ObjectDesc::validate`] or any GPU
    /// resource cannot be created.
    pub fn create(uploader: &GpuUploader<'_>, desc: &ObjectDesc) -> RhiResult<Self> {
        let body = ObjectBody::new(uploader, desc)?;
        let object = match desc.kind {
            ObjectKind::Renderable => SceneObject::Renderable(body),
            ObjectKind::PointLight { intensity } => SceneObject::PointLight {
                body,
                intensity: intensity.max(0.0),
            },
        };
        info!(
            "Created {} '{}' with {} part(s)",
            object.kind_name(),
            object.name(),
            object.body().part_count()
        );
        Ok(object)
    }

    /// State shared by every kind.
    pub fn body(&self) -> &ObjectBody {
        match self {
            SceneObject::Renderable(body) | SceneObject::PointLight { body, .. } => body,
        }
    }

    pub fn body_mut(&mut self) -> &mut ObjectBody {
        match self {
            SceneObject::Renderable(body) | SceneObject::PointLight { body, .. } => body,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.body().name()
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.body().transform
    }

    /// Kind label used in logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SceneObject::Renderable(_) => "renderable",
            SceneObject::PointLight { .. } => "point light",
        }
    }

    /// Light parameters when this object is a point light.
    pub fn light(&self) -> Option<PointLight> {
        match self {
            SceneObject::Renderable(_) => None,
            SceneObject::PointLight { body, intensity } => {
                Some(PointLight::new(body.transform.position, *intensity))
            }
        }
    }
}

/// The light used for shading: the first point light, or the default one.
pub fn scene_light<'a>(objects: impl IntoIterator<Item = &'a SceneObject>) -> PointLight {
    objects
        .into_iter()
        .find_map(SceneObject::light)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part() -> (MeshData, TextureData) {
        (
            MeshData::cube(),
            TextureData::solid(2, 2, [255, 255, 255, 255]).unwrap(),
        )
    }

    #[test]
    fn test_desc_without_parts_rejected() {
        let desc = ObjectDesc::new("empty", ObjectKind::Renderable);
        assert!(matches!(desc.validate(), Err(RhiError::InvalidResource(_))));
    }

    #[test]
    fn test_desc_with_broken_mesh_rejected() {
        let (_, texture) = part();
        let broken = MeshData::new(MeshData::cube().vertices, vec![0, 1]);
        let desc = ObjectDesc::new("broken", ObjectKind::Renderable).with_part(broken, texture);
        let err = desc.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'broken' part 0"), "{message}");
        assert!(message.contains("multiple of 3"), "{message}");
    }

    #[test]
    fn test_desc_builder() {
        let (mesh, texture) = part();
        let desc = ObjectDesc::new("lamp", ObjectKind::PointLight { intensity: 20.0 })
            .with_part(mesh, texture)
            .with_speeds(2.0, 45.0);
        assert!(desc.validate().is_ok());
        assert_eq!(desc.move_speed, 2.0);
        assert_eq!(desc.rotate_speed, 45.0);
        assert_eq!(desc.kind, ObjectKind::PointLight { intensity: 20.0 });
    }

    #[test]
    fn test_set_shapes_follow_set_indices() {
        assert_eq!(SET_SHAPES[TRANSFORM_SET as usize], DescriptorShape::UniformBuffer);
        assert_eq!(SET_SHAPES[LIGHTING_SET as usize], DescriptorShape::UniformBuffer);
        assert_eq!(
            SET_SHAPES[TEXTURE_SET as usize],
            DescriptorShape::CombinedImageSampler
        );
    }

    #[test]
    fn test_scene_light_defaults_without_lights() {
        let objects: Vec<SceneObject> = Vec::new();
        assert_eq!(scene_light(&objects), PointLight::default());
    }
}
