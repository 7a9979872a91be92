//! Descriptor layouts, pools and per-frame-slot sets.
//!
//! Bindings come in three [`DescriptorShape`]s, each a single descriptor at
//! binding 0 with fixed stage visibility. [`DescriptorManager`] keeps one
//! layout per shape. [`FrameBindings`] owns a pool sized for exactly one set
//! per frame slot and rewrites all of them together.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use vkpipe_rhi::descriptor::{BindingTarget, DescriptorManager, DescriptorShape};
//! # fn demo(device: Arc<vkpipe_rhi::device::Device>, buffers: [ash::vk::Buffer; 2])
//! #     -> vkpipe_rhi::RhiResult<()> {
//! let manager = DescriptorManager::new(device)?;
//! let mut bindings = manager.allocate(DescriptorShape::UniformBuffer, 2)?;
//! bindings.rewrite_all(&[
//!     BindingTarget::Buffer { buffer: buffers[0], range: 192 },
//!     BindingTarget::Buffer { buffer: buffers[1], range: 192 },
//! ])?;
//! # Ok(()) }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// The closed set of binding shapes a descriptor set can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorShape {
    /// Per-object or per-light uniform block.
    UniformBuffer,
    /// Texture view plus sampler.
    CombinedImageSampler,
    /// Particle or compute data.
    StorageBuffer,
}

impl DescriptorShape {
    /// Every shape, in layout index order.
    pub const ALL: [DescriptorShape; 3] = [
        DescriptorShape::UniformBuffer,
        DescriptorShape::CombinedImageSampler,
        DescriptorShape::StorageBuffer,
    ];

    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            DescriptorShape::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorShape::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            DescriptorShape::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        }
    }

    /// Shader stages that can read the binding.
    pub fn stages(self) -> vk::ShaderStageFlags {
        match self {
            DescriptorShape::UniformBuffer => {
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
            }
            DescriptorShape::CombinedImageSampler => vk::ShaderStageFlags::FRAGMENT,
            DescriptorShape::StorageBuffer => {
                vk::ShaderStageFlags::COMPUTE | vk::ShaderStageFlags::VERTEX
            }
        }
    }

    /// The single binding 0 a layout of this shape contains.
    pub fn layout_binding(self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(self.descriptor_type())
            .descriptor_count(1)
            .stage_flags(self.stages())
    }

    fn index(self) -> usize {
        match self {
            DescriptorShape::UniformBuffer => 0,
            DescriptorShape::CombinedImageSampler => 1,
            DescriptorShape::StorageBuffer => 2,
        }
    }
}

/// Pool sizes for exactly `sets` sets of `shape`.
pub fn pool_sizes_for(shape: DescriptorShape, sets: u32) -> [vk::DescriptorPoolSize; 1] {
    [vk::DescriptorPoolSize::default()
        .ty(shape.descriptor_type())
        .descriptor_count(sets)]
}

/// What one frame slot's set should point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    /// Uniform or storage buffer, bound from offset 0.
    Buffer {
        buffer: vk::Buffer,
        /// Bytes visible to the shader.
        range: vk::DeviceSize,
    },
    /// Sampled image, expected in `SHADER_READ_ONLY_OPTIMAL`.
    Image {
        view: vk::ImageView,
        sampler: vk::Sampler,
    },
}

impl BindingTarget {
    fn fits(&self, shape: DescriptorShape) -> bool {
        match self {
            BindingTarget::Buffer { .. } => matches!(
                shape,
                DescriptorShape::UniformBuffer | DescriptorShape::StorageBuffer
            ),
            BindingTarget::Image { .. } => shape == DescriptorShape::CombinedImageSampler,
        }
    }
}

/// One target per slot, each of a kind `shape` accepts.
pub fn check_targets(
    shape: DescriptorShape,
    slots: usize,
    targets: &[BindingTarget],
) -> RhiResult<()> {
    if targets.len() != slots {
        return Err(RhiError::BindingMismatch(format!(
            "{shape:?} bindings cover {slots} frame slot(s), got {} target(s)",
            targets.len()
        )));
    }
    if let Some(position) = targets.iter().position(|t| !t.fits(shape)) {
        return Err(RhiError::BindingMismatch(format!(
            "target {position} ({:?}) does not fit {shape:?}",
            targets[position]
        )));
    }
    Ok(())
}

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates the layout for `shape`.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn new(device: Arc<Device>, shape: DescriptorShape) -> RhiResult<Self> {
        let bindings = [shape.layout_binding()];
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        debug!("Created {:?} descriptor set layout", shape);
        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Owns the layout of every shape.
pub struct DescriptorManager {
    device: Arc<Device>,
    /// Indexed by `DescriptorShape::index`.
    layouts: [DescriptorSetLayout; 3],
}

impl DescriptorManager {
    /// Creates one layout per [`DescriptorShape`].
    ///
    /// # Errors
    ///
    /// Returns an error if any layout cannot be created.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let layouts = [
            DescriptorSetLayout::new(device.clone(), DescriptorShape::UniformBuffer)?,
            DescriptorSetLayout::new(device.clone(), DescriptorShape::CombinedImageSampler)?,
            DescriptorSetLayout::new(device.clone(), DescriptorShape::StorageBuffer)?,
        ];
        Ok(Self { device, layouts })
    }

    #[inline]
    pub fn layout(&self, shape: DescriptorShape) -> vk::DescriptorSetLayout {
        self.layouts[shape.index()].handle()
    }

    /// A pool plus `slots` sets of `shape`, not yet written.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation or set allocation fails.
    pub fn allocate(&self, shape: DescriptorShape, slots: usize) -> RhiResult<FrameBindings> {
        FrameBindings::new(self.device.clone(), shape, self.layout(shape), slots)
    }
}

/// One descriptor set per frame slot for a single shape.
pub struct FrameBindings {
    device: Arc<Device>,
    shape: DescriptorShape,
    /// Sized for exactly `sets.len()` sets; destroying it frees them.
    pool: vk::DescriptorPool,
    /// One set per frame slot, in slot order.
    sets: Vec<vk::DescriptorSet>,
}

impl FrameBindings {
    fn new(
        device: Arc<Device>,
        shape: DescriptorShape,
        layout: vk::DescriptorSetLayout,
        slots: usize,
    ) -> RhiResult<Self> {
        let count = slots as u32;
        let pool_sizes = pool_sizes_for(shape, count);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(count)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        let layouts = vec![layout; slots];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = match unsafe { device.handle().allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(e) => {
                unsafe { device.handle().destroy_descriptor_pool(pool, None) };
                return Err(e.into());
            }
        };

        debug!("Allocated {} {:?} descriptor set(s)", sets.len(), shape);
        Ok(Self {
            device,
            shape,
            pool,
            sets,
        })
    }

    #[inline]
    pub fn shape(&self) -> DescriptorShape {
        self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// The set owned by frame slot `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::FrameSlotOutOfRange`] past the last slot.
    pub fn set(&self, slot: usize) -> RhiResult<vk::DescriptorSet> {
        self.sets
            .get(slot)
            .copied()
            .ok_or(RhiError::FrameSlotOutOfRange {
                slot,
                slots: self.sets.len(),
            })
    }

    /// Points every slot's set at its target, in slot order.
    ///
    /// Sets must not be in use by pending command buffers.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::BindingMismatch`] unless there is exactly one
    /// target per slot and each fits the shape. Nothing is written then.
    pub fn rewrite_all(&mut self, targets: &[BindingTarget]) -> RhiResult<()> {
        check_targets(self.shape, self.sets.len(), targets)?;

        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = targets
            .iter()
            .map(|target| match *target {
                BindingTarget::Buffer { buffer, range } => [vk::DescriptorBufferInfo::default()
                    .buffer(buffer)
                    .offset(0)
                    .range(range)],
                BindingTarget::Image { .. } => [vk::DescriptorBufferInfo::default()],
            })
            .collect();
        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = targets
            .iter()
            .map(|target| match *target {
                BindingTarget::Image { view, sampler } => [vk::DescriptorImageInfo::default()
                    .image_view(view)
                    .sampler(sampler)
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)],
                BindingTarget::Buffer { .. } => [vk::DescriptorImageInfo::default()],
            })
            .collect();

        let writes: Vec<vk::WriteDescriptorSet> = self
            .sets
            .iter()
            .enumerate()
            .map(|(slot, &set)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(self.shape.descriptor_type());
                match targets[slot] {
                    BindingTarget::Buffer { .. } => write.buffer_info(&buffer_infos[slot]),
                    BindingTarget::Image { .. } => write.image_info(&image_infos[slot]),
                }
            })
            .collect();

        unsafe { self.device.handle().update_descriptor_sets(&writes, &[]) };
        debug!("Rewrote {} {:?} set(s)", writes.len(), self.shape);
        Ok(())
    }

    /// Points every slot at the same resource.
    pub fn rewrite_shared(&mut self, target: BindingTarget) -> RhiResult<()> {
        let targets = vec![target; self.sets.len()];
        self.rewrite_all(&targets)
    }
}

impl Drop for FrameBindings {
    fn drop(&mut self) {
        // Sets are returned with the pool.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_target() -> BindingTarget {
        BindingTarget::Buffer {
            buffer: vk::Buffer::null(),
            range: 64,
        }
    }

    fn image_target() -> BindingTarget {
        BindingTarget::Image {
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
        }
    }

    #[test]
    fn test_shape_layouts_are_deterministic() {
        for shape in DescriptorShape::ALL {
            let a = shape.layout_binding();
            let b = shape.layout_binding();
            assert_eq!(a.binding, 0);
            assert_eq!(a.descriptor_count, 1);
            assert_eq!(a.descriptor_type, b.descriptor_type);
            assert_eq!(a.stage_flags, b.stage_flags);
        }
    }

    #[test]
    fn test_shape_stage_visibility() {
        assert_eq!(
            DescriptorShape::UniformBuffer.stages(),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(
            DescriptorShape::CombinedImageSampler.stages(),
            vk::ShaderStageFlags::FRAGMENT
        );
        assert!(
            DescriptorShape::StorageBuffer
                .stages()
                .contains(vk::ShaderStageFlags::COMPUTE)
        );
    }

    #[test]
    fn test_pool_sized_for_exact_slot_count() {
        let sizes = pool_sizes_for(DescriptorShape::CombinedImageSampler, 2);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(sizes[0].descriptor_count, 2);
    }

    #[test]
    fn test_check_targets_requires_one_per_slot() {
        let shape = DescriptorShape::UniformBuffer;
        assert!(check_targets(shape, 2, &[buffer_target(), buffer_target()]).is_ok());
        assert!(matches!(
            check_targets(shape, 2, &[buffer_target()]),
            Err(RhiError::BindingMismatch(_))
        ));
    }

    #[test]
    fn test_check_targets_rejects_wrong_kind() {
        assert!(matches!(
            check_targets(DescriptorShape::UniformBuffer, 2, &[buffer_target(), image_target()]),
            Err(RhiError::BindingMismatch(_))
        ));
        assert!(matches!(
            check_targets(DescriptorShape::CombinedImageSampler, 1, &[buffer_target()]),
            Err(RhiError::BindingMismatch(_))
        ));
        assert!(check_targets(DescriptorShape::StorageBuffer, 1, &[buffer_target()]).is_ok());
    }
}
