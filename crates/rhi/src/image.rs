//! GPU image resource: memory, image and view with a tracked layout.
//!
//! Every layout change goes through [`GpuImage::transition`], which records a
//! barrier chosen from a closed table ([`transition_rule`]) and updates the
//! tracked layout. Pairs outside the table are configuration errors.
//!
//! Mip chains are produced on the GPU by [`GpuImage::generate_mipmaps`], a
//! blit-and-barrier loop that needs linear-filter blit support for the format.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Everything needed to create a [`GpuImage`].
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    /// Between 1 and [`mip_levels_for`] the extent, see [`ImageDesc::validate`].
    pub mip_levels: u32,
    pub array_layers: u32,
    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    pub initial_layout: vk::ImageLayout,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub samples: vk::SampleCountFlags,
    /// Passed to gpu-allocator, which picks the memory type.
    pub location: MemoryLocation,
}

impl ImageDesc {
    /// Sampled 2D texture with a full mip chain, filled by transfer.
    pub fn texture(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            width,
            height,
            mip_levels: mip_levels_for(width, height),
            array_layers: 1,
            format,
            tiling: vk::ImageTiling::OPTIMAL,
            initial_layout: vk::ImageLayout::UNDEFINED,
            usage: vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            samples: vk::SampleCountFlags::TYPE_1,
            location: MemoryLocation::GpuOnly,
        }
    }

    /// Transient multisampled color attachment.
    pub fn color_target(
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Self {
        Self {
            usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ..Self::attachment(extent, format, samples)
        }
    }

    /// Multisampled depth attachment.
    pub fn depth_target(
        extent: vk::Extent2D,
        format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> Self {
        Self {
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Self::attachment(extent, format, samples)
        }
    }

    /// Single-level optimal-tiling image in GPU-only memory. Callers set `usage`.
    fn attachment(extent: vk::Extent2D, format: vk::Format, samples: vk::SampleCountFlags) -> Self {
        Self {
            width: extent.width,
            height: extent.height,
            mip_levels: 1,
            array_layers: 1,
            format,
            tiling: vk::ImageTiling::OPTIMAL,
            initial_layout: vk::ImageLayout::UNDEFINED,
            usage: vk::ImageUsageFlags::empty(),
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            samples,
            location: MemoryLocation::GpuOnly,
        }
    }

    /// Size of the base level.
    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }

    /// Rejects descriptions Vulkan would refuse or that later mip work
    /// would index past: a zero extent, or `mip_levels` outside
    /// `1..=mip_levels_for(width, height)`.
    pub fn validate(&self, label: &str) -> RhiResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RhiError::InvalidResource(format!(
                "image '{label}' has zero extent {}x{}",
                self.width, self.height
            )));
        }
        let max_levels = mip_levels_for(self.width, self.height);
        if self.mip_levels == 0 || self.mip_levels > max_levels {
            return Err(RhiError::InvalidResource(format!(
                "image '{label}' requests {} mip level(s), {}x{} allows 1..={max_levels}",
                self.mip_levels, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Access masks and stages for one supported layout transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Looks up the barrier parameters for `old -> new`.
pub fn transition_rule(old: vk::ImageLayout, new: vk::ImageLayout) -> RhiResult<TransitionRule> {
    use vk::ImageLayout as L;

    match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => Ok(TransitionRule {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => Ok(TransitionRule {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => Ok(TransitionRule {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        }),
        (old, new) => Err(RhiError::UnsupportedLayoutTransition { old, new }),
    }
}

/// `floor(log2(max(width, height))) + 1`.
pub fn mip_levels_for(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Dimensions of every level of the chain, level 0 first. Each level halves
/// the previous one (floor), never dropping below 1.
pub fn mip_extents(width: u32, height: u32) -> Vec<(u32, u32)> {
    let levels = mip_levels_for(width, height);
    let mut extents = Vec::with_capacity(levels as usize);
    let (mut w, mut h) = (width.max(1), height.max(1));
    for _ in 0..levels {
        extents.push((w, h));
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    extents
}

/// Whether `format` is a combined depth-stencil format.
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Whether `format` has a depth aspect.
pub fn is_depth(format: vk::Format) -> bool {
    matches!(format, vk::Format::D32_SFLOAT | vk::Format::D16_UNORM) || has_stencil(format)
}

/// Aspect used for both the view and barriers of `format`.
pub fn aspect_for(format: vk::Format) -> vk::ImageAspectFlags {
    if has_stencil(format) {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if is_depth(format) {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// An image with its own memory and view.
pub struct GpuImage {
    device: Arc<Device>,
    image: vk::Image,
    /// Covers every mip level and array layer.
    view: vk::ImageView,
    /// `None` only once freed in `Drop`.
    allocation: Option<Allocation>,
    desc: ImageDesc,
    /// Layout after all recorded barriers execute, tracked on the CPU.
    layout: vk::ImageLayout,
    label: String,
}

impl GpuImage {
    /// Creates the image, binds allocator memory and creates a view over
    /// every mip level.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if `desc` fails
    /// [`ImageDesc::validate`], otherwise any Vulkan or allocation error.
    /// Partially created objects are destroyed before returning.
    pub fn new(device: Arc<Device>, desc: ImageDesc, label: &str) -> RhiResult<Self> {
        desc.validate(label)?;

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(desc.initial_layout)
            .usage(desc.usage)
            .sharing_mode(desc.sharing_mode)
            .samples(desc.samples);

        let image = unsafe { device.handle().create_image(&create_info, None)? };
        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = device.with_allocator(|allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: label,
                requirements,
                location: desc.location,
                linear: desc.tiling == vk::ImageTiling::LINEAR,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_image(image, None) };
                return Err(e);
            }
        };

        let mut created = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            desc,
            layout: desc.initial_layout,
            label: label.to_string(),
        };

        if let Some(allocation) = created.allocation.as_ref() {
            unsafe {
                created.device.handle().bind_image_memory(
                    image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(created.full_range());
        created.view = unsafe { created.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created image '{}': {}x{}, {:?}, {} mip(s), {:?}",
            label, desc.width, desc.height, desc.format, desc.mip_levels, desc.samples
        );
        Ok(created)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    /// Layout the image will be in once recorded commands execute.
    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    /// Every mip level and array layer, with the aspect implied by the format.
    fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange::default()
            .aspect_mask(aspect_for(self.desc.format))
            .base_mip_level(0)
            .level_count(self.desc.mip_levels)
            .base_array_layer(0)
            .layer_count(self.desc.array_layers)
    }

    /// Layout transition barrier on this image, ignoring queue family ownership.
    fn barrier(
        &self,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
        range: vk::ImageSubresourceRange,
    ) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .old_layout(old)
            .new_layout(new)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(range)
    }

    /// Records a barrier moving every level and layer to `new_layout`.
    ///
    /// The tracked layout only changes when the pair is supported.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::UnsupportedLayoutTransition`] for a pair outside
    /// the transition table.
    pub fn transition(&mut self, cmd: &CommandBuffer, new_layout: vk::ImageLayout) -> RhiResult<()> {
        let rule = transition_rule(self.layout, new_layout)?;
        let barrier = self.barrier(
            self.layout,
            new_layout,
            rule.src_access,
            rule.dst_access,
            self.full_range(),
        );
        cmd.pipeline_barrier(rule.src_stage, rule.dst_stage, &[barrier]);
        debug!(
            "Image '{}' transition {:?} -> {:?}",
            self.label, self.layout, new_layout
        );
        self.layout = new_layout;
        Ok(())
    }

    /// Copies tightly packed texels from `buffer` into mip level 0.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] unless the image is in
    /// TRANSFER_DST_OPTIMAL.
    pub fn copy_from_buffer(&self, cmd: &CommandBuffer, buffer: vk::Buffer) -> RhiResult<()> {
        if self.layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL {
            return Err(RhiError::InvalidResource(format!(
                "image '{}' must be TRANSFER_DST_OPTIMAL for a copy, is {:?}",
                self.label, self.layout
            )));
        }

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(0)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width: self.desc.width,
                height: self.desc.height,
                depth: 1,
            });

        cmd.copy_buffer_to_image(
            buffer,
            self.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );
        Ok(())
    }

    /// Fills levels `1..mip_levels` from level 0 and leaves the whole chain
    /// in SHADER_READ_ONLY_OPTIMAL.
    ///
    /// All levels must be in TRANSFER_DST_OPTIMAL with level 0 populated.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::UnsupportedBlitFormat`] if the format cannot be
    /// linearly blitted, and [`RhiError::UnsupportedLayoutTransition`] if
    /// the image is in any other layout.
    pub fn generate_mipmaps(&mut self, cmd: &CommandBuffer) -> RhiResult<()> {
        if !self.device.supports_linear_blit(self.desc.format) {
            return Err(RhiError::UnsupportedBlitFormat(self.desc.format));
        }
        if self.layout != vk::ImageLayout::TRANSFER_DST_OPTIMAL {
            return Err(RhiError::UnsupportedLayoutTransition {
                old: self.layout,
                new: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            });
        }

        let level_range = |level: u32| {
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(level)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1)
        };
        let level_layers = |level: u32| {
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(level)
                .base_array_layer(0)
                .layer_count(1)
        };
        let corner = |(w, h): (u32, u32)| vk::Offset3D {
            x: w as i32,
            y: h as i32,
            z: 1,
        };

        let extents = mip_extents(self.desc.width, self.desc.height);
        for level in 1..self.desc.mip_levels {
            let src = (level - 1) as usize;

            let to_src = self.barrier(
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
                level_range(level - 1),
            );
            cmd.pipeline_barrier(
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::TRANSFER,
                &[to_src],
            );

            let blit = vk::ImageBlit::default()
                .src_subresource(level_layers(level - 1))
                .src_offsets([vk::Offset3D::default(), corner(extents[src])])
                .dst_subresource(level_layers(level))
                .dst_offsets([vk::Offset3D::default(), corner(extents[src + 1])]);
            cmd.blit_within(self.image, &blit, vk::Filter::LINEAR);

            let to_read = self.barrier(
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_READ,
                vk::AccessFlags::SHADER_READ,
                level_range(level - 1),
            );
            cmd.pipeline_barrier(
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                &[to_read],
            );
        }

        let last = self.barrier(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            level_range(self.desc.mip_levels - 1),
        );
        cmd.pipeline_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            &[last],
        );

        self.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        debug!(
            "Generated {} mip level(s) for '{}'",
            self.desc.mip_levels, self.label
        );
        Ok(())
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            let freed = self
                .device
                .with_allocator(|allocator| Ok(allocator.free(allocation)?));
            if let Err(e) = freed {
                error!("Failed to free image '{}': {}", self.label, e);
            }
        }
        debug!("Destroyed image '{}'", self.label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_transitions() {
        use vk::ImageLayout as L;

        let upload = transition_rule(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(upload.src_access, vk::AccessFlags::empty());
        assert_eq!(upload.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(upload.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(upload.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let sample = transition_rule(L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL).unwrap();
        assert_eq!(sample.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(sample.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(sample.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);

        let depth = transition_rule(L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL).unwrap();
        assert!(depth
            .dst_access
            .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn test_unsupported_transition_is_reported() {
        use vk::ImageLayout as L;

        for (old, new) in [
            (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_DST_OPTIMAL),
            (L::UNDEFINED, L::PRESENT_SRC_KHR),
            (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_DST_OPTIMAL),
        ] {
            let err = transition_rule(old, new).unwrap_err();
            assert!(matches!(
                err,
                RhiError::UnsupportedLayoutTransition { old: o, new: n } if o == old && n == new
            ));
        }
    }

    #[test]
    fn test_mip_levels_for() {
        assert_eq!(mip_levels_for(1, 1), 1);
        assert_eq!(mip_levels_for(2, 1), 2);
        assert_eq!(mip_levels_for(512, 512), 10);
        assert_eq!(mip_levels_for(1024, 300), 11);
        assert_eq!(mip_levels_for(1000, 1), 10);
    }

    #[test]
    fn test_mip_extents_halve_to_one() {
        let extents = mip_extents(8, 2);
        assert_eq!(extents, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);

        let extents = mip_extents(300, 1024);
        assert_eq!(extents.len() as u32, mip_levels_for(300, 1024));
        assert_eq!(extents[1], (150, 512));
        assert_eq!(extents[2], (75, 256));
        assert_eq!(extents[3], (37, 128));
        assert_eq!(*extents.last().unwrap(), (1, 1));
    }

    #[test]
    fn test_aspect_for_formats() {
        assert_eq!(
            aspect_for(vk::Format::R8G8B8A8_SRGB),
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(aspect_for(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect_for(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }

    #[test]
    fn test_texture_desc_has_full_chain() {
        let desc = ImageDesc::texture(256, 128, vk::Format::R8G8B8A8_SRGB);
        assert_eq!(desc.mip_levels, 9);
        assert!(desc.usage.contains(vk::ImageUsageFlags::TRANSFER_SRC));
        assert!(desc.usage.contains(vk::ImageUsageFlags::SAMPLED));
    }

    #[test]
    fn test_desc_validation_bounds_mip_levels() {
        let mut desc = ImageDesc::texture(256, 128, vk::Format::R8G8B8A8_SRGB);
        assert!(desc.validate("full").is_ok());

        desc.mip_levels = 1;
        assert!(desc.validate("single").is_ok());

        desc.mip_levels = 10;
        let err = desc.validate("too_deep").unwrap_err();
        assert!(matches!(err, RhiError::InvalidResource(ref msg) if msg.contains("too_deep")));

        desc.mip_levels = 0;
        assert!(matches!(
            desc.validate("empty_chain"),
            Err(RhiError::InvalidResource(_))
        ));
    }

    #[test]
    fn test_desc_validation_rejects_zero_extent() {
        let desc = ImageDesc::texture(0, 64, vk::Format::R8G8B8A8_SRGB);
        assert!(matches!(
            desc.validate("flat"),
            Err(RhiError::InvalidResource(_))
        ));
    }

    #[test]
    fn test_color_target_is_transient() {
        let desc = ImageDesc::color_target(
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            vk::Format::B8G8R8A8_SRGB,
            vk::SampleCountFlags::TYPE_4,
        );
        assert_eq!(desc.mip_levels, 1);
        assert_eq!(desc.samples, vk::SampleCountFlags::TYPE_4);
        assert!(desc.usage.contains(vk::ImageUsageFlags::TRANSIENT_ATTACHMENT));
    }
}
