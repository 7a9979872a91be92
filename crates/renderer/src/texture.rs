//! Sampled textures: upload, mip chain and sampler.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use vkpipe_resources::TextureData;
use vkpipe_rhi::RhiResult;
use vkpipe_rhi::buffer::{Buffer, BufferUsage};
use vkpipe_rhi::command::{CommandPool, submit_one_time};
use vkpipe_rhi::descriptor::BindingTarget;
use vkpipe_rhi::device::Device;
use vkpipe_rhi::image::{GpuImage, ImageDesc};
use vkpipe_rhi::sampler::Sampler;

/// Texel format of every uploaded texture.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// A texture image with its full mip chain, ready for sampling.
pub struct GpuTexture {
    image: GpuImage,
    sampler: Sampler,
}

impl GpuTexture {
    /// Uploads `data` through a staging buffer and blits the mip chain.
    ///
    /// Fails with an unsupported-blit error when the device cannot linearly
    /// filter [`TEXTURE_FORMAT`].
    ///
    /// # Arguments
    ///
    /// * `device` - Logical device that owns the image and sampler
    /// * `pool` - Pool for the one-time upload command buffer
    /// * `data` - Decoded RGBA8 pixels
    /// * `name` - Label used for allocations and logs
    pub fn upload(
        device: Arc<Device>,
        pool: &CommandPool,
        data: &TextureData,
        name: &str,
    ) -> RhiResult<Self> {
        let staging = Buffer::with_data(
            device.clone(),
            BufferUsage::Staging,
            data.pixels(),
            &format!("{name} staging"),
        )?;

        let desc = ImageDesc::texture(data.width(), data.height(), TEXTURE_FORMAT);
        let mut image = GpuImage::new(device.clone(), desc, name)?;

        submit_one_time(&device, pool, |cmd| {
            image.transition(cmd, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
            image.copy_from_buffer(cmd, staging.handle())?;
            image.generate_mipmaps(cmd)
        })?;
        drop(staging);

        let sampler = Sampler::new(device, desc.mip_levels)?;
        info!(
            "Texture '{}' uploaded: {}x{}, {} mip level(s)",
            name,
            data.width(),
            data.height(),
            desc.mip_levels
        );

        Ok(Self { image, sampler })
    }

    /// Number of levels in the generated chain.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.image.desc().mip_levels
    }

    /// Descriptor target for a combined image sampler binding.
    pub fn binding(&self) -> BindingTarget {
        BindingTarget::Image {
            view: self.image.view(),
            sampler: self.sampler.handle(),
        }
    }
}
