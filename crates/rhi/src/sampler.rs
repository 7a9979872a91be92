//! Texture sampler.
//!
//! Every texture gets its own [`Sampler`] sized to its mip chain, so the
//! whole chain is reachable through `max_lod`.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Linear, repeating, anisotropic sampler covering `mip_levels` levels.
pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Uses the device's maximum anisotropy. `mip_levels` bounds `max_lod`.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new(device: Arc<Device>, mip_levels: u32) -> RhiResult<Self> {
        let max_anisotropy = device.limits().max_sampler_anisotropy;
        let create_info = sampler_info(max_anisotropy, mip_levels);
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };
        debug!(
            "Created sampler (anisotropy {}, {} mip level(s))",
            max_anisotropy, mip_levels
        );
        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_sampler(self.sampler, None) };
    }
}

fn sampler_info(max_anisotropy: f32, mip_levels: u32) -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
        .mip_lod_bias(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_covers_mip_chain() {
        let info = sampler_info(16.0, 10);
        assert_eq!(info.max_lod, 10.0);
        assert_eq!(info.max_anisotropy, 16.0);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
    }
}
