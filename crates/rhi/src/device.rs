//! Logical device facade.
//!
//! [`Device`] owns the logical device, its queues and the gpu-allocator
//! instance, and answers the capability questions the rest of the pipeline
//! asks: format-feature support, whether sample-rate shading is on, and the
//! highest multisample count usable for color and depth together. Memory
//! types are chosen by the allocator.
//!
//! # Example
//!
//! ```no_run
//! use vkpipe_rhi::device::Device;
//! use vkpipe_rhi::physical_device::select_physical_device;
//! # fn demo(instance: &vkpipe_rhi::instance::Instance, surface: ash::vk::SurfaceKHR)
//! #     -> vkpipe_rhi::RhiResult<()> {
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//! let info = select_physical_device(instance.handle(), surface, &surface_loader)?;
//! let device = Device::new(instance, &info, 8)?;
//! let samples = device.msaa_samples();
//! # Ok(()) }
//! ```

use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{DEVICE_EXTENSIONS, PhysicalDeviceInfo, QueueFamilyIndices};

/// Vulkan logical device wrapper.
///
/// Shared through `Arc`; every RAII resource in this crate holds one so the
/// device outlives anything created from it.
pub struct Device {
    device: ash::Device,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    allocator: Mutex<Option<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
    msaa_samples: vk::SampleCountFlags,
    /// Whether `sampleRateShading` was enabled at creation.
    sample_rate_shading: bool,
}

impl Device {
    /// Creates the logical device and initializes the allocator.
    ///
    /// Sampler anisotropy is always enabled. Sample-rate shading is enabled
    /// only when the physical device reports it, see
    /// [`sample_rate_shading`](Self::sample_rate_shading).
    ///
    /// # Arguments
    ///
    /// * `instance` - Instance the physical device was enumerated from
    /// * `physical_device_info` - Device chosen by `select_physical_device`
    /// * `max_msaa_samples` - Cap on the sample count picked for render targets
    ///
    /// # Errors
    ///
    /// Returns an error if a queue family is missing, device creation
    /// fails, or the allocator cannot be initialized.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
        max_msaa_samples: u32,
    ) -> Result<Arc<Self>, RhiError> {
        let queue_families = physical_device_info.queue_families;
        let graphics_family = queue_families.graphics()?;
        let present_family = queue_families.present()?;

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let sample_rate_shading = physical_device_info.features.sample_rate_shading == vk::TRUE;
        let features = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .sample_rate_shading(sample_rate_shading);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };
        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!(
            "Queues retrieved: graphics+compute family {}, present family {}",
            graphics_family, present_family
        );

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };
        info!("GPU memory allocator initialized");

        let msaa_samples = max_usable_sample_count(
            physical_device_info.framebuffer_sample_counts(),
            max_msaa_samples,
        );
        info!(
            "MSAA sample count: {:?}, sample-rate shading: {}",
            msaa_samples, sample_rate_shading
        );

        Ok(Arc::new(Self {
            device,
            instance: instance.handle().clone(),
            physical_device: physical_device_info.device,
            properties: physical_device_info.properties,
            allocator: Mutex::new(Some(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
            msaa_samples,
            sample_rate_shading,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Sample count used for the color and depth render targets.
    #[inline]
    pub fn msaa_samples(&self) -> vk::SampleCountFlags {
        self.msaa_samples
    }

    /// Runs `f` with exclusive access to the allocator.
    ///
    /// The allocator owns memory-type selection for every buffer and image.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the allocator mutex is
    /// poisoned or the allocator was already released, otherwise whatever
    /// `f` returns.
    pub fn with_allocator<R>(
        &self,
        f: impl FnOnce(&mut Allocator) -> Result<R, RhiError>,
    ) -> Result<R, RhiError> {
        let mut guard = self
            .allocator
            .lock()
            .map_err(|_| RhiError::InvalidResource("allocator mutex poisoned".to_string()))?;
        let allocator = guard
            .as_mut()
            .ok_or_else(|| RhiError::InvalidResource("allocator already released".to_string()))?;
        f(allocator)
    }

    /// Whether shaders may run per sample.
    ///
    /// Pipelines must leave sample shading disabled when this is `false`.
    #[inline]
    pub fn sample_rate_shading(&self) -> bool {
        self.sample_rate_shading
    }

    /// Linear, optimal and buffer features of `format` on this adapter.
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    /// First of `candidates` whose `tiling` features include `features`.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format, RhiError> {
        candidates
            .iter()
            .copied()
            .find(|&format| {
                tiling_supports(&self.format_properties(format), tiling, features)
            })
            .ok_or_else(|| RhiError::NoSupportedFormat {
                candidates: candidates.to_vec(),
                features,
            })
    }

    /// Whether images of `format` can be the source of a linear-filtered blit.
    pub fn supports_linear_blit(&self, format: vk::Format) -> bool {
        self.format_properties(format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    }

    /// Blocks until all queues are idle.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue.
    ///
    /// # Safety
    ///
    /// Command buffers must be fully recorded and `fence` must be unsignaled
    /// and not in use by another submission.
    pub unsafe fn submit_graphics(
        &self,
        submit_infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), RhiError> {
        unsafe {
            self.device
                .queue_submit(self.graphics_queue, submit_infos, fence)?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }
            // The allocator frees its memory blocks against the device, so it
            // must go first.
            if let Ok(mut allocator) = self.allocator.lock() {
                allocator.take();
            }
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device and ash::Instance are function tables plus handles,
// the allocator is behind a Mutex, everything else is Copy handle data.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

/// Highest single sample count present in `supported`, capped at `cap`.
pub fn max_usable_sample_count(supported: vk::SampleCountFlags, cap: u32) -> vk::SampleCountFlags {
    const ORDERED: [(vk::SampleCountFlags, u32); 7] = [
        (vk::SampleCountFlags::TYPE_64, 64),
        (vk::SampleCountFlags::TYPE_32, 32),
        (vk::SampleCountFlags::TYPE_16, 16),
        (vk::SampleCountFlags::TYPE_8, 8),
        (vk::SampleCountFlags::TYPE_4, 4),
        (vk::SampleCountFlags::TYPE_2, 2),
        (vk::SampleCountFlags::TYPE_1, 1),
    ];

    ORDERED
        .iter()
        .find(|(flag, count)| *count <= cap && supported.contains(*flag))
        .map(|(flag, _)| *flag)
        .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

fn tiling_supports(
    properties: &vk::FormatProperties,
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
) -> bool {
    match tiling {
        vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
        vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_sample_count_picks_highest_shared() {
        let supported = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_2
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_8;
        assert_eq!(
            max_usable_sample_count(supported, 64),
            vk::SampleCountFlags::TYPE_8
        );
    }

    #[test]
    fn test_max_sample_count_respects_cap() {
        let supported = vk::SampleCountFlags::TYPE_1
            | vk::SampleCountFlags::TYPE_4
            | vk::SampleCountFlags::TYPE_16;
        assert_eq!(
            max_usable_sample_count(supported, 8),
            vk::SampleCountFlags::TYPE_4
        );
        assert_eq!(
            max_usable_sample_count(supported, 1),
            vk::SampleCountFlags::TYPE_1
        );
    }

    #[test]
    fn test_max_sample_count_falls_back_to_one() {
        assert_eq!(
            max_usable_sample_count(vk::SampleCountFlags::empty(), 8),
            vk::SampleCountFlags::TYPE_1
        );
    }

    #[test]
    fn test_tiling_supports() {
        let props = vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::empty(),
            optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        let depth = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        assert!(tiling_supports(&props, vk::ImageTiling::OPTIMAL, depth));
        assert!(!tiling_supports(&props, vk::ImageTiling::LINEAR, depth));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
