//! Physical device (GPU) selection.
//!
//! A device is suitable when it has:
//! 1. A queue family supporting both graphics and compute
//! 2. A queue family that can present to the surface
//! 3. The swapchain extension, with at least one surface format and present mode
//! 4. Sampler anisotropy
//!
//! Suitable devices are scored and the highest score wins, preferring discrete GPUs.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;
use crate::swapchain::SwapchainSupportDetails;

/// Device extensions every candidate must expose.
pub const DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Queue family indices used by the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// A family with both GRAPHICS and COMPUTE.
    pub graphics_compute_family: Option<u32>,
    /// A family able to present to the window surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_compute_family.is_some() && self.present_family.is_some()
    }

    /// Distinct family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_compute_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }

    /// Family used for graphics, compute and transfer submissions.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::QueueFamilyNotFound`] if none was found.
    pub fn graphics(&self) -> Result<u32, RhiError> {
        self.graphics_compute_family
            .ok_or(RhiError::QueueFamilyNotFound("graphics+compute"))
    }

    /// Family that can present to the surface.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::QueueFamilyNotFound`] if none was found.
    pub fn present(&self) -> Result<u32, RhiError> {
        self.present_family
            .ok_or(RhiError::QueueFamilyNotFound("present"))
    }

    /// Whether swapchain images must be shared between two families.
    pub fn is_split(&self) -> bool {
        self.graphics_compute_family != self.present_family
    }
}

/// Information about a selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported features; the logical device enables a subset.
    pub features: vk::PhysicalDeviceFeatures,
    /// Only used to report device-local memory when ranking adapters.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Driver-reported adapter name.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Human-readable device type for logs.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Sample counts usable for both color and depth framebuffer attachments.
    pub fn framebuffer_sample_counts(&self) -> vk::SampleCountFlags {
        let limits = &self.properties.limits;
        limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts
    }

    /// Total device-local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable physical device for presenting to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no device meets the requirements.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }
    info!("Found {} GPU(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;
    for device in devices {
        let Some(info) = check_device_suitability(instance, device, surface, surface_loader)
        else {
            continue;
        };
        let score = rate_device(&info);
        debug!(
            "GPU '{}' ({}) - Score: {}",
            info.device_name(),
            info.device_type_name(),
            score
        );
        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((info, score));
        }
    }

    let (selected, score) = best.ok_or_else(|| {
        warn!("No suitable GPU found with required capabilities");
        RhiError::NoSuitableGpu
    })?;

    info!(
        "Selected GPU: '{}' ({}) - Score: {}",
        selected.device_name(),
        selected.device_type_name(),
        score
    );
    Ok(selected)
}

/// Queries `device` and returns its info when it has complete queue families,
/// the swapchain extension, a usable surface and sampler anisotropy.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing queue families (graphics+compute={}, present={})",
            device_name,
            queue_families.graphics_compute_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    if !supports_device_extensions(instance, device) {
        debug!("GPU '{}' skipped: swapchain extension missing", device_name);
        return None;
    }

    match SwapchainSupportDetails::query(surface_loader, device, surface) {
        Ok(details) if details.is_adequate() => {}
        _ => {
            debug!("GPU '{}' skipped: inadequate swapchain support", device_name);
            return None;
        }
    }

    if features.sampler_anisotropy == vk::FALSE {
        debug!("GPU '{}' skipped: sampler anisotropy not supported", device_name);
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
    })
}

/// Whether every entry of `DEVICE_EXTENSIONS` is available on `device`.
fn supports_device_extensions(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let Ok(available) = (unsafe { instance.enumerate_device_extension_properties(device) }) else {
        return false;
    };
    let available: Vec<&CStr> = available
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
        .collect();
    missing_extensions(&available).is_empty()
}

/// Required extensions absent from `available`.
fn missing_extensions<'a>(available: &[&CStr]) -> Vec<&'a CStr> {
    DEVICE_EXTENSIONS
        .iter()
        .filter(|required| !available.contains(required))
        .copied()
        .collect()
}

/// Finds a graphics+compute family and a family that can present to `surface`.
/// A single family covering both is preferred.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    pick_queue_families(&families, |index| unsafe {
        surface_loader
            .get_physical_device_surface_support(device, index, surface)
            .unwrap_or(false)
    })
}

/// Picks the first graphics+compute family and a present family, preferring
/// a single family that does both.
fn pick_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        let graphics_compute = family
            .queue_flags
            .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE);
        let present = can_present(i);

        if graphics_compute && present {
            return QueueFamilyIndices {
                graphics_compute_family: Some(i),
                present_family: Some(i),
            };
        }
        if graphics_compute && indices.graphics_compute_family.is_none() {
            indices.graphics_compute_family = Some(i);
        }
        if present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

/// Scores a suitable device. Discrete GPUs dominate, then image size limits,
/// VRAM and supported sample counts break ties.
fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    score += info.properties.limits.max_image_dimension2_d;

    let vram_mb = (info.device_local_memory() / (1024 * 1024)) as u32;
    score += vram_mb.min(16000);

    // Higher MSAA headroom is worth a little.
    score += info.framebuffer_sample_counts().as_raw().count_ones() * 10;

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_family_indices_complete() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        indices.graphics_compute_family = Some(0);
        assert!(!indices.is_complete());

        indices.present_family = Some(1);
        assert!(indices.is_complete());
        assert!(indices.is_split());
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilyIndices {
            graphics_compute_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_compute_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_missing_family_errors() {
        let indices = QueueFamilyIndices::default();
        assert!(matches!(
            indices.graphics(),
            Err(RhiError::QueueFamilyNotFound("graphics+compute"))
        ));
        assert!(matches!(
            indices.present(),
            Err(RhiError::QueueFamilyNotFound("present"))
        ));
    }

    #[test]
    fn test_pick_prefers_family_doing_both() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        // Family 0 cannot present, family 2 can do everything.
        let indices = pick_queue_families(&families, |i| i != 0);
        assert_eq!(indices.graphics_compute_family, Some(2));
        assert_eq!(indices.present_family, Some(2));
    }

    #[test]
    fn test_pick_split_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = pick_queue_families(&families, |i| i == 1);
        assert_eq!(indices.graphics_compute_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
    }

    #[test]
    fn test_pick_ignores_graphics_without_compute() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = pick_queue_families(&families, |_| true);
        assert!(indices.graphics_compute_family.is_none());
        assert_eq!(indices.present_family, Some(0));
    }

    #[test]
    fn test_missing_extensions() {
        assert_eq!(missing_extensions(&[]), vec![ash::khr::swapchain::NAME]);
        assert!(missing_extensions(&[ash::khr::swapchain::NAME]).is_empty());
    }
}
