//! Vulkan instance with optional validation.
//!
//! The instance enables exactly the surface extensions the window's display
//! needs (queried through `ash-window`) plus `VK_EXT_debug_utils` when the
//! validation layer is requested and present. Validation messages are routed
//! into `tracing` at the matching level.

use std::ffi::CStr;

use ash::{Entry, vk};
use raw_window_handle::RawDisplayHandle;
use tracing::{Level, debug, error, info, trace, warn};

use crate::error::RhiError;

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper.
///
/// Must outlive the surface, the device and everything created from them.
/// Dropping it destroys the debug messenger first.
pub struct Instance {
    /// Loaded Vulkan library; kept alive for the instance's function table.
    entry: Entry,
    instance: ash::Instance,
    /// Present only when validation is active.
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates the instance for a window living on `display`.
    ///
    /// A missing validation layer downgrades to a warning rather than failing.
    ///
    /// # Arguments
    ///
    /// * `enable_validation` - Request `VK_LAYER_KHRONOS_validation`
    /// * `display` - Display of the window that will be presented to
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded, the display
    /// has no surface extensions, or instance creation fails.
    pub fn new(enable_validation: bool, display: RawDisplayHandle) -> Result<Self, RhiError> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"vkpipe")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"vkpipe")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extensions = ash_window::enumerate_required_extensions(display)?.to_vec();
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan instance created with {} extension(s)",
            extensions.len()
        );

        let debug_utils = if validation_available {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let messenger = match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => messenger,
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            };
            info!("Validation layers enabled");
            Some((loader, messenger))
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
        })
    }

    /// The raw ash instance.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// The loader entry, needed to build extension loaders.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    fn is_validation_layer_available(entry: &Entry) -> Result<bool, RhiError> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };

        Ok(available_layers.iter().any(|layer| {
            let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
            name == VALIDATION_LAYER_NAME
        }))
    }

    /// Subscribes to info, warning and error messages of every type.
    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> Result<vk::DebugUtilsMessengerEXT, RhiError> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Maps a validation message severity onto a tracing level.
fn log_level_for(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Level::DEBUG
    } else {
        Level::TRACE
    }
}

/// Short label for the single type bit set on a message.
fn message_type_name(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    }
}

/// Validation layer callback.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid (or null) callback data pointer.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };
    let kind = message_type_name(message_type);

    let level = log_level_for(message_severity);
    if level == Level::ERROR {
        error!("[Vulkan {}] {}", kind, message);
    } else if level == Level::WARN {
        warn!("[Vulkan {}] {}", kind, message);
    } else if level == Level::DEBUG {
        debug!("[Vulkan {}] {}", kind, message);
    } else {
        trace!("[Vulkan {}] {}", kind, message);
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as S;

        assert_eq!(log_level_for(S::ERROR), Level::ERROR);
        assert_eq!(log_level_for(S::WARNING), Level::WARN);
        assert_eq!(log_level_for(S::INFO), Level::DEBUG);
        assert_eq!(log_level_for(S::VERBOSE), Level::TRACE);
        // Combined bits resolve to the most severe one.
        assert_eq!(log_level_for(S::WARNING | S::ERROR), Level::ERROR);
    }

    #[test]
    fn test_message_type_names() {
        use vk::DebugUtilsMessageTypeFlagsEXT as T;

        assert_eq!(message_type_name(T::VALIDATION), "Validation");
        assert_eq!(message_type_name(T::PERFORMANCE), "Performance");
        assert_eq!(message_type_name(T::GENERAL | T::VALIDATION), "Unknown");
    }

    #[test]
    fn test_validation_layer_name() {
        assert_eq!(
            VALIDATION_LAYER_NAME.to_str().unwrap(),
            "VK_LAYER_KHRONOS_validation"
        );
    }
}
