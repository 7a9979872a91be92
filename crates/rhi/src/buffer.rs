//! GPU buffers backed by gpu-allocator memory.
//!
//! Host-visible buffers ([`MemoryLocation::CpuToGpu`]) stay mapped for their
//! whole life; gpu-allocator maps the block once and hands out
//! [`Allocation::mapped_ptr`]. Vertex and index data go to device-local
//! memory through a staging copy ([`Buffer::device_local_with_data`]).

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::command::{CommandPool, submit_one_time};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// How a buffer is used, which fixes its usage flags and memory location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data, filled by a transfer.
    Vertex,
    /// Device-local `u32` indices, filled by a transfer.
    Index,
    /// Host-visible uniform data rewritten every frame.
    Uniform,
    /// Device-local storage, also bindable as vertex input.
    Storage,
    /// Host-visible transfer source.
    Staging,
}

impl BufferUsage {
    /// Vulkan usage flags for this kind of buffer.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Storage => {
                vk::BufferUsageFlags::STORAGE_BUFFER
                    | vk::BufferUsageFlags::VERTEX_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Where gpu-allocator places the memory.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index | BufferUsage::Storage => {
                MemoryLocation::GpuOnly
            }
            // Written by the CPU every frame or once per upload.
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Storage => "storage",
            BufferUsage::Staging => "staging",
        }
    }
}

/// Vulkan buffer plus its allocation.
///
/// The buffer is destroyed before its memory is returned to the allocator.
pub struct Buffer {
    /// Keeps the device alive until the buffer is destroyed.
    device: Arc<Device>,
    buffer: vk::Buffer,
    /// `None` only once freed in `Drop`.
    allocation: Option<Allocation>,
    /// Requested size in bytes, not the allocation size.
    size: vk::DeviceSize,
    usage: BufferUsage,
    /// Name used for the allocation and in log messages.
    label: String,
}

impl Buffer {
    /// Creates a buffer and binds freshly allocated memory to it.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `usage` - Fixes both the usage flags and the memory location
    /// * `size` - Size in bytes, must be non-zero
    /// * `label` - Allocation name, also used in logs
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] for a zero size, otherwise any
    /// Vulkan or allocation error. Nothing leaks on failure.
    pub fn new(
        device: Arc<Device>,
        usage: BufferUsage,
        size: vk::DeviceSize,
        label: &str,
    ) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidResource(format!(
                "buffer '{label}' has zero size"
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.with_allocator(|allocator| {
            Ok(allocator.allocate(&AllocationCreateDesc {
                name: label,
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?)
        });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let bound = unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };

        let created = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            label: label.to_string(),
        };
        bound?;

        debug!("Created {} buffer '{}': {} bytes", usage.name(), label, size);
        Ok(created)
    }

    /// Creates a host-visible buffer and fills it with `data`.
    ///
    /// # Errors
    ///
    /// Fails like [`Buffer::new`], and if `usage` is not host-visible.
    pub fn with_data(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[u8],
        label: &str,
    ) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize, label)?;
        buffer.write(0, data)?;
        Ok(buffer)
    }

    /// Creates a device-local buffer and uploads `data` through a staging
    /// buffer, waiting for the copy to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if either buffer cannot be created or the one-time
    /// copy submission fails.
    pub fn device_local_with_data(
        device: Arc<Device>,
        pool: &CommandPool,
        usage: BufferUsage,
        data: &[u8],
        label: &str,
    ) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;
        let staging = Self::with_data(
            device.clone(),
            BufferUsage::Staging,
            data,
            &format!("{label} staging"),
        )?;
        let buffer = Self::new(device.clone(), usage, size, label)?;

        submit_one_time(&device, pool, |cmd| {
            cmd.copy_buffer(staging.handle(), buffer.handle(), size);
            Ok(())
        })?;

        Ok(buffer)
    }

    /// Copies `data` into the mapped memory at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the range does not fit or
    /// the buffer is not host-mapped.
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        check_range(offset, data.len(), self.size)?;

        let mapped_ptr = self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .ok_or_else(|| {
                RhiError::InvalidResource(format!("buffer '{}' is not host-mapped", self.label))
            })?;

        unsafe {
            let dst = (mapped_ptr.as_ptr() as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Whether [`write`](Self::write) can reach this buffer's memory.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.allocation
            .as_ref()
            .is_some_and(|a| a.mapped_ptr().is_some())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            let freed = self
                .device
                .with_allocator(|allocator| Ok(allocator.free(allocation)?));
            if let Err(e) = freed {
                error!("Failed to free buffer '{}': {}", self.label, e);
            }
        }
        debug!("Destroyed {} buffer '{}'", self.usage.name(), self.label);
    }
}

/// `len` bytes at `offset` must fit in a buffer of `size` bytes.
pub fn check_range(offset: vk::DeviceSize, len: usize, size: vk::DeviceSize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::InvalidResource(format!(
            "write of {len} bytes at offset {offset} exceeds buffer of {size} bytes"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_flags() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
        assert_eq!(
            BufferUsage::Uniform.to_vk_usage(),
            vk::BufferUsageFlags::UNIFORM_BUFFER
        );
        assert!(
            BufferUsage::Storage
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::STORAGE_BUFFER)
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_host_written_buffers_are_mappable() {
        assert_eq!(
            BufferUsage::Uniform.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(
            BufferUsage::Staging.memory_location(),
            MemoryLocation::CpuToGpu
        );
        assert_eq!(BufferUsage::Vertex.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(BufferUsage::Index.memory_location(), MemoryLocation::GpuOnly);
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 64, 64).is_ok());
        assert!(check_range(32, 32, 64).is_ok());
        assert!(check_range(33, 32, 64).is_err());
        assert!(check_range(u64::MAX, 1, 64).is_err());
    }
}
