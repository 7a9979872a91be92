//! Per-frame-slot uniform buffers, mapped once for their whole life.
//!
//! A [`UniformRing`] is created for one payload size and accepts only writes
//! of exactly that many bytes. Slot `i` may be written once the fence of
//! frame slot `i` has signaled; no other synchronization is done here.

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::descriptor::BindingTarget;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// One mapped uniform buffer per frame slot.
pub struct UniformRing {
    /// Indexed by frame slot.
    buffers: Vec<Buffer>,
    /// Exact byte length every write must have.
    payload_size: usize,
}

impl UniformRing {
    /// Allocates `slots` host-visible coherent buffers of `payload_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if any buffer cannot be created or is not mapped.
    pub fn new(
        device: Arc<Device>,
        label: &str,
        payload_size: usize,
        slots: usize,
    ) -> RhiResult<Self> {
        let buffers = (0..slots)
            .map(|slot| {
                Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    payload_size as vk::DeviceSize,
                    &format!("{label} uniform {slot}"),
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        if let Some(unmapped) = buffers.iter().position(|b| !b.is_mapped()) {
            return Err(RhiError::InvalidResource(format!(
                "uniform buffer {unmapped} of '{label}' is not host-mapped"
            )));
        }

        debug!(
            "Created uniform ring '{}': {} slot(s) x {} bytes",
            label, slots, payload_size
        );
        Ok(Self {
            buffers,
            payload_size,
        })
    }

    /// Copies `payload` into `slot`'s mapped memory.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PayloadSizeMismatch`] unless `payload` is exactly
    /// the ring's payload size, and [`RhiError::FrameSlotOutOfRange`] for a
    /// bad slot.
    pub fn update(&self, slot: usize, payload: &[u8]) -> RhiResult<()> {
        check_payload_len(self.payload_size, payload.len())?;
        self.buffer(slot)?.write(0, payload)
    }

    /// Typed form of [`UniformRing::update`].
    pub fn write<T: Pod>(&self, slot: usize, value: &T) -> RhiResult<()> {
        self.update(slot, bytemuck::bytes_of(value))
    }

    /// The buffer backing `slot`.
    pub fn buffer(&self, slot: usize) -> RhiResult<&Buffer> {
        self.buffers.get(slot).ok_or(RhiError::FrameSlotOutOfRange {
            slot,
            slots: self.buffers.len(),
        })
    }

    /// Descriptor targets covering every slot, in slot order.
    pub fn handles(&self) -> Vec<BindingTarget> {
        self.buffers
            .iter()
            .map(|buffer| BindingTarget::Buffer {
                buffer: buffer.handle(),
                range: self.payload_size as vk::DeviceSize,
            })
            .collect()
    }

    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.buffers.len()
    }
}

/// A payload must be exactly the size the ring was created for.
pub fn check_payload_len(expected: usize, actual: usize) -> RhiResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RhiError::PayloadSizeMismatch { expected, actual })
    }
}
