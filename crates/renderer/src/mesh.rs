//! Device-local vertex and index buffers for one mesh.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use vkpipe_resources::MeshData;
use vkpipe_rhi::buffer::{Buffer, BufferUsage};
use vkpipe_rhi::command::{CommandBuffer, CommandPool};
use vkpipe_rhi::device::Device;
use vkpipe_rhi::{RhiError, RhiResult};

/// A mesh resident in device-local memory, drawn as an indexed triangle list.
pub struct GpuMesh {
    vertex_buffer: Buffer,
    /// `u32` indices.
    index_buffer: Buffer,
    index_count: u32,
}

impl GpuMesh {
    /// Validates `mesh` and uploads it through staging buffers.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidResource`] if the mesh is not drawable,
    /// otherwise any buffer creation or upload error.
    pub fn upload(
        device: Arc<Device>,
        pool: &CommandPool,
        mesh: &MeshData,
        name: &str,
    ) -> RhiResult<Self> {
        mesh.validate(name)
            .map_err(|e| RhiError::InvalidResource(e.to_string()))?;

        let vertex_buffer = Buffer::device_local_with_data(
            device.clone(),
            pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(&mesh.vertices),
            &format!("{name} vertices"),
        )?;
        let index_buffer = Buffer::device_local_with_data(
            device,
            pool,
            BufferUsage::Index,
            bytemuck::cast_slice(&mesh.indices),
            &format!("{name} indices"),
        )?;

        debug!(
            "Mesh '{}': {} vertices, {} indices",
            name,
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Binds both buffers and issues one indexed draw.
    pub fn draw(&self, cmd: &CommandBuffer) {
        cmd.bind_vertex_buffer(self.vertex_buffer.handle());
        cmd.bind_index_buffer(self.index_buffer.handle(), vk::IndexType::UINT32);
        cmd.draw_indexed(self.index_count);
    }
}
