/// VulkanBuffer - Vulkan implementation of the Buffer trait

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use draw_hal::{check_full_write, check_partial_write, hal_err, Buffer, BufferUsage, Result};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer implementation
///
/// DYNAMIC buffers live in host-visible memory and writes are a plain
/// memcpy. Other buffers are device-local: each write goes through a staging
/// buffer and a one-shot copy, waited on before returning.
pub struct VulkanBuffer {
    /// Shared GPU context (device, allocator, queue, command pool)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    /// Requested size (the native buffer is never smaller than one byte)
    size: usize,
    usage: BufferUsage,
}

impl VulkanBuffer {
    pub fn new(ctx: Arc<GpuContext>, size: usize, usage: BufferUsage) -> Result<Self> {
        let (buffer, allocation) = create_buffer_with_memory(
            &ctx,
            size.max(1) as u64,
            buffer_usage_to_vk(usage),
            buffer_memory_location(usage),
            "buffer",
        )?;
        Ok(Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let allocation = self
            .allocation
            .as_ref()
            .ok_or_else(|| hal_err!("draw_hal::vulkan", "Buffer write failed: no GPU allocation"))?;
        if allocation.mapped_ptr().is_some() {
            return copy_to_allocation(allocation, offset, data);
        }
        self.write_staged(offset, data)
    }

    /// Upload into device-local memory through a temporary staging buffer
    fn write_staged(&self, offset: usize, data: &[u8]) -> Result<()> {
        let (staging, staging_allocation) =
            create_host_buffer(&self.ctx, data.len() as u64, vk::BufferUsageFlags::TRANSFER_SRC, "staging buffer")?;

        let result = copy_to_allocation(&staging_allocation, 0, data).and_then(|()| {
            let device = &self.ctx.device;
            let dst = self.buffer;
            let dst_access = buffer_read_access(self.usage);
            self.ctx.submit_one_shot(|cmd| unsafe {
                let region = vk::BufferCopy::default()
                    .src_offset(0)
                    .dst_offset(offset as u64)
                    .size(data.len() as u64);
                device.cmd_copy_buffer(cmd, staging, dst, &[region]);

                let barrier = vk::BufferMemoryBarrier::default()
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(dst_access)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .buffer(dst)
                    .offset(offset as u64)
                    .size(data.len() as u64);
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::VERTEX_INPUT | vk::PipelineStageFlags::ALL_GRAPHICS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[barrier],
                    &[],
                );
                Ok(())
            })
        });

        unsafe {
            self.ctx.device.destroy_buffer(staging, None);
        }
        self.ctx.free_allocation(staging_allocation);
        result
    }
}

impl Buffer for VulkanBuffer {
    fn size(&self) -> usize {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn write_full(&mut self, data: &[u8]) -> Result<()> {
        check_full_write(self.size, data.len())?;
        self.write(0, data)
    }

    fn write_partial(&mut self, data: &[u8], offset: usize) -> Result<()> {
        check_partial_write(self.size, offset, data.len())?;
        self.write(offset, data)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                self.ctx.free_allocation(allocation);
            }

            // Destroy buffer
            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}

/// Vulkan usage flags for a draw_hal buffer
pub fn buffer_usage_to_vk(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::TRANSFER_DST;
    if usage.contains(BufferUsage::VERTEX_DATA) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX_DATA) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::GENERIC) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER
            | vk::BufferUsageFlags::INDEX_BUFFER
            | vk::BufferUsageFlags::UNIFORM_BUFFER
            | vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

/// Memory a buffer lives in: host-visible only when DYNAMIC
pub fn buffer_memory_location(usage: BufferUsage) -> MemoryLocation {
    if usage.contains(BufferUsage::DYNAMIC) {
        MemoryLocation::CpuToGpu
    } else {
        MemoryLocation::GpuOnly
    }
}

/// Accesses that may read a buffer after an upload
fn buffer_read_access(usage: BufferUsage) -> vk::AccessFlags {
    let mut access = vk::AccessFlags::empty();
    if usage.intersects(BufferUsage::VERTEX_DATA | BufferUsage::GENERIC) {
        access |= vk::AccessFlags::VERTEX_ATTRIBUTE_READ;
    }
    if usage.intersects(BufferUsage::INDEX_DATA | BufferUsage::GENERIC) {
        access |= vk::AccessFlags::INDEX_READ;
    }
    if usage.contains(BufferUsage::GENERIC) {
        access |= vk::AccessFlags::UNIFORM_READ | vk::AccessFlags::SHADER_READ;
    }
    access
}

/// Create a host-visible buffer with bound memory
///
/// Used for DYNAMIC buffers, upload staging buffers and the stream ring.
pub(crate) fn create_host_buffer(
    ctx: &GpuContext,
    size: u64,
    usage: vk::BufferUsageFlags,
    name: &str,
) -> Result<(vk::Buffer, Allocation)> {
    create_buffer_with_memory(ctx, size, usage, MemoryLocation::CpuToGpu, name)
}

fn create_buffer_with_memory(
    ctx: &GpuContext,
    size: u64,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
    name: &str,
) -> Result<(vk::Buffer, Allocation)> {
    unsafe {
        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = ctx
            .device
            .create_buffer(&buffer_create_info, None)
            .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to create {} of size {} bytes: {:?}", name, size, e))?;

        match ctx.allocate_buffer_memory(buffer, name, location) {
            Ok(allocation) => Ok((buffer, allocation)),
            Err(e) => {
                ctx.device.destroy_buffer(buffer, None);
                Err(e)
            }
        }
    }
}

/// Copy `data` into a mapped allocation at byte `offset`
pub(crate) fn copy_to_allocation(allocation: &Allocation, offset: usize, data: &[u8]) -> Result<()> {
    let mapped_ptr = allocation
        .mapped_ptr()
        .ok_or_else(|| hal_err!("draw_hal::vulkan", "Buffer is not CPU-accessible"))?
        .as_ptr() as *mut u8;

    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset), data.len());
    }
    Ok(())
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;
