/// GpuContext - Shared GPU resources for all Vulkan objects
///
/// Contains everything needed for GPU operations:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Queue for command submission
/// - Command pool + fence for one-shot upload operations
/// - Physical device capabilities queried once at startup

use ash::vk;
use draw_hal::{hal_err, hal_error, Error, Result};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

/// Vulkan objects created by the application and handed to the backend
///
/// The backend never destroys them: the instance and device must outlive
/// the `VulkanDrawContext` and every resource it created.
#[derive(Clone)]
pub struct VulkanHandles {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    /// Logical device, created with the `dynamicRendering` feature enabled
    pub device: ash::Device,
    /// Queue used for uploads and for the frames recorded by the caller
    pub queue: vk::Queue,
    pub queue_family_index: u32,
}

/// Shared GPU context for all Vulkan resources.
///
/// This struct is shared (via `Arc`) by all GPU resources (textures, buffers, etc.)
/// to avoid duplicating device/allocator/queue references in each resource.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// Vulkan instance (format and feature queries)
    pub instance: ash::Instance,

    pub physical_device: vk::PhysicalDevice,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop to free its memory blocks before the upload pool goes away
    pub allocator: ManuallyDrop<Mutex<Allocator>>,

    /// Graphics queue for command submission
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Reusable command pool for one-shot upload operations
    /// (created with TRANSIENT + RESET_COMMAND_BUFFER flags)
    pub upload_command_pool: Mutex<vk::CommandPool>,

    /// Signaled when a one-shot upload completes
    upload_fence: vk::Fence,

    pub properties: vk::PhysicalDeviceProperties,

    pub features: vk::PhysicalDeviceFeatures,
}

impl GpuContext {
    /// Wrap externally created handles and build the allocator and upload objects
    pub fn new(handles: &VulkanHandles) -> Result<Self> {
        let VulkanHandles {
            instance,
            physical_device,
            device,
            queue,
            queue_family_index,
        } = handles;

        unsafe {
            let properties = instance.get_physical_device_properties(*physical_device);
            let features = instance.get_physical_device_features(*physical_device);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: *physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                hal_error!("draw_hal::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let upload_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(*queue_family_index)
                .flags(
                    vk::CommandPoolCreateFlags::TRANSIENT
                        | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                );

            let upload_command_pool = device
                .create_command_pool(&upload_pool_create_info, None)
                .map_err(|e| {
                    hal_error!("draw_hal::vulkan", "Failed to create upload command pool: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create upload command pool: {:?}", e))
                })?;

            let upload_fence = match device.create_fence(&vk::FenceCreateInfo::default(), None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.destroy_command_pool(upload_command_pool, None);
                    hal_error!("draw_hal::vulkan", "Failed to create upload fence: {:?}", e);
                    return Err(Error::InitializationFailed(format!(
                        "Failed to create upload fence: {:?}",
                        e
                    )));
                }
            };

            Ok(Self {
                device: device.clone(),
                instance: instance.clone(),
                physical_device: *physical_device,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                graphics_queue: *queue,
                graphics_queue_family: *queue_family_index,
                upload_command_pool: Mutex::new(upload_command_pool),
                upload_fence,
                properties,
                features,
            })
        }
    }

    /// Allocate and bind memory for `buffer`
    ///
    /// Allocation failures are reported as `Error::OutOfMemory`.
    pub fn allocate_buffer_memory(
        &self,
        buffer: vk::Buffer,
        name: &str,
        location: MemoryLocation,
    ) -> Result<Allocation> {
        unsafe {
            let requirements = self.device.get_buffer_memory_requirements(buffer);
            let allocation = self.allocate(name, requirements, location, true)?;

            if let Err(e) = self
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                self.free_allocation(allocation);
                return Err(hal_err!("draw_hal::vulkan", "Failed to bind memory of {}: {:?}", name, e));
            }
            Ok(allocation)
        }
    }

    /// Allocate and bind device-local memory for `image`
    pub fn allocate_image_memory(&self, image: vk::Image, name: &str) -> Result<Allocation> {
        unsafe {
            let requirements = self.device.get_image_memory_requirements(image);
            let allocation = self.allocate(name, requirements, MemoryLocation::GpuOnly, false)?;

            if let Err(e) = self
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                self.free_allocation(allocation);
                return Err(hal_err!("draw_hal::vulkan", "Failed to bind memory of {}: {:?}", name, e));
            }
            Ok(allocation)
        }
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| hal_err!("draw_hal::vulkan", "GPU allocator lock poisoned"))?;

        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                hal_error!("draw_hal::vulkan", "Out of GPU memory for {} (required: {:.2} MB)", name, size_mb);
                Error::OutOfMemory
            })
    }

    /// Return an allocation to the allocator
    ///
    /// Never fails: a poisoned lock leaks the allocation instead.
    pub fn free_allocation(&self, allocation: Allocation) {
        if let Ok(mut allocator) = self.allocator.lock() {
            allocator.free(allocation).ok();
        }
    }

    /// Record commands with `record`, submit them and wait for completion
    pub fn submit_one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let pool = self
            .upload_command_pool
            .lock()
            .map_err(|_| hal_err!("draw_hal::vulkan", "Upload command pool lock poisoned"))?;

        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.record_and_wait(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn record_and_wait<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

            record(command_buffer)?;

            self.device
                .end_command_buffer(command_buffer)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to end upload command buffer: {:?}", e))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

            self.device
                .queue_submit(self.graphics_queue, &[submit_info], self.upload_fence)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to submit upload commands to GPU: {:?}", e))?;

            let waited = self
                .device
                .wait_for_fences(&[self.upload_fence], true, u64::MAX)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to wait for upload completion: {:?}", e));

            self.device
                .reset_fences(&[self.upload_fence])
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to reset upload fence: {:?}", e))?;

            waited
        }
    }

    /// Optimal-tiling features the device supports for `format`
    pub fn format_features(&self, format: vk::Format) -> vk::FormatFeatureFlags {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
                .optimal_tiling_features
        }
    }

    /// Vertex-buffer features the device supports for `format`
    pub fn buffer_format_features(&self, format: vk::Format) -> vk::FormatFeatureFlags {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
                .buffer_features
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        // NOTE: device and instance belong to the application and are not destroyed here.
        unsafe {
            // Free VkDeviceMemory blocks while the device is still alive
            ManuallyDrop::drop(&mut self.allocator);

            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
                *pool = vk::CommandPool::null();
            }
            self.device.destroy_fence(self.upload_fence, None);
        }
    }
}
