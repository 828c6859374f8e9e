/// VulkanTexture - Vulkan implementation of the Texture trait
///
/// Images live in device-local memory. `set_image_data` only stages the
/// pixels; `finalize` records every pending copy (plus the optional blit mip
/// chain) into a one-shot command buffer and waits for it, leaving the whole
/// image in SHADER_READ_ONLY_OPTIMAL.

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use draw_hal::{
    check_image_upload, hal_debug, hal_err, level_extent, upload_size, Error, FinalizeFlags, Result, Texture,
    TextureDesc, TextureInfo, TextureRegion, TextureType,
};
use gpu_allocator::vulkan::Allocation;

use crate::vulkan_buffer::{copy_to_allocation, create_host_buffer};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{aspect_mask, data_format_to_vk, texture_type_to_vk};

/// Native image, view and memory of a created texture
struct GpuImage {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    aspect: vk::ImageAspectFlags,
    layers: u32,
}

/// Staged pixels waiting for `finalize`
struct PendingUpload {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    copy: vk::BufferImageCopy,
}

/// Vulkan texture implementation
pub struct VulkanTexture {
    ctx: Arc<GpuContext>,
    info: TextureInfo,
    image: Option<GpuImage>,
    pending: Vec<PendingUpload>,
    /// Set by `auto_gen_mipmaps`, consumed by the next `finalize`
    generate_mips: bool,
    /// Image is in SHADER_READ_ONLY_OPTIMAL
    ready: bool,
}

impl VulkanTexture {
    /// Uncreated texture
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self {
            ctx,
            info: TextureInfo::default(),
            image: None,
            pending: Vec::new(),
            generate_mips: false,
            ready: false,
        }
    }

    /// View to sample from, once the texture has been finalized
    pub(crate) fn sampled_view(&self) -> Option<vk::ImageView> {
        match &self.image {
            Some(image) if self.ready => Some(image.view),
            _ => None,
        }
    }

    fn unsupported(&mut self, desc: &TextureDesc) -> Error {
        self.info = TextureInfo::default();
        Error::UnsupportedFormat {
            texture_type: desc.texture_type,
            format: desc.format,
        }
    }

    fn destroy_image(&mut self) {
        self.discard_pending();
        if let Some(mut image) = self.image.take() {
            unsafe {
                self.ctx.device.destroy_image_view(image.view, None);
                if let Some(allocation) = image.allocation.take() {
                    self.ctx.free_allocation(allocation);
                }
                self.ctx.device.destroy_image(image.image, None);
            }
        }
        self.ready = false;
        self.generate_mips = false;
    }

    fn discard_pending(&mut self) {
        for mut upload in self.pending.drain(..) {
            unsafe {
                self.ctx.device.destroy_buffer(upload.buffer, None);
            }
            if let Some(allocation) = upload.allocation.take() {
                self.ctx.free_allocation(allocation);
            }
        }
    }

    fn create_image(&self, desc: &TextureDesc, format: vk::Format, mip_levels: u32) -> Result<GpuImage> {
        let (image_type, view_type, layers) = texture_type_to_vk(desc.texture_type, desc.depth)
            .ok_or(Error::UnsupportedFormat {
                texture_type: desc.texture_type,
                format: desc.format,
            })?;

        let extent = vk::Extent3D {
            width: desc.width,
            height: if image_type == vk::ImageType::TYPE_1D { 1 } else { desc.height.max(1) },
            depth: if image_type == vk::ImageType::TYPE_3D { desc.depth.max(1) } else { 1 },
        };
        let flags = if desc.texture_type == TextureType::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };
        let aspect = aspect_mask(desc.format);

        unsafe {
            let image_create_info = vk::ImageCreateInfo::default()
                .flags(flags)
                .image_type(image_type)
                .format(format)
                .extent(extent)
                .mip_levels(mip_levels)
                .array_layers(layers)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(
                    vk::ImageUsageFlags::SAMPLED
                        | vk::ImageUsageFlags::TRANSFER_DST
                        | vk::ImageUsageFlags::TRANSFER_SRC,
                )
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let image = self
                .ctx
                .device
                .create_image(&image_create_info, None)
                .map_err(|e| {
                    hal_err!(
                        "draw_hal::vulkan",
                        "Failed to create image {}x{} ({:?}): {:?}",
                        desc.width, desc.height, desc.format, e
                    )
                })?;

            let allocation = match self.ctx.allocate_image_memory(image, "texture") {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let view_create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(view_type)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    base_mip_level: 0,
                    level_count: mip_levels,
                    base_array_layer: 0,
                    layer_count: layers,
                });

            let view = match self.ctx.device.create_image_view(&view_create_info, None) {
                Ok(view) => view,
                Err(e) => {
                    self.ctx.free_allocation(allocation);
                    self.ctx.device.destroy_image(image, None);
                    return Err(hal_err!("draw_hal::vulkan", "Failed to create image view: {:?}", e));
                }
            };

            Ok(GpuImage {
                image,
                view,
                allocation: Some(allocation),
                aspect,
                layers,
            })
        }
    }

    /// Copy command for `region`, relative to a staging buffer holding only that region
    fn copy_for_region(&self, image: &GpuImage, region: &TextureRegion, row_stride: u32) -> vk::BufferImageCopy {
        let layered = matches!(
            self.info.texture_type,
            TextureType::Cube | TextureType::Array1D | TextureType::Array2D
        );
        let (base_array_layer, layer_count, z, depth) = if layered {
            (region.z, region.depth.max(1), 0, 1)
        } else {
            (0, 1, region.z, region.depth.max(1))
        };
        let buffer_row_length = if !self.info.format.is_block_compressed() && row_stride > region.width {
            row_stride
        } else {
            0
        };

        vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(buffer_row_length)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: image.aspect,
                mip_level: region.level,
                base_array_layer,
                layer_count,
            })
            .image_offset(vk::Offset3D {
                x: region.x as i32,
                y: region.y as i32,
                z: z as i32,
            })
            .image_extent(vk::Extent3D {
                width: region.width,
                height: region.height.max(1),
                depth,
            })
    }
}

impl Texture for VulkanTexture {
    fn create(&mut self, desc: &TextureDesc) -> Result<()> {
        self.destroy_image();
        self.info = TextureInfo::default();

        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidState(format!(
                "texture size {}x{} is empty",
                desc.width, desc.height
            )));
        }

        let Some(format) = data_format_to_vk(desc.format) else {
            return Err(self.unsupported(desc));
        };
        let required = vk::FormatFeatureFlags::SAMPLED_IMAGE | vk::FormatFeatureFlags::TRANSFER_DST;
        if !self.ctx.format_features(format).contains(required) {
            hal_debug!("draw_hal::vulkan", "Format {:?} cannot be sampled on this device", desc.format);
            return Err(self.unsupported(desc));
        }
        if texture_type_to_vk(desc.texture_type, desc.depth).is_none() {
            return Err(self.unsupported(desc));
        }

        let mut info = TextureInfo::from_desc(desc);
        let full_chain = TextureDesc { mip_levels: 0, ..*desc }.with_full_mip_chain().mip_levels;
        info.mip_levels = info.mip_levels.min(full_chain);
        match desc.texture_type {
            TextureType::Cube => info.depth = 6,
            TextureType::Linear1D | TextureType::Array1D => info.height = 1,
            _ => {}
        }

        let image = self.create_image(desc, format, info.mip_levels)?;
        hal_debug!(
            "draw_hal::vulkan",
            "Texture created: {:?} {:?} {}x{}x{} ({} levels, {} layers)",
            desc.texture_type, desc.format, info.width, info.height, info.depth, info.mip_levels, image.layers
        );
        self.image = Some(image);
        self.info = info;
        Ok(())
    }

    fn set_image_data(&mut self, region: TextureRegion, row_stride: u32, data: &[u8]) -> Result<()> {
        check_image_upload(&self.info, &region, row_stride, data.len())?;
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| Error::InvalidState("set_image_data on an uncreated texture".to_string()))?;

        let size = upload_size(self.info.format, &region, row_stride);
        let copy = self.copy_for_region(image, &region, row_stride);

        let (buffer, allocation) = create_host_buffer(
            &self.ctx,
            size.max(1) as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            "texture staging buffer",
        )?;
        let mut upload = PendingUpload {
            buffer,
            allocation: Some(allocation),
            copy,
        };

        let copied = match &upload.allocation {
            Some(allocation) => copy_to_allocation(allocation, 0, &data[..size]),
            None => Ok(()),
        };
        if let Err(e) = copied {
            unsafe {
                self.ctx.device.destroy_buffer(upload.buffer, None);
            }
            if let Some(allocation) = upload.allocation.take() {
                self.ctx.free_allocation(allocation);
            }
            return Err(e);
        }

        self.pending.push(upload);
        Ok(())
    }

    fn auto_gen_mipmaps(&mut self) -> Result<()> {
        if self.image.is_none() {
            return Err(Error::InvalidState("auto_gen_mipmaps on an uncreated texture".to_string()));
        }
        self.generate_mips = true;
        Ok(())
    }

    fn finalize(&mut self, flags: FinalizeFlags) -> Result<()> {
        let Some(image) = &self.image else {
            return Err(Error::InvalidState("finalize on an uncreated texture".to_string()));
        };

        let generate =
            (flags.contains(FinalizeFlags::GENERATE_MIPS) || self.generate_mips) && self.info.mip_levels > 1;
        if generate {
            let format = data_format_to_vk(self.info.format).unwrap_or(vk::Format::UNDEFINED);
            let required = vk::FormatFeatureFlags::BLIT_SRC
                | vk::FormatFeatureFlags::BLIT_DST
                | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
            if !self.ctx.format_features(format).contains(required) {
                return Err(Error::UnsupportedFormat {
                    texture_type: self.info.texture_type,
                    format: self.info.format,
                });
            }
        }

        if self.pending.is_empty() && !generate && self.ready {
            return Ok(());
        }

        let plan = UploadPlan {
            image: image.image,
            aspect: image.aspect,
            layers: image.layers,
            info: &self.info,
            was_ready: self.ready,
            generate,
        };
        let copies: Vec<(vk::Buffer, vk::BufferImageCopy)> =
            self.pending.iter().map(|u| (u.buffer, u.copy)).collect();
        let device = &self.ctx.device;
        let result = self
            .ctx
            .submit_one_shot(|cmd| unsafe { plan.record(device, cmd, &copies) });

        self.discard_pending();
        self.generate_mips = false;
        if result.is_ok() {
            self.ready = true;
        }
        result
    }

    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn set_filename(&mut self, filename: String) {
        self.info.filename = Some(filename);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        self.destroy_image();
    }
}

// ===== UPLOAD RECORDING =====

/// Everything `finalize` records into the one-shot command buffer
struct UploadPlan<'a> {
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    layers: u32,
    info: &'a TextureInfo,
    was_ready: bool,
    generate: bool,
}

impl UploadPlan<'_> {
    unsafe fn record(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        copies: &[(vk::Buffer, vk::BufferImageCopy)],
    ) -> Result<()> {
        let mip_levels = self.info.mip_levels;

        // Keep previous contents when the image was already initialized
        let (old_layout, src_access, src_stage) = if self.was_ready {
            (
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            )
        } else {
            (vk::ImageLayout::UNDEFINED, vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE)
        };

        unsafe {
            self.barrier(
                device,
                cmd,
                (0, mip_levels),
                (old_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
                (src_access, vk::AccessFlags::TRANSFER_WRITE),
                (src_stage, vk::PipelineStageFlags::TRANSFER),
            );

            for (buffer, copy) in copies {
                device.cmd_copy_buffer_to_image(
                    cmd,
                    *buffer,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(copy),
                );
            }

            if self.generate {
                self.record_mip_chain(device, cmd);
            } else {
                self.barrier(
                    device,
                    cmd,
                    (0, mip_levels),
                    (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                    (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ),
                    (vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER),
                );
            }
        }
        Ok(())
    }

    /// Blit every level from the previous one, leaving all levels shader-readable
    unsafe fn record_mip_chain(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        let info = self.info;
        let extent = |level: u32| {
            let (w, h, d) = level_extent(info.texture_type, info.width, info.height, info.depth, level);
            let d = if info.texture_type == TextureType::Linear3D { d } else { 1 };
            vk::Offset3D {
                x: w as i32,
                y: h as i32,
                z: d as i32,
            }
        };

        for level in 1..info.mip_levels {
            let src = level - 1;

            // Source level: TRANSFER_DST -> TRANSFER_SRC
            unsafe {
                self.barrier(
                    device,
                    cmd,
                    (src, 1),
                    (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
                    (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_READ),
                    (vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER),
                );
            }

            let subresource = |mip_level: u32| vk::ImageSubresourceLayers {
                aspect_mask: self.aspect,
                mip_level,
                base_array_layer: 0,
                layer_count: self.layers,
            };
            let blit = vk::ImageBlit::default()
                .src_subresource(subresource(src))
                .src_offsets([vk::Offset3D::default(), extent(src)])
                .dst_subresource(subresource(level))
                .dst_offsets([vk::Offset3D::default(), extent(level)]);

            unsafe {
                device.cmd_blit_image(
                    cmd,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit],
                    vk::Filter::LINEAR,
                );

                // Source level done: TRANSFER_SRC -> SHADER_READ_ONLY
                self.barrier(
                    device,
                    cmd,
                    (src, 1),
                    (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                    (vk::AccessFlags::TRANSFER_READ, vk::AccessFlags::SHADER_READ),
                    (vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER),
                );
            }
        }

        // Last level was only ever written
        unsafe {
            self.barrier(
                device,
                cmd,
                (info.mip_levels - 1, 1),
                (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                (vk::AccessFlags::TRANSFER_WRITE, vk::AccessFlags::SHADER_READ),
                (vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER),
            );
        }
    }

    unsafe fn barrier(
        &self,
        device: &ash::Device,
        cmd: vk::CommandBuffer,
        (base_mip_level, level_count): (u32, u32),
        (old_layout, new_layout): (vk::ImageLayout, vk::ImageLayout),
        (src_access, dst_access): (vk::AccessFlags, vk::AccessFlags),
        (src_stage, dst_stage): (vk::PipelineStageFlags, vk::PipelineStageFlags),
    ) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect,
                base_mip_level,
                level_count,
                base_array_layer: 0,
                layer_count: self.layers,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}
