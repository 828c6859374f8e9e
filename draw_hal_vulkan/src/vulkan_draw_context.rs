/// VulkanDrawContext - Vulkan implementation of the DrawContext facade
///
/// The application owns the instance, device, swap chain and command
/// buffers. Each frame it hands a command buffer in the recording state and
/// the attachments to render to:
///
/// ```text
/// ctx.begin_frame(command_buffer, target)?;
/// ctx.begin(true, 0xFF000000, 1.0, 0)?;   // vkCmdBeginRendering
/// ctx.draw(...)?;
/// ctx.end()?;                              // vkCmdEndRendering
/// ctx.end_frame()?;
/// ```
///
/// The color attachment must be in COLOR_ATTACHMENT_OPTIMAL and the depth
/// attachment in DEPTH_STENCIL_ATTACHMENT_OPTIMAL while the frame records.
/// A frame slot is reused `frames_in_flight` frames later: the caller must
/// have waited for that earlier submission before calling `begin_frame`.

use std::sync::Arc;

use ash::vk;
use draw_hal::{
    check_user_draw, hal_err, hal_info, hal_warn, require_pipeline, BlendStateDesc, BlendStateRef,
    BufferRef, BufferUsage, ClearFlags, DepthStencilStateDesc, DepthStencilStateRef, DrawContext,
    DrawState, Error, InfoField, InputLayoutRef, PipelineDesc, PipelineRef, PresetFactory, Presets, Primitive,
    RasterStateDesc,
    RasterStateRef, RefCounted, Result, SamplerStateDesc, SamplerStateRef, ScissorRect, ShaderLanguage,
    ShaderModuleRef, ShaderStage, TextureRef, VertexFormatDesc, Viewport, MAX_BOUND_SLOTS,
};
use gpu_allocator::vulkan::Allocation;

use crate::vulkan_buffer::{copy_to_allocation, create_host_buffer, VulkanBuffer};
use crate::vulkan_context::{GpuContext, VulkanHandles};
use crate::vulkan_format::unpack_color;
use crate::vulkan_input_layout::VulkanInputLayout;
use crate::vulkan_pipeline::{has_stencil, TargetFormats, VariantInputs, VariantKey, VulkanPipeline, GRAPHICS_STAGES};
use crate::vulkan_shader::{BindingKind, NagaGlslCompiler, ShaderCompiler, VulkanShaderModule};
use crate::vulkan_state::{
    create_vk_sampler, VulkanBlendState, VulkanDepthStencilState, VulkanRasterState, VulkanSamplerState,
};
use crate::vulkan_texture::VulkanTexture;

/// Alignment of vertex data written to the stream ring
const STREAM_ALIGNMENT: usize = 16;

// ===== CONFIGURATION =====

/// Backend options fixed at construction
pub struct VulkanConfig {
    /// Format of the color attachments passed to `begin_frame`
    pub color_format: vk::Format,
    /// Format of the depth attachments, `None` to render without depth
    pub depth_format: Option<vk::Format>,
    /// Bytes of caller-memory vertices `draw_user` can stream per frame
    pub stream_buffer_size: usize,
    /// Draws with textures a frame can issue
    pub descriptor_sets_per_frame: u32,
    pub frames_in_flight: usize,
    pub compiler: Box<dyn ShaderCompiler>,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            color_format: vk::Format::B8G8R8A8_UNORM,
            depth_format: Some(vk::Format::D32_SFLOAT),
            stream_buffer_size: 4 * 1024 * 1024,
            descriptor_sets_per_frame: 1024,
            frames_in_flight: 2,
            compiler: Box::new(NagaGlslCompiler),
        }
    }
}

/// Attachments one frame renders to
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    pub color_view: vk::ImageView,
    pub depth_view: Option<vk::ImageView>,
    pub extent: vk::Extent2D,
}

// ===== FRAME RESOURCES =====

/// Per-frame descriptor pool and vertex stream ring
struct FrameResources {
    ctx: Arc<GpuContext>,
    descriptor_pool: vk::DescriptorPool,
    stream_buffer: vk::Buffer,
    stream_allocation: Option<Allocation>,
    stream_capacity: usize,
    stream_offset: usize,
}

impl FrameResources {
    fn new(ctx: Arc<GpuContext>, config: &VulkanConfig) -> Result<Self> {
        let sets = config.descriptor_sets_per_frame.max(1);
        let per_set = MAX_BOUND_SLOTS as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLED_IMAGE,
                descriptor_count: sets * per_set,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::SAMPLER,
                descriptor_count: sets * per_set,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: sets * per_set,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(sets)
            .pool_sizes(&pool_sizes);

        let descriptor_pool = unsafe {
            ctx.device
                .create_descriptor_pool(&pool_info, None)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to create descriptor pool: {:?}", e))?
        };

        let stream_capacity = config.stream_buffer_size.max(STREAM_ALIGNMENT);
        let (stream_buffer, stream_allocation) = match create_host_buffer(
            &ctx,
            stream_capacity as u64,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "vertex stream",
        ) {
            Ok(stream) => stream,
            Err(e) => {
                unsafe { ctx.device.destroy_descriptor_pool(descriptor_pool, None) };
                return Err(e);
            }
        };

        Ok(Self {
            ctx,
            descriptor_pool,
            stream_buffer,
            stream_allocation: Some(stream_allocation),
            stream_capacity,
            stream_offset: 0,
        })
    }

    fn reset(&mut self) -> Result<()> {
        self.stream_offset = 0;
        unsafe {
            self.ctx
                .device
                .reset_descriptor_pool(self.descriptor_pool, vk::DescriptorPoolResetFlags::empty())
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to reset descriptor pool: {:?}", e))
        }
    }

    fn check_fits(&self, size: usize) -> Result<()> {
        stream_slot(self.stream_offset, size, self.stream_capacity).map(|_| ())
    }

    /// Copy `data` into the ring, returning its byte offset
    fn stream(&mut self, data: &[u8]) -> Result<u64> {
        let offset = stream_slot(self.stream_offset, data.len(), self.stream_capacity)?;
        let allocation = self
            .stream_allocation
            .as_ref()
            .ok_or_else(|| hal_err!("draw_hal::vulkan", "Vertex stream has no GPU allocation"))?;
        copy_to_allocation(allocation, offset, data)?;
        self.stream_offset = offset + data.len();
        Ok(offset as u64)
    }
}

impl Drop for FrameResources {
    fn drop(&mut self) {
        unsafe {
            if let Some(allocation) = self.stream_allocation.take() {
                self.ctx.free_allocation(allocation);
            }
            self.ctx.device.destroy_buffer(self.stream_buffer, None);
            self.ctx.device.destroy_descriptor_pool(self.descriptor_pool, None);
        }
    }
}

/// Offset at which `size` bytes fit in the ring after `used` bytes
pub fn stream_slot(used: usize, size: usize, capacity: usize) -> Result<usize> {
    let offset = used.div_ceil(STREAM_ALIGNMENT) * STREAM_ALIGNMENT;
    if offset + size > capacity {
        return Err(Error::OutOfRange {
            offset,
            size,
            capacity,
        });
    }
    Ok(offset)
}

/// Shader and pipeline factories, usable before the context exists
struct VulkanFactory<'a> {
    ctx: &'a Arc<GpuContext>,
    config: &'a VulkanConfig,
}

impl PresetFactory for VulkanFactory<'_> {
    fn shader_language(&self) -> ShaderLanguage {
        ShaderLanguage::GlslVulkan
    }

    fn compile_shader_module(
        &self,
        stage: ShaderStage,
        language: ShaderLanguage,
        source: &str,
    ) -> Result<ShaderModuleRef> {
        if language != ShaderLanguage::GlslVulkan {
            return Err(Error::ShaderCompilationFailed(format!(
                "the Vulkan backend compiles GlslVulkan sources, got {:?}",
                language
            )));
        }
        let code = self.config.compiler.compile(stage, source)?;
        Ok(RefCounted::new(Box::new(VulkanShaderModule::new(self.ctx.clone(), stage, &code)?)))
    }

    fn create_pipeline(&self, desc: PipelineDesc) -> Result<PipelineRef> {
        let formats = TargetFormats {
            color: self.config.color_format,
            depth: self.config.depth_format,
        };
        Ok(RefCounted::new(Box::new(VulkanPipeline::new(self.ctx.clone(), &desc, formats)?)))
    }
}

/// Frame currently being recorded
struct Recording {
    command_buffer: vk::CommandBuffer,
    target: RenderTarget,
    frame: usize,
    /// Between `begin` and `end`
    rendering: bool,
}

// ===== DRAW CONTEXT =====

pub struct VulkanDrawContext {
    state: DrawState,
    ctx: Arc<GpuContext>,
    config: VulkanConfig,
    frames: Vec<FrameResources>,
    frame_count: u64,
    recording: Option<Recording>,
    /// Used for texture slots sampled without a sampler bound
    default_sampler: vk::Sampler,
}

impl VulkanDrawContext {
    /// Wrap externally created Vulkan objects and compile the presets
    ///
    /// The device must expose Vulkan 1.3 with `dynamicRendering` enabled.
    pub fn new(handles: VulkanHandles, config: VulkanConfig) -> Result<Self> {
        let ctx = Arc::new(GpuContext::new(&handles)?);

        let api_version = ctx.properties.api_version;
        if vk::api_version_major(api_version) == 1 && vk::api_version_minor(api_version) < 3 {
            return Err(Error::InitializationFailed(format!(
                "Vulkan 1.3 required, device reports {}",
                format_api_version(api_version)
            )));
        }

        let presets = Presets::create(&VulkanFactory {
            ctx: &ctx,
            config: &config,
        })?;
        let default_sampler = create_vk_sampler(&ctx, &SamplerStateDesc::default())?;

        let mut draw_ctx = Self {
            state: DrawState::new(presets, 0, 0),
            ctx: ctx.clone(),
            config,
            frames: Vec::new(),
            frame_count: 0,
            recording: None,
            default_sampler,
        };
        for _ in 0..draw_ctx.config.frames_in_flight.max(1) {
            let frame = FrameResources::new(ctx.clone(), &draw_ctx.config)?;
            draw_ctx.frames.push(frame);
        }

        hal_info!(
            "draw_hal::vulkan",
            "Vulkan draw context created on {} ({} frames in flight)",
            draw_ctx.device_name(),
            draw_ctx.frames.len()
        );
        Ok(draw_ctx)
    }

    /// Shared GPU context, for applications that create their own objects
    pub fn gpu_context(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Start recording into `command_buffer`, rendering to `target`
    pub fn begin_frame(&mut self, command_buffer: vk::CommandBuffer, target: RenderTarget) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::InvalidState("begin_frame called twice without end_frame".to_string()));
        }
        if self.config.depth_format.is_some() && target.depth_view.is_none() {
            return Err(Error::InvalidState(
                "context was configured with a depth format but the target has no depth view".to_string(),
            ));
        }

        let frame = (self.frame_count % self.frames.len() as u64) as usize;
        self.frames[frame].reset()?;
        self.frame_count += 1;

        self.set_target_size(target.extent.width, target.extent.height);
        self.recording = Some(Recording {
            command_buffer,
            target,
            frame,
            rendering: false,
        });
        Ok(())
    }

    /// Stop recording; ends the dynamic rendering pass if still open
    pub fn end_frame(&mut self) -> Result<()> {
        let recording = self
            .recording
            .take()
            .ok_or_else(|| Error::InvalidState("end_frame without begin_frame".to_string()))?;
        if recording.rendering {
            hal_warn!("draw_hal::vulkan", "end_frame inside begin/end, closing the rendering pass");
            unsafe { self.ctx.device.cmd_end_rendering(recording.command_buffer) };
        }
        Ok(())
    }

    fn factory(&self) -> VulkanFactory<'_> {
        VulkanFactory {
            ctx: &self.ctx,
            config: &self.config,
        }
    }

    fn device_name(&self) -> String {
        self.ctx
            .properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown device".to_string())
    }

    fn depth_format(&self) -> Option<vk::Format> {
        self.config.depth_format
    }

    /// Command buffer of the open rendering pass
    fn active_pass(&self) -> Result<(vk::CommandBuffer, RenderTarget, usize)> {
        match &self.recording {
            Some(r) if r.rendering => Ok((r.command_buffer, r.target, r.frame)),
            _ => Err(Error::InvalidState("drawing outside begin/end".to_string())),
        }
    }

    /// Bind everything a draw needs; returns the command buffer to draw into
    fn prepare_draw(&self, prim: Primitive, layout: &InputLayoutRef) -> Result<vk::CommandBuffer> {
        let pipeline_ref = require_pipeline(&self.state)?;
        let (command_buffer, target, frame) = self.active_pass()?;

        let layout_obj = layout
            .get()
            .ok_or_else(|| Error::InvalidResource(format!("input layout #{} was destroyed", layout.id())))?;
        let vulkan_layout = layout_obj
            .as_any()
            .downcast_ref::<VulkanInputLayout>()
            .ok_or_else(|| Error::InvalidResource("input layout was not created by Vulkan".to_string()))?;

        let pipeline_obj = pipeline_ref
            .get()
            .ok_or_else(|| Error::InvalidState("bound pipeline is in use".to_string()))?;
        let pipeline = pipeline_obj
            .as_any()
            .downcast_ref::<VulkanPipeline>()
            .ok_or_else(|| Error::InvalidResource("pipeline was not created by Vulkan".to_string()))?;

        let inputs = VariantInputs {
            key: VariantKey::new(
                self.bound_blend_desc(),
                self.bound_depth_desc(),
                self.bound_raster_desc(),
                layout.id(),
                prim,
            ),
            layout: vulkan_layout,
        };
        let vk_pipeline = pipeline.variant(&inputs)?;
        let descriptor_set = self.write_descriptor_set(pipeline, frame)?;

        let device = &self.ctx.device;
        unsafe {
            device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, vk_pipeline);

            let viewport = self
                .state
                .viewports
                .first()
                .map(viewport_to_vk)
                .unwrap_or_else(|| {
                    viewport_to_vk(&Viewport::from_size(target.extent.width as f32, target.extent.height as f32))
                });
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            device.cmd_set_scissor(command_buffer, 0, &[scissor_to_vk(self.state.scissor, target.extent)]);

            let push = pipeline.push_constants();
            if !push.is_empty() {
                device.cmd_push_constants(command_buffer, pipeline.layout, GRAPHICS_STAGES, 0, push);
            }

            if let Some(set) = descriptor_set {
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.layout,
                    0,
                    &[set],
                    &[],
                );
            }
        }
        Ok(command_buffer)
    }

    fn bound_blend_desc(&self) -> Option<BlendStateDesc> {
        self.state
            .bound_blend()
            .and_then(|s| s.get().and_then(|b| b.as_any().downcast_ref::<VulkanBlendState>().map(|v| v.desc)))
    }

    fn bound_depth_desc(&self) -> Option<DepthStencilStateDesc> {
        self.state.bound_depth_stencil().and_then(|s| {
            s.get()
                .and_then(|d| d.as_any().downcast_ref::<VulkanDepthStencilState>().map(|v| v.desc))
        })
    }

    fn bound_raster_desc(&self) -> Option<RasterStateDesc> {
        self.state
            .bound_raster()
            .and_then(|s| s.get().and_then(|r| r.as_any().downcast_ref::<VulkanRasterState>().map(|v| v.desc)))
    }

    /// Sampled view of the texture bound at `slot`
    fn slot_view(&self, slot: usize) -> Result<vk::ImageView> {
        let texture = self
            .state
            .bound_texture(slot)
            .ok_or_else(|| Error::InvalidState(format!("pipeline samples texture slot {} but nothing is bound", slot)))?;
        let texture = texture
            .get()
            .ok_or_else(|| Error::InvalidState(format!("texture in slot {} is in use", slot)))?;
        texture
            .as_any()
            .downcast_ref::<VulkanTexture>()
            .ok_or_else(|| Error::InvalidResource("texture was not created by Vulkan".to_string()))?
            .sampled_view()
            .ok_or_else(|| Error::InvalidState(format!("texture in slot {} was never finalized", slot)))
    }

    /// Sampler bound at `slot`, or the default one
    fn slot_sampler(&self, slot: usize) -> vk::Sampler {
        self.state
            .bound_sampler(slot)
            .and_then(|s| {
                s.get()
                    .and_then(|sampler| sampler.as_any().downcast_ref::<VulkanSamplerState>().map(|v| v.sampler))
            })
            .unwrap_or(self.default_sampler)
    }

    /// Allocate and fill the pipeline's descriptor set from the bound slots
    fn write_descriptor_set(&self, pipeline: &VulkanPipeline, frame: usize) -> Result<Option<vk::DescriptorSet>> {
        let Some(set_layout) = pipeline.set_layout() else {
            return Ok(None);
        };

        let mut image_infos = Vec::with_capacity(pipeline.bindings.len());
        for binding in &pipeline.bindings {
            let slot = binding.slot();
            let info = match binding.kind {
                BindingKind::SampledImage => vk::DescriptorImageInfo::default()
                    .image_view(self.slot_view(slot)?)
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
                BindingKind::Sampler => vk::DescriptorImageInfo::default().sampler(self.slot_sampler(slot)),
                BindingKind::CombinedImageSampler => vk::DescriptorImageInfo::default()
                    .image_view(self.slot_view(slot)?)
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .sampler(self.slot_sampler(slot)),
            };
            image_infos.push(info);
        }

        let set_layouts = [set_layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.frames[frame].descriptor_pool)
            .set_layouts(&set_layouts);
        let set = unsafe {
            self.ctx
                .device
                .allocate_descriptor_sets(&allocate_info)
                .map_err(|e| {
                    hal_err!(
                        "draw_hal::vulkan",
                        "Failed to allocate descriptor set ({} per frame): {:?}",
                        self.config.descriptor_sets_per_frame,
                        e
                    )
                })?[0]
        };

        let writes: Vec<vk::WriteDescriptorSet> = pipeline
            .bindings
            .iter()
            .zip(&image_infos)
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(binding.binding)
                    .descriptor_type(binding.kind.to_vk())
                    .image_info(std::slice::from_ref(info))
            })
            .collect();
        unsafe { self.ctx.device.update_descriptor_sets(&writes, &[]) };

        Ok(Some(set))
    }

    fn vulkan_buffer(buffer: &BufferRef, what: &str) -> Result<vk::Buffer> {
        let obj = buffer
            .get()
            .ok_or_else(|| Error::InvalidResource(format!("{} #{} was destroyed", what, buffer.id())))?;
        obj.as_any()
            .downcast_ref::<VulkanBuffer>()
            .map(|b| b.buffer)
            .ok_or_else(|| Error::InvalidResource(format!("{} was not created by Vulkan", what)))
    }
}

impl DrawContext for VulkanDrawContext {
    fn state(&self) -> &DrawState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DrawState {
        &mut self.state
    }

    // ===== FACTORIES =====

    fn create_depth_stencil_state(&self, desc: DepthStencilStateDesc) -> Result<DepthStencilStateRef> {
        Ok(RefCounted::new(Box::new(VulkanDepthStencilState { desc })))
    }

    fn create_blend_state(&self, desc: BlendStateDesc) -> Result<BlendStateRef> {
        if desc.logic_enabled && self.ctx.features.logic_op != vk::TRUE {
            return Err(hal_err!("draw_hal::vulkan", "Logic ops requested but the device lacks the logicOp feature"));
        }
        Ok(RefCounted::new(Box::new(VulkanBlendState { desc })))
    }

    fn create_sampler_state(&self, desc: SamplerStateDesc) -> Result<SamplerStateRef> {
        Ok(RefCounted::new(Box::new(VulkanSamplerState::new(self.ctx.clone(), desc)?)))
    }

    fn create_raster_state(&self, desc: RasterStateDesc) -> Result<RasterStateRef> {
        Ok(RefCounted::new(Box::new(VulkanRasterState { desc })))
    }

    fn create_buffer(&self, size: usize, usage: BufferUsage) -> Result<BufferRef> {
        Ok(RefCounted::new(Box::new(VulkanBuffer::new(self.ctx.clone(), size, usage)?)))
    }

    fn create_pipeline(&self, desc: PipelineDesc) -> Result<PipelineRef> {
        self.factory().create_pipeline(desc)
    }

    fn create_input_layout(
        &self,
        desc: VertexFormatDesc,
        vertex_shader: &ShaderModuleRef,
    ) -> Result<InputLayoutRef> {
        let stage = vertex_shader
            .get()
            .map(|module| module.stage())
            .ok_or_else(|| Error::InvalidResource(format!("vertex shader #{} was destroyed", vertex_shader.id())))?;
        if stage != ShaderStage::Vertex {
            return Err(Error::InvalidState(format!(
                "input layout needs a vertex shader, got a {:?} shader",
                stage
            )));
        }
        Ok(RefCounted::new(Box::new(VulkanInputLayout::new(&self.ctx, desc)?)))
    }

    fn create_texture(&self) -> TextureRef {
        RefCounted::new(Box::new(VulkanTexture::new(self.ctx.clone())))
    }

    fn compile_shader_module(
        &self,
        stage: ShaderStage,
        language: ShaderLanguage,
        source: &str,
    ) -> Result<ShaderModuleRef> {
        self.factory().compile_shader_module(stage, language, source)
    }

    // ===== RENDER PASS =====

    fn begin(&mut self, clear: bool, color: u32, depth: f32, stencil: i32) -> Result<()> {
        let depth_format = self.depth_format();
        let recording = self
            .recording
            .as_mut()
            .ok_or_else(|| Error::InvalidState("begin outside begin_frame/end_frame".to_string()))?;
        if recording.rendering {
            return Err(Error::InvalidState("begin called twice without end".to_string()));
        }

        let load_op = if clear {
            vk::AttachmentLoadOp::CLEAR
        } else {
            vk::AttachmentLoadOp::LOAD
        };
        let target = recording.target;

        let color_attachments = [vk::RenderingAttachmentInfo::default()
            .image_view(target.color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(load_op)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: unpack_color(color),
                },
            })];

        let depth_clear = vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth,
                stencil: stencil as u32,
            },
        };
        let depth_attachment = target.depth_view.map(|view| {
            vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .load_op(load_op)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(depth_clear)
        });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let (Some(format), Some(attachment)) = (depth_format, depth_attachment.as_ref()) {
            rendering_info = rendering_info.depth_attachment(attachment);
            if has_stencil(format) {
                rendering_info = rendering_info.stencil_attachment(attachment);
            }
        }

        unsafe {
            self.ctx
                .device
                .cmd_begin_rendering(recording.command_buffer, &rendering_info);
        }
        recording.rendering = true;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        match self.recording.as_mut() {
            Some(recording) if recording.rendering => {
                unsafe { self.ctx.device.cmd_end_rendering(recording.command_buffer) };
                recording.rendering = false;
                Ok(())
            }
            _ => Err(Error::InvalidState("end without begin".to_string())),
        }
    }

    fn clear(&mut self, mask: ClearFlags, color: u32, depth: f32, stencil: i32) -> Result<()> {
        let (command_buffer, target, _) = self.active_pass()?;

        let mut attachments = Vec::with_capacity(2);
        if mask.contains(ClearFlags::COLOR) {
            attachments.push(vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                color_attachment: 0,
                clear_value: vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: unpack_color(color),
                    },
                },
            });
        }
        if let (Some(format), Some(_)) = (self.depth_format(), target.depth_view) {
            let mut aspect = vk::ImageAspectFlags::empty();
            if mask.contains(ClearFlags::DEPTH) {
                aspect |= vk::ImageAspectFlags::DEPTH;
            }
            if mask.contains(ClearFlags::STENCIL) && has_stencil(format) {
                aspect |= vk::ImageAspectFlags::STENCIL;
            }
            if !aspect.is_empty() {
                attachments.push(vk::ClearAttachment {
                    aspect_mask: aspect,
                    color_attachment: 0,
                    clear_value: vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue {
                            depth,
                            stencil: stencil as u32,
                        },
                    },
                });
            }
        }
        if attachments.is_empty() {
            return Ok(());
        }

        let rect = vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            },
            base_array_layer: 0,
            layer_count: 1,
        };
        unsafe {
            self.ctx
                .device
                .cmd_clear_attachments(command_buffer, &attachments, &[rect]);
        }
        Ok(())
    }

    // ===== DRAWS =====

    fn draw(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vdata: &BufferRef,
        vertex_count: u32,
        offset: u32,
    ) -> Result<()> {
        let vertex_buffer = Self::vulkan_buffer(vdata, "vertex buffer")?;
        let command_buffer = self.prepare_draw(prim, layout)?;
        unsafe {
            let device = &self.ctx.device;
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer], &[0]);
            device.cmd_draw(command_buffer, vertex_count, 1, offset, 0);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vdata: &BufferRef,
        idata: &BufferRef,
        vertex_count: u32,
        offset: u32,
    ) -> Result<()> {
        let vertex_buffer = Self::vulkan_buffer(vdata, "vertex buffer")?;
        let index_buffer = Self::vulkan_buffer(idata, "index buffer")?;
        let command_buffer = self.prepare_draw(prim, layout)?;
        unsafe {
            let device = &self.ctx.device;
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer], &[0]);
            device.cmd_bind_index_buffer(command_buffer, index_buffer, 0, vk::IndexType::UINT16);
            device.cmd_draw_indexed(command_buffer, vertex_count, 1, offset, 0, 0);
        }
        Ok(())
    }

    fn draw_user(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vertex_bytes: &[u8],
        vertex_count: u32,
    ) -> Result<()> {
        check_user_draw(layout, vertex_bytes, vertex_count)?;
        let (_, _, frame) = self.active_pass()?;
        let stride = layout.get().map(|l| l.stride() as usize).unwrap_or(0);
        let data = &vertex_bytes[..stride * vertex_count as usize];

        // Overflow must fail before anything is recorded
        self.frames[frame].check_fits(data.len())?;
        let command_buffer = self.prepare_draw(prim, layout)?;
        let stream_offset = self.frames[frame].stream(data)?;
        unsafe {
            let device = &self.ctx.device;
            device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.frames[frame].stream_buffer],
                &[stream_offset],
            );
            device.cmd_draw(command_buffer, vertex_count, 1, 0, 0);
        }
        Ok(())
    }

    // ===== INTROSPECTION =====

    fn feature_list(&self) -> Vec<String> {
        let mut features = vec!["DYNAMIC_RENDERING".to_string()];
        if self.ctx.features.sampler_anisotropy == vk::TRUE {
            features.push("ANISOTROPY".to_string());
        }
        if self.ctx.features.logic_op == vk::TRUE {
            features.push("LOGIC_OP".to_string());
        }
        features
    }

    fn info_string(&self, field: InfoField) -> String {
        match field {
            InfoField::ApiName => "Vulkan".to_string(),
            InfoField::ApiVersion => format_api_version(self.ctx.properties.api_version),
            InfoField::VendorString | InfoField::Renderer => self.device_name(),
            InfoField::Vendor => vendor_name(self.ctx.properties.vendor_id),
            InfoField::ShadeLangVersion => "SPIR-V 1.3 (GLSL 450)".to_string(),
        }
    }

    fn shader_language(&self) -> ShaderLanguage {
        self.factory().shader_language()
    }
}

impl Drop for VulkanDrawContext {
    fn drop(&mut self) {
        unsafe {
            // Frames still queued may reference pipelines, streams and descriptor sets
            self.ctx.device.device_wait_idle().ok();
            self.ctx.device.destroy_sampler(self.default_sampler, None);
        }
    }
}

// ===== TRANSLATION HELPERS =====

/// Native viewport, field for field
pub fn viewport_to_vk(viewport: &Viewport) -> vk::Viewport {
    vk::Viewport {
        x: viewport.top_left_x,
        y: viewport.top_left_y,
        width: viewport.width,
        height: viewport.height,
        min_depth: viewport.min_depth,
        max_depth: viewport.max_depth,
    }
}

/// Native scissor: top-left origin like `ScissorRect`, clamped to the target
///
/// No scissor set means the whole target.
pub fn scissor_to_vk(scissor: Option<ScissorRect>, extent: vk::Extent2D) -> vk::Rect2D {
    let Some(rect) = scissor else {
        return vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
    };
    let (target_width, target_height) = (extent.width as i32, extent.height as i32);
    let left = rect.left.max(0).min(target_width);
    let top = rect.top.max(0).min(target_height);
    let right = rect.left.saturating_add(rect.width.max(0)).min(target_width).max(left);
    let bottom = rect.top.saturating_add(rect.height.max(0)).min(target_height).max(top);
    vk::Rect2D {
        offset: vk::Offset2D { x: left, y: top },
        extent: vk::Extent2D {
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        },
    }
}

pub fn format_api_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

/// Vendor name from a PCI vendor id
pub fn vendor_name(vendor_id: u32) -> String {
    match vendor_id {
        0x1002 => "AMD".to_string(),
        0x10DE => "NVIDIA".to_string(),
        0x8086 => "Intel".to_string(),
        0x13B5 => "ARM".to_string(),
        0x5143 => "Qualcomm".to_string(),
        0x1010 => "ImgTec".to_string(),
        other => format!("0x{:04X}", other),
    }
}

#[cfg(test)]
#[path = "vulkan_draw_context_tests.rs"]
mod tests;
