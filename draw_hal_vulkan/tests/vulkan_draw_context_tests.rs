//! GPU tests for VulkanDrawContext
//!
//! Every test creates a headless Vulkan 1.3 device and renders offscreen.
//! All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test -p draw_hal_vulkan --test vulkan_draw_context_tests -- --ignored

use draw_hal::glam::Mat4;
use draw_hal::{
    BlendStateDesc, BufferUsage, CullMode, DataFormat, DrawContext, Error, FinalizeFlags, InfoField, Pipeline,
    PipelineDesc, Primitive, RasterStateDesc, SamplerStateDesc, Semantic, ShaderLanguage, ShaderSetPreset,
    ShaderSources, ShaderStage, Texture, TextureDesc, TextureRegion, TextureType, VertexComponent,
    VertexFormatDesc, VertexShaderPreset,
};
use draw_hal_vulkan::ash::{self, vk};
use draw_hal_vulkan::{RenderTarget, VulkanConfig, VulkanDrawContext, VulkanHandles, VulkanPipeline};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;
const COLOR_FORMAT: vk::Format = vk::Format::B8G8R8A8_UNORM;
const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

// ============================================================================
// HEADLESS DEVICE
// ============================================================================

/// Instance + device owned by the test, destroyed after the context
struct TestGpu {
    _entry: ash::Entry,
    handles: VulkanHandles,
}

impl TestGpu {
    fn new() -> Self {
        let entry = unsafe { ash::Entry::load() }.expect("Vulkan loader not found");
        let app_info = vk::ApplicationInfo::default()
            .application_name(c"draw_hal_vulkan tests")
            .api_version(vk::API_VERSION_1_3);
        let instance_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&instance_info, None) }.unwrap();

        let (physical_device, queue_family_index) = unsafe { instance.enumerate_physical_devices() }
            .unwrap()
            .into_iter()
            .filter(|&pd| {
                let version = unsafe { instance.get_physical_device_properties(pd) }.api_version;
                vk::api_version_minor(version) >= 3
            })
            .find_map(|pd| {
                unsafe { instance.get_physical_device_queue_family_properties(pd) }
                    .iter()
                    .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    .map(|index| (pd, index as u32))
            })
            .expect("no Vulkan 1.3 device with a graphics queue");

        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities)];
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true);
        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .push_next(&mut features13);
        let device = unsafe { instance.create_device(physical_device, &device_info, None) }.unwrap();
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };

        Self {
            _entry: entry,
            handles: VulkanHandles {
                instance,
                physical_device,
                device,
                queue,
                queue_family_index,
            },
        }
    }

    fn context(&self) -> VulkanDrawContext {
        self.context_with(VulkanConfig::default())
    }

    /// Context rendering to the offscreen formats, other settings from `base`
    fn context_with(&self, base: VulkanConfig) -> VulkanDrawContext {
        let config = VulkanConfig {
            color_format: COLOR_FORMAT,
            depth_format: Some(DEPTH_FORMAT),
            ..base
        };
        VulkanDrawContext::new(self.handles.clone(), config).unwrap()
    }
}

impl Drop for TestGpu {
    fn drop(&mut self) {
        unsafe {
            self.handles.device.destroy_device(None);
            self.handles.instance.destroy_instance(None);
        }
    }
}

// ============================================================================
// OFFSCREEN TARGET
// ============================================================================

struct Attachment {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

/// Color + depth images and a command buffer to record frames into
struct Offscreen {
    device: ash::Device,
    color: Attachment,
    depth: Attachment,
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    readback: vk::Buffer,
    readback_allocation: Option<Allocation>,
}

impl Offscreen {
    fn new(ctx: &VulkanDrawContext, gpu: &TestGpu) -> Self {
        let device = gpu.handles.device.clone();
        let color = create_attachment(
            ctx,
            COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            vk::ImageAspectFlags::COLOR,
        );
        let depth = create_attachment(
            ctx,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        );

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(gpu.handles.queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }.unwrap();
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { device.allocate_command_buffers(&allocate_info) }.unwrap()[0];

        let buffer_info = vk::BufferCreateInfo::default()
            .size((WIDTH * HEIGHT * 4) as u64)
            .usage(vk::BufferUsageFlags::TRANSFER_DST);
        let readback = unsafe { device.create_buffer(&buffer_info, None) }.unwrap();
        let readback_allocation = ctx
            .gpu_context()
            .allocate_buffer_memory(readback, "readback", MemoryLocation::GpuToCpu)
            .unwrap();

        Self {
            device,
            color,
            depth,
            pool,
            command_buffer,
            readback,
            readback_allocation: Some(readback_allocation),
        }
    }

    fn target(&self) -> RenderTarget {
        RenderTarget {
            color_view: self.color.view,
            depth_view: Some(self.depth.view),
            extent: vk::Extent2D {
                width: WIDTH,
                height: HEIGHT,
            },
        }
    }

    /// Record one frame with `record`, submit it and return the color pixels (BGRA)
    fn render<F>(&self, ctx: &mut VulkanDrawContext, gpu: &TestGpu, record: F) -> Vec<u8>
    where
        F: FnOnce(&mut VulkanDrawContext),
    {
        let device = &self.device;
        let cmd = self.command_buffer;
        unsafe {
            device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty()).unwrap();
            device
                .begin_command_buffer(cmd, &vk::CommandBufferBeginInfo::default())
                .unwrap();
            barrier(
                device,
                cmd,
                self.color.image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            );
            barrier(
                device,
                cmd,
                self.depth.image,
                vk::ImageAspectFlags::DEPTH,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            );
        }

        ctx.begin_frame(cmd, self.target()).unwrap();
        record(ctx);
        ctx.end_frame().unwrap();

        unsafe {
            barrier(
                device,
                cmd,
                self.color.image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            );
            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_extent(vk::Extent3D {
                    width: WIDTH,
                    height: HEIGHT,
                    depth: 1,
                });
            device.cmd_copy_image_to_buffer(
                cmd,
                self.color.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                self.readback,
                &[region],
            );
            device.end_command_buffer(cmd).unwrap();

            let command_buffers = [cmd];
            let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device
                .queue_submit(gpu.handles.queue, &[submit], vk::Fence::null())
                .unwrap();
            device.queue_wait_idle(gpu.handles.queue).unwrap();
        }

        self.readback_allocation
            .as_ref()
            .and_then(|a| a.mapped_slice())
            .unwrap()
            .to_vec()
    }

    fn destroy(mut self, ctx: &VulkanDrawContext) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
            self.device.destroy_buffer(self.readback, None);
            for attachment in [&mut self.color, &mut self.depth] {
                self.device.destroy_image_view(attachment.view, None);
                self.device.destroy_image(attachment.image, None);
                if let Some(allocation) = attachment.allocation.take() {
                    ctx.gpu_context().free_allocation(allocation);
                }
            }
        }
        if let Some(allocation) = self.readback_allocation.take() {
            ctx.gpu_context().free_allocation(allocation);
        }
    }
}

fn create_attachment(
    ctx: &VulkanDrawContext,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
) -> Attachment {
    let device = &ctx.gpu_context().device;
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width: WIDTH,
            height: HEIGHT,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .initial_layout(vk::ImageLayout::UNDEFINED);
    let image = unsafe { device.create_image(&image_info, None) }.unwrap();
    let allocation = ctx.gpu_context().allocate_image_memory(image, "attachment").unwrap();
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    let view = unsafe { device.create_image_view(&view_info, None) }.unwrap();
    Attachment {
        image,
        view,
        allocation: Some(allocation),
    }
}

unsafe fn barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let i = ((y * WIDTH + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

/// Full-screen triangle: position (xyz f32) + color (rgba8)
fn fullscreen_triangle(color: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (x, y) in [(-1.0f32, -1.0f32), (3.0, -1.0), (-1.0, 3.0)] {
        for v in [x, y, 0.5f32] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        bytes.extend_from_slice(&color);
    }
    bytes
}

fn color_layout_desc() -> VertexFormatDesc {
    VertexFormatDesc {
        components: vec![
            VertexComponent::new("Position", Semantic::Position, DataFormat::R32G32B32_FLOAT, 0),
            VertexComponent::new("Color0", Semantic::Color0, DataFormat::R8G8B8A8_UNORM, 12),
        ],
        stride: 16,
    }
}

// ============================================================================
// CONSTRUCTION / INTROSPECTION
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_context_reports_its_api() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    assert_eq!(ctx.info_string(InfoField::ApiName), "Vulkan");
    assert!(ctx.info_string(InfoField::ApiVersion).starts_with("1."));
    assert!(!ctx.info_string(InfoField::Renderer).is_empty());
    assert_eq!(ctx.shader_language(), ShaderLanguage::GlslVulkan);
    assert!(ctx.feature_list().contains(&"DYNAMIC_RENDERING".to_string()));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_presets_are_compiled() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    let vs = ctx.vertex_shader_preset(VertexShaderPreset::Color2D);
    assert_eq!(vs.get().unwrap().stage(), ShaderStage::Vertex);
    let set = ctx.shader_set_preset(ShaderSetPreset::TextureColor2D);
    assert_eq!(set.get().unwrap().shaders().len(), 2);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_preset_pipelines_push_world_view_proj() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();
    let matrix = Mat4::from_translation(draw_hal::glam::Vec3::new(1.0, 2.0, 3.0));

    for preset in ShaderSetPreset::ALL {
        let set = ctx.shader_set_preset(preset);
        set.get_mut().unwrap().set_matrix4x4("WorldViewProj", &matrix);

        let pipeline = set.get().unwrap();
        let vulkan = pipeline.as_any().downcast_ref::<VulkanPipeline>().unwrap();
        assert_eq!(vulkan.uniform("WorldViewProj"), Some(matrix.to_cols_array().to_vec()), "{:?}", preset);

        let expected: Vec<u8> = matrix.to_cols_array().iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(&vulkan.push_constants()[..64], expected.as_slice(), "{:?}", preset);
    }
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_buffer_writes() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    let buffer = ctx.create_buffer(64, BufferUsage::VERTEX_DATA | BufferUsage::DYNAMIC).unwrap();
    buffer.get_mut().unwrap().write_full(&[7u8; 64]).unwrap();
    buffer.get_mut().unwrap().write_partial(&[1u8; 16], 48).unwrap();
    assert!(matches!(
        buffer.get_mut().unwrap().write_partial(&[1u8; 16], 56),
        Err(Error::OutOfRange { .. })
    ));
    assert!(buffer.release());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_texture_upload_with_mipmaps() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    let desc = TextureDesc::linear_2d(DataFormat::R8G8B8A8_UNORM, 16, 16).with_full_mip_chain();
    let texture = ctx.create_texture_with(desc).unwrap();
    {
        let mut t = texture.get_mut().unwrap();
        t.set_image_data(TextureRegion::full_level(&desc, 0), 16, &[200u8; 16 * 16 * 4]).unwrap();
        t.auto_gen_mipmaps().unwrap();
        t.finalize(FinalizeFlags::empty()).unwrap();
    }
    assert_eq!(texture.get().unwrap().mip_levels(), 5);
    assert!(texture.release());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_cube_texture() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    let desc = TextureDesc {
        texture_type: TextureType::Cube,
        ..TextureDesc::linear_2d(DataFormat::R8G8B8A8_UNORM, 8, 8)
    };
    let texture = ctx.create_texture_with(desc).unwrap();
    assert_eq!(texture.get().unwrap().depth(), 6);
    {
        let mut t = texture.get_mut().unwrap();
        t.set_image_data(TextureRegion::full_level(&desc, 0), 8, &[0u8; 8 * 8 * 4 * 6]).unwrap();
        t.finalize(FinalizeFlags::empty()).unwrap();
    }
    assert!(texture.release());
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_rejects_foreign_shader_language() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    let result = ctx.compile_shader_module(ShaderStage::Vertex, ShaderLanguage::Glsl410, "void main() {}");
    assert!(matches!(result, Err(Error::ShaderCompilationFailed(_))));

    let sources = ShaderSources {
        glsl: Some("void main() {}"),
        hlsl: None,
        vulkan: None,
    };
    assert!(matches!(
        ctx.create_shader_module(ShaderStage::Vertex, sources),
        Err(Error::MissingShaderSource(ShaderLanguage::GlslVulkan))
    ));
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_states_and_sampler() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    let sampler = ctx
        .create_sampler_state(SamplerStateDesc {
            max_aniso: 16.0,
            ..SamplerStateDesc::default()
        })
        .unwrap();
    assert!(sampler.release());

    let blend = ctx.create_blend_state(BlendStateDesc::alpha_blend()).unwrap();
    assert!(blend.release());
}

// ============================================================================
// RENDERING
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_vulkan_begin_clears_the_target() {
    let gpu = TestGpu::new();
    let mut ctx = gpu.context();
    let offscreen = Offscreen::new(&ctx, &gpu);

    // 0xAABBGGRR: opaque red
    let pixels = offscreen.render(&mut ctx, &gpu, |ctx| {
        ctx.begin(true, 0xFF0000FF, 1.0, 0).unwrap();
        ctx.end().unwrap();
    });
    assert_eq!(pixel(&pixels, 0, 0), [0, 0, 255, 255]);
    assert_eq!(pixel(&pixels, WIDTH - 1, HEIGHT - 1), [0, 0, 255, 255]);

    offscreen.destroy(&ctx);
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_draw_user_fullscreen_triangle() {
    let gpu = TestGpu::new();
    let mut ctx = gpu.context();
    let offscreen = Offscreen::new(&ctx, &gpu);

    let vs = ctx.vertex_shader_preset(VertexShaderPreset::Color2D);
    let layout = ctx.create_input_layout(color_layout_desc(), &vs).unwrap();
    let pipeline = ctx.shader_set_preset(ShaderSetPreset::Color2D);
    pipeline.get_mut().unwrap().set_matrix4x4("WorldViewProj", &Mat4::IDENTITY);
    let raster = ctx.create_raster_state(RasterStateDesc::default()).unwrap();
    let vertices = fullscreen_triangle([0, 255, 0, 255]);

    let pixels = offscreen.render(&mut ctx, &gpu, |ctx| {
        ctx.begin(true, 0xFF000000, 1.0, 0).unwrap();
        ctx.bind_pipeline(Some(&pipeline));
        ctx.set_raster_state(&raster);
        ctx.draw_user(Primitive::TriangleList, &layout, &vertices, 3).unwrap();
        ctx.end().unwrap();
    });
    // BGRA: green
    assert_eq!(pixel(&pixels, WIDTH / 2, HEIGHT / 2), [0, 255, 0, 255]);

    offscreen.destroy(&ctx);
    raster.release();
    layout.release();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_draw_user_overflow_records_nothing() {
    let gpu = TestGpu::new();
    // Room for one 48-byte triangle per frame
    let mut ctx = gpu.context_with(VulkanConfig {
        stream_buffer_size: 64,
        ..VulkanConfig::default()
    });
    let offscreen = Offscreen::new(&ctx, &gpu);

    let vs = ctx.vertex_shader_preset(VertexShaderPreset::Color2D);
    let layout = ctx.create_input_layout(color_layout_desc(), &vs).unwrap();
    let pipeline = ctx.shader_set_preset(ShaderSetPreset::Color2D);
    pipeline.get_mut().unwrap().set_matrix4x4("WorldViewProj", &Mat4::IDENTITY);
    let front = ctx
        .create_raster_state(RasterStateDesc {
            cull: CullMode::Front,
            ..RasterStateDesc::default()
        })
        .unwrap();
    let vertices = fullscreen_triangle([0, 255, 0, 255]);

    let pixels = offscreen.render(&mut ctx, &gpu, |ctx| {
        ctx.begin(true, 0xFF000000, 1.0, 0).unwrap();
        ctx.bind_pipeline(Some(&pipeline));
        ctx.draw_user(Primitive::TriangleList, &layout, &vertices, 3).unwrap();

        // A new state would bake a second variant if the draw got that far
        ctx.set_raster_state(&front);
        assert!(matches!(
            ctx.draw_user(Primitive::TriangleList, &layout, &vertices, 3),
            Err(Error::OutOfRange { .. })
        ));
        ctx.end().unwrap();
    });
    let baked = pipeline
        .get()
        .unwrap()
        .as_any()
        .downcast_ref::<VulkanPipeline>()
        .unwrap()
        .variant_count();
    assert_eq!(baked, 1);
    assert_eq!(pixel(&pixels, WIDTH / 2, HEIGHT / 2), [0, 255, 0, 255]);

    offscreen.destroy(&ctx);
    front.release();
    layout.release();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_recreated_equal_states_share_a_variant() {
    let gpu = TestGpu::new();
    let mut ctx = gpu.context();
    let offscreen = Offscreen::new(&ctx, &gpu);

    let vs = ctx.vertex_shader_preset(VertexShaderPreset::Color2D);
    let layout = ctx.create_input_layout(color_layout_desc(), &vs).unwrap();
    let pipeline = ctx.shader_set_preset(ShaderSetPreset::Color2D);
    pipeline.get_mut().unwrap().set_matrix4x4("WorldViewProj", &Mat4::IDENTITY);
    let vertices = fullscreen_triangle([0, 255, 0, 255]);

    offscreen.render(&mut ctx, &gpu, |ctx| {
        ctx.begin(true, 0xFF000000, 1.0, 0).unwrap();
        ctx.bind_pipeline(Some(&pipeline));
        for _ in 0..8 {
            let raster = ctx.create_raster_state(RasterStateDesc::default()).unwrap();
            let blend = ctx.create_blend_state(BlendStateDesc::alpha_blend()).unwrap();
            ctx.set_raster_state(&raster);
            ctx.set_blend_state(&blend);
            ctx.draw_user(Primitive::TriangleList, &layout, &vertices, 3).unwrap();
            raster.release();
            blend.release();
        }
        ctx.end().unwrap();
    });
    let baked = pipeline
        .get()
        .unwrap()
        .as_any()
        .downcast_ref::<VulkanPipeline>()
        .unwrap()
        .variant_count();
    assert_eq!(baked, 1);

    offscreen.destroy(&ctx);
    layout.release();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_draw_from_buffer_and_indices() {
    let gpu = TestGpu::new();
    let mut ctx = gpu.context();
    let offscreen = Offscreen::new(&ctx, &gpu);

    let vs = ctx.vertex_shader_preset(VertexShaderPreset::Color2D);
    let layout = ctx.create_input_layout(color_layout_desc(), &vs).unwrap();
    let pipeline = ctx.shader_set_preset(ShaderSetPreset::Color2D);
    pipeline.get_mut().unwrap().set_matrix4x4("WorldViewProj", &Mat4::IDENTITY);

    let vertices = fullscreen_triangle([0, 0, 255, 255]);
    let vdata = ctx.create_buffer(vertices.len(), BufferUsage::VERTEX_DATA).unwrap();
    vdata.get_mut().unwrap().write_full(&vertices).unwrap();
    let indices: Vec<u8> = [0u16, 1, 2].iter().flat_map(|i| i.to_ne_bytes()).collect();
    let idata = ctx.create_buffer(indices.len(), BufferUsage::INDEX_DATA).unwrap();
    idata.get_mut().unwrap().write_full(&indices).unwrap();

    let pixels = offscreen.render(&mut ctx, &gpu, |ctx| {
        ctx.begin(true, 0xFF000000, 1.0, 0).unwrap();
        ctx.bind_pipeline(Some(&pipeline));
        ctx.draw_indexed(Primitive::TriangleList, &layout, &vdata, &idata, 3, 0).unwrap();
        ctx.end().unwrap();
    });
    // BGRA: blue
    assert_eq!(pixel(&pixels, WIDTH / 2, HEIGHT / 2), [255, 0, 0, 255]);

    offscreen.destroy(&ctx);
    vdata.release();
    idata.release();
    layout.release();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_device_local_buffer_partial_writes_reach_the_draw() {
    let gpu = TestGpu::new();
    let mut ctx = gpu.context();
    let offscreen = Offscreen::new(&ctx, &gpu);

    let vs = ctx.vertex_shader_preset(VertexShaderPreset::Color2D);
    let layout = ctx.create_input_layout(color_layout_desc(), &vs).unwrap();
    let pipeline = ctx.shader_set_preset(ShaderSetPreset::Color2D);
    pipeline.get_mut().unwrap().set_matrix4x4("WorldViewProj", &Mat4::IDENTITY);

    // Not DYNAMIC: every write is a staged upload
    let vdata = ctx.create_buffer(48, BufferUsage::VERTEX_DATA).unwrap();
    vdata.get_mut().unwrap().write_full(&fullscreen_triangle([255, 0, 0, 255])).unwrap();
    for vertex in 0..3 {
        vdata.get_mut().unwrap().write_partial(&[0, 255, 0, 255], vertex * 16 + 12).unwrap();
    }
    assert!(matches!(
        vdata.get_mut().unwrap().write_partial(&[0u8; 16], 40),
        Err(Error::OutOfRange { .. })
    ));

    let pixels = offscreen.render(&mut ctx, &gpu, |ctx| {
        ctx.begin(true, 0xFF000000, 1.0, 0).unwrap();
        ctx.bind_pipeline(Some(&pipeline));
        ctx.draw(Primitive::TriangleList, &layout, &vdata, 3, 0).unwrap();
        ctx.end().unwrap();
    });
    // BGRA: green, the red from the full write was overwritten
    assert_eq!(pixel(&pixels, WIDTH / 2, HEIGHT / 2), [0, 255, 0, 255]);

    offscreen.destroy(&ctx);
    vdata.release();
    layout.release();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_textured_draw_needs_a_finalized_texture() {
    let gpu = TestGpu::new();
    let mut ctx = gpu.context();
    let offscreen = Offscreen::new(&ctx, &gpu);

    let vs = ctx.vertex_shader_preset(VertexShaderPreset::TextureColor2D);
    let layout = ctx
        .create_input_layout(
            VertexFormatDesc {
                components: vec![
                    VertexComponent::new("Position", Semantic::Position, DataFormat::R32G32B32_FLOAT, 0),
                    VertexComponent::new("Color0", Semantic::Color0, DataFormat::R8G8B8A8_UNORM, 12),
                    VertexComponent::new("TexCoord0", Semantic::TexCoord0, DataFormat::R32G32_FLOAT, 16),
                ],
                stride: 24,
            },
            &vs,
        )
        .unwrap();
    let pipeline = ctx.shader_set_preset(ShaderSetPreset::TextureColor2D);
    let desc = TextureDesc::linear_2d(DataFormat::R8G8B8A8_UNORM, 4, 4);
    let texture = ctx.create_texture_with(desc).unwrap();
    let vertices = vec![0u8; 24 * 3];

    offscreen.render(&mut ctx, &gpu, |ctx| {
        ctx.begin(true, 0xFF000000, 1.0, 0).unwrap();
        ctx.bind_pipeline(Some(&pipeline));

        // unbound slot 0
        let result = ctx.draw_user(Primitive::TriangleList, &layout, &vertices, 3);
        assert!(matches!(result, Err(Error::InvalidState(_))));

        // bound but never finalized
        ctx.bind_texture(0, Some(&texture));
        let result = ctx.draw_user(Primitive::TriangleList, &layout, &vertices, 3);
        assert!(matches!(result, Err(Error::InvalidState(_))));

        texture.get_mut().unwrap().finalize(FinalizeFlags::empty()).unwrap();
        ctx.draw_user(Primitive::TriangleList, &layout, &vertices, 3).unwrap();
        ctx.end().unwrap();
    });

    offscreen.destroy(&ctx);
    texture.release();
    layout.release();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_draw_outside_pass_is_invalid_state() {
    let gpu = TestGpu::new();
    let mut ctx = gpu.context();

    let pipeline = ctx.shader_set_preset(ShaderSetPreset::Color2D);
    let vs = ctx.vertex_shader_preset(VertexShaderPreset::Color2D);
    let layout = ctx.create_input_layout(color_layout_desc(), &vs).unwrap();
    ctx.bind_pipeline(Some(&pipeline));

    let result = ctx.draw_user(Primitive::TriangleList, &layout, &fullscreen_triangle([0; 4]), 3);
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert!(matches!(ctx.end_frame(), Err(Error::InvalidState(_))));
    layout.release();
}

#[test]
#[ignore] // Requires GPU
fn test_vulkan_pipeline_from_custom_shaders() {
    let gpu = TestGpu::new();
    let ctx = gpu.context();

    let vs = ctx
        .compile_shader_module(
            ShaderStage::Vertex,
            ShaderLanguage::GlslVulkan,
            r#"#version 450
layout(location = 0) in vec3 Position;
layout(push_constant) uniform Uniforms { mat4 WorldViewProj; vec4 Tint; } u;
layout(location = 0) out vec4 oColor0;
void main() {
    oColor0 = u.Tint;
    gl_Position = u.WorldViewProj * vec4(Position, 1.0);
}
"#,
        )
        .unwrap();
    let fs = ctx.fragment_shader_preset(draw_hal::FragmentShaderPreset::Color2D);
    let pipeline = ctx
        .create_pipeline(PipelineDesc {
            shaders: vec![vs.clone(), fs],
        })
        .unwrap();
    pipeline.get_mut().unwrap().set_vector("Tint", &[1.0, 0.5, 0.25, 1.0]);
    pipeline.get_mut().unwrap().set_vector("Unknown", &[1.0]);

    assert!(pipeline.release());
    assert!(vs.release());
}
