/// Vulkan pipeline: shader set, pipeline layout and a cache of baked variants
///
/// Blend, depth and raster states are bound separately from the pipeline, so
/// the VkPipeline objects are created lazily at draw time, one per
/// combination actually used.

use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

use ash::vk;
use draw_hal::glam::Mat4;
use draw_hal::{
    hal_debug, hal_err, validate_pipeline_stages, BlendStateDesc, DepthStencilStateDesc, Error, Pipeline,
    PipelineDesc, PipelineShaders, Primitive, RasterStateDesc, Result, ShaderModuleRef, ShaderStage,
    UniformBlock,
};
use rustc_hash::FxHashMap;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    blend_factor_to_vk, blend_op_to_vk, compare_op_to_vk, cull_mode_to_vk, front_face_to_vk,
    logic_op_to_vk, shader_stage_to_vk, topology_to_vk,
};
use crate::vulkan_input_layout::VulkanInputLayout;
use crate::vulkan_shader::{Reflection, ShaderBinding, VulkanShaderModule};

/// Stages that see the push-constant block and the descriptor set
pub(crate) const GRAPHICS_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::ALL_GRAPHICS;

/// Identity of one baked variant
///
/// States are keyed by descriptor value, so recreating a state object with
/// the same settings reuses the variant. Unbound states key as their default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VariantKey {
    pub blend: BlendStateDesc,
    pub depth_stencil: DepthStencilStateDesc,
    pub raster: RasterStateDesc,
    pub layout: u64,
    pub primitive: Primitive,
}

impl VariantKey {
    pub(crate) fn new(
        blend: Option<BlendStateDesc>,
        depth_stencil: Option<DepthStencilStateDesc>,
        raster: Option<RasterStateDesc>,
        layout: u64,
        primitive: Primitive,
    ) -> Self {
        Self {
            blend: blend.unwrap_or_default(),
            depth_stencil: depth_stencil.unwrap_or_default(),
            raster: raster.unwrap_or_default(),
            layout,
            primitive,
        }
    }
}

/// Everything a variant bakes in besides the shaders
pub(crate) struct VariantInputs<'a> {
    pub key: VariantKey,
    pub layout: &'a VulkanInputLayout,
}

/// Attachment formats every variant renders to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TargetFormats {
    pub color: vk::Format,
    pub depth: Option<vk::Format>,
}

pub struct VulkanPipeline {
    ctx: Arc<GpuContext>,
    shaders: PipelineShaders,
    uniforms: UniformBlock,
    stages: Vec<(vk::ShaderStageFlags, vk::ShaderModule)>,
    pub(crate) layout: vk::PipelineLayout,
    set_layout: Option<vk::DescriptorSetLayout>,
    pub(crate) bindings: Vec<ShaderBinding>,
    pub(crate) push_size: u32,
    formats: TargetFormats,
    has_tessellation: bool,
    is_compute: bool,
    variants: RefCell<FxHashMap<VariantKey, vk::Pipeline>>,
}

impl VulkanPipeline {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &PipelineDesc, formats: TargetFormats) -> Result<Self> {
        validate_pipeline_stages(&desc.shaders)?;

        let mut stages = Vec::with_capacity(desc.shaders.len());
        let mut reflections = Vec::with_capacity(desc.shaders.len());
        for shader in &desc.shaders {
            let module = shader
                .get()
                .ok_or_else(|| Error::InvalidPipeline(format!("shader module #{} was destroyed", shader.id())))?;
            let vulkan = module
                .as_any()
                .downcast_ref::<VulkanShaderModule>()
                .ok_or_else(|| Error::InvalidResource("shader module was not created by Vulkan".to_string()))?;
            stages.push((shader_stage_to_vk(module.stage()), vulkan.module));
            reflections.push(vulkan.reflection.clone());
        }

        let uniforms = UniformBlock::from_shaders(&desc.shaders);
        let reflected = reflections.iter().map(|r| r.push_constant_size).max().unwrap_or(0);
        let push_size = push_constant_size(
            reflected,
            uniforms.bytes().len(),
            ctx.properties.limits.max_push_constants_size,
        )?;
        let bindings = merge_bindings(&reflections)?;

        let set_layout = if bindings.is_empty() {
            None
        } else {
            let layout_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
                .iter()
                .map(|b| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(b.binding)
                        .descriptor_type(b.kind.to_vk())
                        .descriptor_count(1)
                        .stage_flags(GRAPHICS_STAGES)
                })
                .collect();
            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
            Some(unsafe {
                ctx.device
                    .create_descriptor_set_layout(&create_info, None)
                    .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to create descriptor set layout: {:?}", e))?
            })
        };

        let push_ranges = [vk::PushConstantRange {
            stage_flags: GRAPHICS_STAGES,
            offset: 0,
            size: push_size,
        }];
        let set_layouts: Vec<vk::DescriptorSetLayout> = set_layout.into_iter().collect();
        let mut layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        if push_size > 0 {
            layout_info = layout_info.push_constant_ranges(&push_ranges);
        }
        let layout = match unsafe { ctx.device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(e) => {
                if let Some(set_layout) = set_layout {
                    unsafe { ctx.device.destroy_descriptor_set_layout(set_layout, None) };
                }
                return Err(hal_err!("draw_hal::vulkan", "Failed to create pipeline layout: {:?}", e));
            }
        };

        let stage_kinds: Vec<ShaderStage> = desc
            .shaders
            .iter()
            .filter_map(|s| s.get().map(|m| m.stage()))
            .collect();

        Ok(Self {
            ctx,
            shaders: PipelineShaders::acquire(desc),
            uniforms,
            stages,
            layout,
            set_layout,
            bindings,
            push_size,
            formats,
            has_tessellation: stage_kinds.contains(&ShaderStage::Control),
            is_compute: stage_kinds.contains(&ShaderStage::Compute),
            variants: RefCell::new(FxHashMap::default()),
        })
    }

    pub(crate) fn set_layout(&self) -> Option<vk::DescriptorSetLayout> {
        self.set_layout
    }

    /// Current uniform values, ready for `cmd_push_constants`
    pub fn push_constants(&self) -> &[u8] {
        self.uniforms.bytes()
    }

    /// Current value of a push-constant uniform
    pub fn uniform(&self, name: &str) -> Option<Vec<f32>> {
        self.uniforms.get(name)
    }

    /// Number of baked variants
    pub fn variant_count(&self) -> usize {
        self.variants.borrow().len()
    }

    /// Baked VkPipeline for `inputs`, created on first use
    pub(crate) fn variant(&self, inputs: &VariantInputs<'_>) -> Result<vk::Pipeline> {
        if self.is_compute {
            return Err(Error::InvalidState("compute pipelines cannot be drawn with".to_string()));
        }
        if inputs.key.primitive == Primitive::PatchList && !self.has_tessellation {
            return Err(Error::InvalidState(
                "PatchList needs a pipeline with tessellation stages".to_string(),
            ));
        }
        if let Some(&pipeline) = self.variants.borrow().get(&inputs.key) {
            return Ok(pipeline);
        }

        let pipeline = self.build_variant(inputs)?;
        self.variants.borrow_mut().insert(inputs.key, pipeline);
        hal_debug!(
            "draw_hal::vulkan",
            "Baked pipeline variant {:?} ({} cached)",
            inputs.key,
            self.variants.borrow().len()
        );
        Ok(pipeline)
    }

    fn build_variant(&self, inputs: &VariantInputs<'_>) -> Result<vk::Pipeline> {
        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = self
            .stages
            .iter()
            .map(|&(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage)
                    .module(module)
                    .name(c"main")
            })
            .collect();

        // Vertex input state
        let vertex_bindings = [inputs.layout.binding()];
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&inputs.layout.attributes);

        // Input assembly state
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(inputs.key.primitive))
            .primitive_restart_enable(false);

        let tessellation_state = vk::PipelineTessellationStateCreateInfo::default().patch_control_points(3);

        // Viewport state (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        // Rasterization state
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(inputs.key.raster.cull))
            .front_face(front_face_to_vk(inputs.key.raster.facing))
            .depth_bias_enable(false);

        // Depth state; without a depth attachment there is nothing to test against
        let depth = &inputs.key.depth_stencil;
        let has_depth = self.formats.depth.is_some();
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth && depth.depth_test_enabled)
            .depth_write_enable(has_depth && depth.depth_write_enabled)
            .depth_compare_op(compare_op_to_vk(depth.depth_compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Color blend state
        let blend = &inputs.key.blend;
        let mut color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(blend.enabled);
        if blend.enabled {
            color_blend_attachment = color_blend_attachment
                .src_color_blend_factor(blend_factor_to_vk(blend.src_col))
                .dst_color_blend_factor(blend_factor_to_vk(blend.dst_col))
                .color_blend_op(blend_op_to_vk(blend.eq_col))
                .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha))
                .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha))
                .alpha_blend_op(blend_op_to_vk(blend.eq_alpha));
        }
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(blend.logic_enabled)
            .logic_op(logic_op_to_vk(blend.logic_op))
            .attachments(std::slice::from_ref(&color_blend_attachment));

        // Dynamic state
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [self.formats.color];
        let depth_format = self.formats.depth.unwrap_or(vk::Format::UNDEFINED);
        let stencil_format = self
            .formats
            .depth
            .filter(|&f| has_stencil(f))
            .unwrap_or(vk::Format::UNDEFINED);
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(depth_format)
            .stencil_attachment_format(stencil_format);

        let mut pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .push_next(&mut rendering_info);
        if self.has_tessellation {
            pipeline_create_info = pipeline_create_info.tessellation_state(&tessellation_state);
        }

        let pipelines = unsafe {
            self.ctx
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to create graphics pipeline: {:?}", e.1))?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| hal_err!("draw_hal::vulkan", "vkCreateGraphicsPipelines returned no pipeline"))
    }
}

impl Pipeline for VulkanPipeline {
    fn set_vector(&mut self, name: &str, values: &[f32]) {
        self.uniforms.set_vector(name, values);
    }

    fn set_matrix4x4(&mut self, name: &str, value: &Mat4) {
        self.uniforms.set_matrix4x4(name, value);
    }

    fn shaders(&self) -> &[ShaderModuleRef] {
        self.shaders.modules()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            for (_, pipeline) in self.variants.get_mut().drain() {
                self.ctx.device.destroy_pipeline(pipeline, None);
            }
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
            if let Some(set_layout) = self.set_layout {
                self.ctx.device.destroy_descriptor_set_layout(set_layout, None);
            }
        }
    }
}

/// Push-constant range size for a uniform block
///
/// Covers both the reflected block and the CPU copy, rounded to 4 bytes.
pub fn push_constant_size(reflected: u32, block_len: usize, limit: u32) -> Result<u32> {
    let size = (reflected.max(block_len as u32) + 3) & !3;
    if size > limit {
        return Err(Error::InvalidPipeline(format!(
            "uniform block of {} bytes exceeds the {} byte push-constant limit",
            size, limit
        )));
    }
    Ok(size)
}

/// Union of the descriptor bindings of every stage, sorted by binding
///
/// Two stages declaring the same binding with different kinds is an error.
pub fn merge_bindings(reflections: &[Reflection]) -> Result<Vec<ShaderBinding>> {
    let mut merged: Vec<ShaderBinding> = Vec::new();
    for binding in reflections.iter().flat_map(|r| r.bindings.iter()) {
        match merged.iter().find(|b| b.binding == binding.binding) {
            Some(existing) if existing.kind != binding.kind => {
                return Err(Error::InvalidPipeline(format!(
                    "binding {} is a {:?} in one stage and a {:?} in another",
                    binding.binding, existing.kind, binding.kind
                )));
            }
            Some(_) => {}
            None => merged.push(binding.clone()),
        }
    }
    merged.sort_by_key(|b| b.binding);
    Ok(merged)
}

pub(crate) fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT
    )
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
