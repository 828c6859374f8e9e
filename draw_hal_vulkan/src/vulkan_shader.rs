/// Shader compilation (GLSL -> SPIR-V), reflection and the Vulkan shader module

use std::any::Any;
use std::sync::Arc;

use ash::vk;
use draw_hal::{
    hal_err, Error, Result, ShaderLanguage, ShaderModule, ShaderStage, UniformDesc, UniformType,
};

use crate::vulkan_context::GpuContext;

// ===== COMPILER =====

/// Turns Vulkan-dialect GLSL into SPIR-V words
pub trait ShaderCompiler {
    fn compile(&self, stage: ShaderStage, source: &str) -> Result<Vec<u32>>;
}

/// Default compiler: naga GLSL front-end, SPIR-V back-end
///
/// Supports vertex, fragment and compute stages; entry point `main`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NagaGlslCompiler;

impl ShaderCompiler for NagaGlslCompiler {
    fn compile(&self, stage: ShaderStage, source: &str) -> Result<Vec<u32>> {
        let naga_stage = match stage {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
            other => {
                return Err(Error::ShaderCompilationFailed(format!(
                    "{:?} shaders are not supported by the GLSL compiler",
                    other
                )))
            }
        };

        let options = naga::front::glsl::Options::from(naga_stage);
        let mut frontend = naga::front::glsl::Frontend::default();
        let module = frontend
            .parse(&options, source)
            .map_err(|errors| Error::ShaderCompilationFailed(format!("GLSL parse error:\n{errors}")))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        let info = validator
            .validate(&module)
            .map_err(|e| Error::ShaderCompilationFailed(format!("Validation error: {e}")))?;

        // DEBUG keeps block member names, which reflection needs for uniforms
        let options = naga::back::spv::Options {
            lang_version: (1, 3),
            flags: naga::back::spv::WriterFlags::DEBUG | naga::back::spv::WriterFlags::LABEL_VARYINGS,
            capabilities: None,
            bounds_check_policies: naga::proc::BoundsCheckPolicies::default(),
            binding_map: Default::default(),
            debug_info: None,
            zero_initialize_workgroup_memory: naga::back::spv::ZeroInitializeWorkgroupMemoryMode::None,
        };

        let pipeline_options = naga::back::spv::PipelineOptions {
            shader_stage: naga_stage,
            entry_point: "main".to_string(),
        };

        naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options))
            .map_err(|e| Error::ShaderCompilationFailed(format!("SPIR-V generation error: {e}")))
    }
}

// ===== REFLECTION =====

/// Kind of a reflected descriptor binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    SampledImage,
    Sampler,
    CombinedImageSampler,
}

impl BindingKind {
    pub fn to_vk(self) -> vk::DescriptorType {
        match self {
            BindingKind::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            BindingKind::Sampler => vk::DescriptorType::SAMPLER,
            BindingKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// Descriptor binding used by a module (set 0 only)
///
/// Texture slot `n` lives at binding `2n` (image) and `2n + 1` (sampler);
/// a combined image sampler may sit at either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinding {
    pub name: String,
    pub binding: u32,
    pub kind: BindingKind,
}

impl ShaderBinding {
    /// Texture/sampler slot this binding reads
    pub fn slot(&self) -> usize {
        (self.binding / 2) as usize
    }
}

/// What a SPIR-V module exposes to the pipeline layout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reflection {
    pub uniforms: Vec<UniformDesc>,
    pub bindings: Vec<ShaderBinding>,
    /// Size of the push-constant block, 0 if none
    pub push_constant_size: u32,
}

/// Parse SPIR-V bytecode and extract uniforms and bindings using spirq
///
/// Uniforms are the members of the push-constant block. Nested structs are
/// flattened (naga wraps the GLSL block in an unnamed outer struct); members
/// whose type has no `UniformType` (ints, arrays) are skipped.
pub fn reflect_shader(code: &[u32]) -> Result<Reflection> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| hal_err!("draw_hal::vulkan", "SPIR-V reflection failed: {:?}", e))?;

    let mut reflection = Reflection::default();

    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            match var {
                spirq::var::Variable::Descriptor {
                    name, desc_bind, desc_ty, ..
                } => {
                    if desc_bind.set() != 0 {
                        return Err(hal_err!(
                            "draw_hal::vulkan",
                            "Descriptor '{}' uses set {}, only set 0 is supported",
                            name.clone().unwrap_or_default(),
                            desc_bind.set()
                        ));
                    }
                    let kind = spirq_desc_type_to_kind(desc_ty)?;
                    let binding = ShaderBinding {
                        name: name.clone().unwrap_or_default(),
                        binding: desc_bind.bind(),
                        kind,
                    };
                    if !reflection.bindings.contains(&binding) {
                        reflection.bindings.push(binding);
                    }
                }
                spirq::var::Variable::PushConstant { ty, .. } => {
                    reflection.push_constant_size = reflection
                        .push_constant_size
                        .max(ty.nbyte().unwrap_or(0) as u32);
                    if let spirq::ty::Type::Struct(st) = ty {
                        collect_push_constant_members(st, 0, &mut reflection.uniforms);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(reflection)
}

/// Append the leaf members of `st`, offsets relative to the block start
fn collect_push_constant_members(st: &spirq::ty::StructType, base: usize, uniforms: &mut Vec<UniformDesc>) {
    for member in &st.members {
        let offset = base + member.offset.unwrap_or(0);
        if let spirq::ty::Type::Struct(inner) = &member.ty {
            collect_push_constant_members(inner, offset, uniforms);
            continue;
        }
        let Some(uniform_type) = spirq_type_to_uniform(&member.ty) else {
            continue;
        };
        let name = member.name.clone().unwrap_or_default();
        if name.is_empty() || uniforms.iter().any(|u| u.name == name) {
            continue;
        }
        uniforms.push(UniformDesc {
            name,
            uniform_type,
            offset: offset as u32,
        });
    }
}

/// Convert spirq descriptor type to our BindingKind
fn spirq_desc_type_to_kind(desc_ty: &spirq::ty::DescriptorType) -> Result<BindingKind> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::SampledImage() => Ok(BindingKind::SampledImage),
        DescriptorType::Sampler() => Ok(BindingKind::Sampler),
        DescriptorType::CombinedImageSampler() => Ok(BindingKind::CombinedImageSampler),
        other => Err(hal_err!("draw_hal::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other)),
    }
}

/// UniformType of a push-constant member, if it has one
fn spirq_type_to_uniform(ty: &spirq::ty::Type) -> Option<UniformType> {
    use spirq::ty::{ScalarType, Type};
    let is_f32 = |scalar: &ScalarType| matches!(scalar, ScalarType::Float { bits: 32 });
    match ty {
        Type::Scalar(s) if is_f32(s) => Some(UniformType::Float1),
        Type::Vector(v) if is_f32(&v.scalar_ty) => match v.nscalar {
            2 => Some(UniformType::Float2),
            3 => Some(UniformType::Float3),
            4 => Some(UniformType::Float4),
            _ => None,
        },
        Type::Matrix(m) if is_f32(&m.vector_ty.scalar_ty) && m.nvector == 4 && m.vector_ty.nscalar == 4 => {
            Some(UniformType::Matrix4x4)
        }
        _ => None,
    }
}

// ===== SHADER MODULE =====

/// Vulkan shader module: VkShaderModule plus its reflection
pub struct VulkanShaderModule {
    ctx: Arc<GpuContext>,
    pub(crate) module: vk::ShaderModule,
    stage: ShaderStage,
    pub(crate) reflection: Reflection,
}

impl VulkanShaderModule {
    pub fn new(ctx: Arc<GpuContext>, stage: ShaderStage, code: &[u32]) -> Result<Self> {
        let reflection = reflect_shader(code)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe {
            ctx.device
                .create_shader_module(&create_info, None)
                .map_err(|e| hal_err!("draw_hal::vulkan", "Failed to create shader module: {:?}", e))?
        };

        Ok(Self {
            ctx,
            module,
            stage,
            reflection,
        })
    }
}

impl ShaderModule for VulkanShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn language(&self) -> ShaderLanguage {
        ShaderLanguage::GlslVulkan
    }

    fn uniforms(&self) -> &[UniformDesc] {
        &self.reflection.uniforms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
