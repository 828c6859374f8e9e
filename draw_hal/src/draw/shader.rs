/// Shader stages, languages, uniform declarations and the shader module trait

use std::any::Any;

use crate::error::{Error, Result};
use crate::RefCounted;

/// Pipeline stage a shader module runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    /// Tessellation control
    Control,
    /// Tessellation evaluation
    Evaluation,
    Compute,
}

/// Shading language dialect a backend consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    GlslEs200,
    GlslEs300,
    Glsl410,
    /// GLSL 450 with Vulkan binding rules, compiled to SPIR-V
    GlslVulkan,
    HlslD3D9,
    HlslD3D11,
}

impl ShaderLanguage {
    pub fn is_glsl(&self) -> bool {
        matches!(
            self,
            ShaderLanguage::GlslEs200 | ShaderLanguage::GlslEs300 | ShaderLanguage::Glsl410
        )
    }

    pub fn is_hlsl(&self) -> bool {
        matches!(self, ShaderLanguage::HlslD3D9 | ShaderLanguage::HlslD3D11)
    }
}

/// Uniform value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Float1,
    Float2,
    Float3,
    Float4,
    Matrix4x4,
}

impl UniformType {
    /// Size in bytes of one value
    pub fn size(&self) -> u32 {
        match self {
            UniformType::Float1 => 4,
            UniformType::Float2 => 8,
            UniformType::Float3 => 12,
            UniformType::Float4 => 16,
            UniformType::Matrix4x4 => 64,
        }
    }

    /// Number of floats accepted by `Pipeline::set_vector`
    pub fn components(&self) -> usize {
        (self.size() / 4) as usize
    }
}

/// Uniform declared by a shader module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDesc {
    pub name: String,
    pub uniform_type: UniformType,
    /// Byte offset inside the backend uniform block (0 where meaningless)
    pub offset: u32,
}

/// Source text of one shader in every supported dialect
///
/// `DrawContext::create_shader_module` compiles only the source matching
/// the backend's `shader_language()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderSources<'a> {
    /// GLSL ES 2.0 / 3.0 / 4.10 compatible source
    pub glsl: Option<&'a str>,
    /// HLSL (D3D9 / D3D11) source
    pub hlsl: Option<&'a str>,
    /// Vulkan GLSL (450) source
    pub vulkan: Option<&'a str>,
}

impl<'a> ShaderSources<'a> {
    /// Source for `language`, or `MissingShaderSource`
    pub fn for_language(&self, language: ShaderLanguage) -> Result<&'a str> {
        let source = match language {
            ShaderLanguage::GlslVulkan => self.vulkan,
            lang if lang.is_hlsl() => self.hlsl,
            _ => self.glsl,
        };
        source.ok_or(Error::MissingShaderSource(language))
    }
}

/// Shader module resource trait
pub trait ShaderModule {
    fn stage(&self) -> ShaderStage;

    /// Dialect the module was compiled from
    fn language(&self) -> ShaderLanguage;

    /// Uniforms declared by the module
    fn uniforms(&self) -> &[UniformDesc];

    fn as_any(&self) -> &dyn Any;
}

pub type ShaderModuleRef = RefCounted<dyn ShaderModule>;
