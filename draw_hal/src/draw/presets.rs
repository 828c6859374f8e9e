//! Built-in shaders every context provides
//!
//! Each context builds its own set at construction through its own
//! factories, so presets are always in the context's shading language.
//! Lookups hand out handle copies without taking a reference; callers that
//! want to keep a preset beyond the context's lifetime must `acquire` it.

use crate::draw::{
    PipelineDesc, PipelineRef, ShaderLanguage, ShaderModuleRef, ShaderSources, ShaderStage,
};
use crate::error::Result;
use crate::hal_debug;

/// Built-in vertex shaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexShaderPreset {
    /// Position + color, transformed by `WorldViewProj`
    Color2D,
    /// Position + color + texcoord, transformed by `WorldViewProj`
    TextureColor2D,
}

/// Built-in fragment shaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentShaderPreset {
    /// Interpolated vertex color
    Color2D,
    /// Texture slot 0 modulated by vertex color
    TextureColor2D,
}

/// Built-in vertex + fragment pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderSetPreset {
    Color2D,
    TextureColor2D,
}

impl VertexShaderPreset {
    pub const ALL: [VertexShaderPreset; 2] = [VertexShaderPreset::Color2D, VertexShaderPreset::TextureColor2D];

    /// Built-in source text in every dialect
    pub fn sources(self) -> ShaderSources<'static> {
        match self {
            VertexShaderPreset::Color2D => VS_COLOR_2D,
            VertexShaderPreset::TextureColor2D => VS_TEXTURE_COLOR_2D,
        }
    }
}

impl FragmentShaderPreset {
    pub const ALL: [FragmentShaderPreset; 2] =
        [FragmentShaderPreset::Color2D, FragmentShaderPreset::TextureColor2D];

    pub fn sources(self) -> ShaderSources<'static> {
        match self {
            FragmentShaderPreset::Color2D => FS_COLOR_2D,
            FragmentShaderPreset::TextureColor2D => FS_TEXTURE_COLOR_2D,
        }
    }
}

impl ShaderSetPreset {
    pub const ALL: [ShaderSetPreset; 2] = [ShaderSetPreset::Color2D, ShaderSetPreset::TextureColor2D];
}

/// Shader and pipeline factories the presets are built with
///
/// Backends implement it on a view of the parts that exist before the
/// context itself, so a context never exists without its presets.
pub trait PresetFactory {
    fn shader_language(&self) -> ShaderLanguage;

    fn compile_shader_module(
        &self,
        stage: ShaderStage,
        language: ShaderLanguage,
        source: &str,
    ) -> Result<ShaderModuleRef>;

    fn create_pipeline(&self, desc: PipelineDesc) -> Result<PipelineRef>;
}

fn build_shader<F: PresetFactory + ?Sized>(
    factory: &F,
    stage: ShaderStage,
    sources: ShaderSources<'_>,
) -> Result<ShaderModuleRef> {
    let language = factory.shader_language();
    factory.compile_shader_module(stage, language, sources.for_language(language)?)
}

/// Preset shader modules and pipelines owned by one context
pub struct Presets {
    vertex: [ShaderModuleRef; 2],
    fragment: [ShaderModuleRef; 2],
    sets: [PipelineRef; 2],
}

impl Presets {
    /// Compile every preset with `factory`
    pub fn create<F: PresetFactory + ?Sized>(factory: &F) -> Result<Self> {
        let vs_color = build_shader(factory, ShaderStage::Vertex, VertexShaderPreset::Color2D.sources())?;
        let vs_texture = build_shader(factory, ShaderStage::Vertex, VertexShaderPreset::TextureColor2D.sources())?;
        let fs_color = build_shader(factory, ShaderStage::Fragment, FragmentShaderPreset::Color2D.sources())?;
        let fs_texture =
            build_shader(factory, ShaderStage::Fragment, FragmentShaderPreset::TextureColor2D.sources())?;

        let set_color = factory.create_pipeline(PipelineDesc {
            shaders: vec![vs_color.clone(), fs_color.clone()],
        })?;
        let set_texture = factory.create_pipeline(PipelineDesc {
            shaders: vec![vs_texture.clone(), fs_texture.clone()],
        })?;

        hal_debug!("draw_hal::presets", "Created preset shaders ({:?})", factory.shader_language());
        Ok(Self {
            vertex: [vs_color, vs_texture],
            fragment: [fs_color, fs_texture],
            sets: [set_color, set_texture],
        })
    }

    pub fn vertex_shader(&self, preset: VertexShaderPreset) -> ShaderModuleRef {
        self.vertex[preset as usize].clone()
    }

    pub fn fragment_shader(&self, preset: FragmentShaderPreset) -> ShaderModuleRef {
        self.fragment[preset as usize].clone()
    }

    pub fn shader_set(&self, preset: ShaderSetPreset) -> PipelineRef {
        self.sets[preset as usize].clone()
    }
}

impl Drop for Presets {
    fn drop(&mut self) {
        // pipelines first: they hold references to the modules
        for set in &self.sets {
            set.release();
        }
        for module in self.vertex.iter().chain(self.fragment.iter()) {
            module.release();
        }
    }
}

// ===== SHADER SOURCES =====

const VS_COLOR_2D: ShaderSources<'static> = ShaderSources {
    glsl: Some(
        r#"#if __VERSION__ >= 130
#define attribute in
#define varying out
#endif
attribute vec3 Position;
attribute vec4 Color0;
varying vec4 oColor0;
uniform mat4 WorldViewProj;
void main() {
    oColor0 = Color0;
    gl_Position = WorldViewProj * vec4(Position, 1.0);
}
"#,
    ),
    hlsl: Some(
        r#"cbuffer Uniforms : register(b0) { float4x4 WorldViewProj; };
struct VS_INPUT { float3 Position : POSITION; float4 Color0 : COLOR0; };
struct VS_OUTPUT { float4 Position : SV_Position; float4 Color0 : COLOR0; };
VS_OUTPUT main(VS_INPUT input) {
    VS_OUTPUT output;
    output.Position = mul(WorldViewProj, float4(input.Position, 1.0));
    output.Color0 = input.Color0;
    return output;
}
"#,
    ),
    vulkan: Some(
        r#"#version 450
layout(location = 0) in vec3 Position;
layout(location = 1) in vec4 Color0;
layout(location = 0) out vec4 oColor0;
layout(push_constant) uniform Uniforms { mat4 WorldViewProj; } u;
void main() {
    oColor0 = Color0;
    gl_Position = u.WorldViewProj * vec4(Position, 1.0);
}
"#,
    ),
};

const VS_TEXTURE_COLOR_2D: ShaderSources<'static> = ShaderSources {
    glsl: Some(
        r#"#if __VERSION__ >= 130
#define attribute in
#define varying out
#endif
attribute vec3 Position;
attribute vec4 Color0;
attribute vec2 TexCoord0;
varying vec4 oColor0;
varying vec2 oTexCoord0;
uniform mat4 WorldViewProj;
void main() {
    oColor0 = Color0;
    oTexCoord0 = TexCoord0;
    gl_Position = WorldViewProj * vec4(Position, 1.0);
}
"#,
    ),
    hlsl: Some(
        r#"cbuffer Uniforms : register(b0) { float4x4 WorldViewProj; };
struct VS_INPUT { float3 Position : POSITION; float4 Color0 : COLOR0; float2 TexCoord0 : TEXCOORD0; };
struct VS_OUTPUT { float4 Position : SV_Position; float4 Color0 : COLOR0; float2 TexCoord0 : TEXCOORD0; };
VS_OUTPUT main(VS_INPUT input) {
    VS_OUTPUT output;
    output.Position = mul(WorldViewProj, float4(input.Position, 1.0));
    output.Color0 = input.Color0;
    output.TexCoord0 = input.TexCoord0;
    return output;
}
"#,
    ),
    vulkan: Some(
        r#"#version 450
layout(location = 0) in vec3 Position;
layout(location = 1) in vec4 Color0;
layout(location = 2) in vec2 TexCoord0;
layout(location = 0) out vec4 oColor0;
layout(location = 1) out vec2 oTexCoord0;
layout(push_constant) uniform Uniforms { mat4 WorldViewProj; } u;
void main() {
    oColor0 = Color0;
    oTexCoord0 = TexCoord0;
    gl_Position = u.WorldViewProj * vec4(Position, 1.0);
}
"#,
    ),
};

const FS_COLOR_2D: ShaderSources<'static> = ShaderSources {
    glsl: Some(
        r#"#ifdef GL_ES
precision lowp float;
#endif
#if __VERSION__ >= 130
#define varying in
out vec4 fragColor0;
#else
#define fragColor0 gl_FragColor
#endif
varying vec4 oColor0;
void main() {
    fragColor0 = oColor0;
}
"#,
    ),
    hlsl: Some(
        r#"struct PS_INPUT { float4 Position : SV_Position; float4 Color0 : COLOR0; };
float4 main(PS_INPUT input) : SV_Target {
    return input.Color0;
}
"#,
    ),
    vulkan: Some(
        r#"#version 450
layout(location = 0) in vec4 oColor0;
layout(location = 0) out vec4 fragColor0;
void main() {
    fragColor0 = oColor0;
}
"#,
    ),
};

const FS_TEXTURE_COLOR_2D: ShaderSources<'static> = ShaderSources {
    glsl: Some(
        r#"#ifdef GL_ES
precision lowp float;
#endif
#if __VERSION__ >= 130
#define varying in
#define texture2D texture
out vec4 fragColor0;
#else
#define fragColor0 gl_FragColor
#endif
varying vec4 oColor0;
varying vec2 oTexCoord0;
uniform sampler2D Sampler0;
void main() {
    fragColor0 = texture2D(Sampler0, oTexCoord0) * oColor0;
}
"#,
    ),
    hlsl: Some(
        r#"Texture2D Tex0 : register(t0);
SamplerState Sampler0 : register(s0);
struct PS_INPUT { float4 Position : SV_Position; float4 Color0 : COLOR0; float2 TexCoord0 : TEXCOORD0; };
float4 main(PS_INPUT input) : SV_Target {
    return Tex0.Sample(Sampler0, input.TexCoord0) * input.Color0;
}
"#,
    ),
    vulkan: Some(
        r#"#version 450
layout(location = 0) in vec4 oColor0;
layout(location = 1) in vec2 oTexCoord0;
layout(location = 0) out vec4 fragColor0;
layout(set = 0, binding = 0) uniform texture2D Tex0;
layout(set = 0, binding = 1) uniform sampler Sampler0;
void main() {
    fragColor0 = texture(sampler2D(Tex0, Sampler0), oTexCoord0) * oColor0;
}
"#,
    ),
};

#[cfg(test)]
#[path = "presets_tests.rs"]
mod tests;
