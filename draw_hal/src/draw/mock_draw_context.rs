/// Mock draw context for unit tests (no GPU required)
///
/// Every resource lives in plain memory and every draw is recorded together
/// with the binding state active at submission, so tests can assert on what
/// a real backend would have been asked to do.

use std::any::Any;

use glam::Mat4;

use crate::draw::{
    check_full_write, check_image_upload, check_partial_write, check_user_draw, require_pipeline,
    validate_pipeline_stages, BlendState, BlendStateDesc, BlendStateRef, Buffer, BufferRef,
    BufferUsage, ClearFlags, DataFormat, DepthStencilState, DepthStencilStateDesc,
    DepthStencilStateRef, DrawContext, DrawState, FinalizeFlags, InfoField, InputLayout,
    InputLayoutRef, Pipeline, PipelineDesc, PipelineRef, PipelineShaders, PresetFactory, Presets,
    Primitive, RasterState,
    RasterStateDesc, RasterStateRef, SamplerState, SamplerStateDesc, SamplerStateRef, ScissorRect,
    ShaderLanguage, ShaderModule, ShaderModuleRef, ShaderStage, Texture, TextureDesc, TextureInfo,
    TextureRef, TextureRegion, TextureType, UniformBlock, UniformDesc, UniformType,
    VertexComponent, VertexFormatDesc, Viewport, MAX_BOUND_SLOTS,
};
use crate::error::{Error, Result};
use crate::RefCounted;

// ============================================================================
// Mock Config
// ============================================================================

/// Capabilities the mock backend pretends to have
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub language: ShaderLanguage,
    /// Texture formats `Texture::create` accepts
    pub supported_formats: Vec<DataFormat>,
    /// Whether input layouts refuse `draw_user`
    pub requires_buffer: bool,
    /// Report scissor rectangles with a bottom-left origin, as GL does
    pub bottom_left_origin: bool,
    pub features: Vec<String>,
    pub target_width: u32,
    pub target_height: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            language: ShaderLanguage::Glsl410,
            supported_formats: vec![
                DataFormat::R8_UNORM,
                DataFormat::R8G8B8A8_UNORM,
                DataFormat::R8G8B8A8_UNORM_SRGB,
                DataFormat::R4G4B4A4_UNORM,
                DataFormat::R16G16B16A16_FLOAT,
                DataFormat::R32G32B32A32_FLOAT,
                DataFormat::D24_S8,
            ],
            requires_buffer: false,
            bottom_left_origin: false,
            features: vec!["MOCK".to_string()],
            target_width: 640,
            target_height: 480,
        }
    }
}

// ============================================================================
// Mock States
// ============================================================================

/// Frozen state object keeping the descriptor it was created from
#[derive(Debug)]
pub struct MockState<D> {
    pub desc: D,
}

impl BlendState for MockState<BlendStateDesc> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl DepthStencilState for MockState<DepthStencilStateDesc> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RasterState for MockState<RasterStateDesc> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl SamplerState for MockState<SamplerStateDesc> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub data: Vec<u8>,
    pub usage: BufferUsage,
}

impl Buffer for MockBuffer {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn write_full(&mut self, data: &[u8]) -> Result<()> {
        check_full_write(self.data.len(), data.len())?;
        self.data.copy_from_slice(data);
        Ok(())
    }

    fn write_partial(&mut self, data: &[u8], offset: usize) -> Result<()> {
        check_partial_write(self.data.len(), offset, data.len())?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
    pub supported_formats: Vec<DataFormat>,
    /// Every accepted upload, in order
    pub uploads: Vec<TextureRegion>,
    /// Level 0 contents when uploaded whole
    pub level0: Vec<u8>,
    pub mips_requested: bool,
    pub mips_generated: bool,
    pub finalized: bool,
}

impl MockTexture {
    fn new(supported_formats: Vec<DataFormat>) -> Self {
        Self {
            info: TextureInfo::default(),
            supported_formats,
            uploads: Vec::new(),
            level0: Vec::new(),
            mips_requested: false,
            mips_generated: false,
            finalized: false,
        }
    }
}

impl Texture for MockTexture {
    fn create(&mut self, desc: &TextureDesc) -> Result<()> {
        if desc.texture_type == TextureType::Unknown || !self.supported_formats.contains(&desc.format) {
            self.info = TextureInfo::default();
            return Err(Error::UnsupportedFormat {
                texture_type: desc.texture_type,
                format: desc.format,
            });
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource(format!(
                "texture extent {}x{} is empty",
                desc.width, desc.height
            )));
        }
        self.info = TextureInfo::from_desc(desc);
        self.uploads.clear();
        self.level0.clear();
        self.finalized = false;
        Ok(())
    }

    fn set_image_data(&mut self, region: TextureRegion, row_stride: u32, data: &[u8]) -> Result<()> {
        check_image_upload(&self.info, &region, row_stride, data.len())?;
        if region.level == 0 {
            self.level0 = data.to_vec();
        }
        self.uploads.push(region);
        Ok(())
    }

    fn auto_gen_mipmaps(&mut self) -> Result<()> {
        self.mips_requested = true;
        Ok(())
    }

    fn finalize(&mut self, flags: FinalizeFlags) -> Result<()> {
        if !self.info.is_created() {
            return Err(Error::InvalidState("finalize on an uncreated texture".to_string()));
        }
        if self.mips_requested || flags.contains(FinalizeFlags::GENERATE_MIPS) {
            self.mips_generated = self.info.mip_levels > 1;
        }
        self.finalized = true;
        Ok(())
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

// ============================================================================
// Mock Shader Module
// ============================================================================

#[derive(Debug)]
pub struct MockShaderModule {
    pub stage: ShaderStage,
    pub language: ShaderLanguage,
    pub source: String,
    pub uniforms: Vec<UniformDesc>,
}

impl MockShaderModule {
    pub fn new(stage: ShaderStage, language: ShaderLanguage, source: &str) -> Self {
        Self {
            stage,
            language,
            source: source.to_string(),
            uniforms: scan_uniforms(source),
        }
    }
}

/// Collect `uniform <type> <name>;` declarations of value types
fn scan_uniforms(source: &str) -> Vec<UniformDesc> {
    let mut uniforms = Vec::new();
    let mut offset = 0;
    for line in source.lines() {
        let mut words = line.split_whitespace();
        if words.next() != Some("uniform") {
            continue;
        }
        let (Some(type_name), Some(name)) = (words.next(), words.next()) else {
            continue;
        };
        let uniform_type = match type_name {
            "float" => UniformType::Float1,
            "vec2" => UniformType::Float2,
            "vec3" => UniformType::Float3,
            "vec4" => UniformType::Float4,
            "mat4" => UniformType::Matrix4x4,
            _ => continue,
        };
        uniforms.push(UniformDesc {
            name: name.trim_end_matches(';').to_string(),
            uniform_type,
            offset,
        });
        offset += uniform_type.size();
    }
    uniforms
}

impl ShaderModule for MockShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn language(&self) -> ShaderLanguage {
        self.language
    }

    fn uniforms(&self) -> &[UniformDesc] {
        &self.uniforms
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Pipeline
// ============================================================================

pub struct MockPipeline {
    pub shaders: PipelineShaders,
    pub uniforms: UniformBlock,
}

impl Pipeline for MockPipeline {
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

// ============================================================================
// Mock Input Layout
// ============================================================================

#[derive(Debug)]
pub struct MockInputLayout {
    pub desc: VertexFormatDesc,
    pub requires_buffer: bool,
}

impl InputLayout for MockInputLayout {
    fn requires_buffer(&self) -> bool {
        self.requires_buffer
    }

    fn stride(&self) -> u32 {
        self.desc.stride
    }

    fn components(&self) -> &[VertexComponent] {
        &self.desc.components
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Recorded commands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Array,
    Indexed,
    User,
}

/// A draw with the binding state it was submitted under (object ids)
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub kind: DrawKind,
    pub prim: Primitive,
    pub vertex_count: u32,
    pub offset: u32,
    pub pipeline: u64,
    pub blend: Option<u64>,
    pub depth_stencil: Option<u64>,
    pub raster: Option<u64>,
    pub samplers: [Option<u64>; MAX_BOUND_SLOTS],
    pub textures: [Option<u64>; MAX_BOUND_SLOTS],
    /// Scissor in the backend's native origin
    pub scissor: Option<ScissorRect>,
    pub viewports: Vec<Viewport>,
    /// Pipeline uniform block at submission
    pub uniforms: Vec<u8>,
    /// Caller-memory vertices (`DrawKind::User` only)
    pub vertex_bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum MockCommand {
    Clear {
        mask: ClearFlags,
        color: u32,
        depth: f32,
        stencil: i32,
    },
    Draw(DrawRecord),
}

// ============================================================================
// Mock Draw Context
// ============================================================================

pub struct MockDrawContext {
    pub config: MockConfig,
    state: DrawState,
    pub commands: Vec<MockCommand>,
}

// ============================================================================
// Mock Factory
// ============================================================================

/// Shader and pipeline factories, usable before the context exists
pub struct MockFactory<'a> {
    pub config: &'a MockConfig,
}

impl PresetFactory for MockFactory<'_> {
    fn shader_language(&self) -> ShaderLanguage {
        self.config.language
    }

    fn compile_shader_module(
        &self,
        stage: ShaderStage,
        language: ShaderLanguage,
        source: &str,
    ) -> Result<ShaderModuleRef> {
        if source.trim().is_empty() {
            return Err(Error::ShaderCompilationFailed("empty shader source".to_string()));
        }
        Ok(RefCounted::new(Box::new(MockShaderModule::new(stage, language, source))))
    }

    fn create_pipeline(&self, desc: PipelineDesc) -> Result<PipelineRef> {
        validate_pipeline_stages(&desc.shaders)?;
        let uniforms = UniformBlock::packed(&desc.shaders);
        Ok(RefCounted::new(Box::new(MockPipeline {
            shaders: PipelineShaders::acquire(&desc),
            uniforms,
        })))
    }
}

impl MockDrawContext {
    pub fn new(config: MockConfig) -> Result<Self> {
        let presets = Presets::create(&MockFactory { config: &config })?;
        Ok(Self {
            state: DrawState::new(presets, config.target_width, config.target_height),
            config,
            commands: Vec::new(),
        })
    }

    pub fn factory(&self) -> MockFactory<'_> {
        MockFactory { config: &self.config }
    }

    /// Recorded draws, in submission order
    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                MockCommand::Draw(record) => Some(record),
                MockCommand::Clear { .. } => None,
            })
            .collect()
    }

    fn native_scissor(&self) -> Option<ScissorRect> {
        let mut rect = self.state.scissor?;
        if self.config.bottom_left_origin {
            rect.top = self.state.target_height as i32 - rect.top - rect.height;
        }
        Some(rect)
    }

    fn record_draw(
        &mut self,
        kind: DrawKind,
        prim: Primitive,
        layout: &InputLayoutRef,
        vertex_count: u32,
        offset: u32,
        vertex_bytes: &[u8],
    ) -> Result<()> {
        let pipeline = require_pipeline(&self.state)?;
        if !layout.is_alive() {
            return Err(Error::InvalidResource(format!("input layout #{} was destroyed", layout.id())));
        }
        let uniforms = pipeline
            .get()
            .and_then(|p| p.as_any().downcast_ref::<MockPipeline>().map(|m| m.uniforms.bytes().to_vec()))
            .unwrap_or_default();

        let state = &self.state;
        let record = DrawRecord {
            kind,
            prim,
            vertex_count,
            offset,
            pipeline: pipeline.id(),
            blend: state.bound_blend().map(|s| s.id()),
            depth_stencil: state.bound_depth_stencil().map(|s| s.id()),
            raster: state.bound_raster().map(|s| s.id()),
            samplers: std::array::from_fn(|slot| state.bound_sampler(slot).map(|s| s.id())),
            textures: std::array::from_fn(|slot| state.bound_texture(slot).map(|t| t.id())),
            scissor: self.native_scissor(),
            viewports: state.viewports.clone(),
            uniforms,
            vertex_bytes: vertex_bytes.to_vec(),
        };
        self.commands.push(MockCommand::Draw(record));
        Ok(())
    }
}

fn require_alive<T: ?Sized>(handle: &RefCounted<T>, what: &str) -> Result<()> {
    if handle.is_alive() {
        Ok(())
    } else {
        Err(Error::InvalidResource(format!("{} #{} was destroyed", what, handle.id())))
    }
}

impl DrawContext for MockDrawContext {
    fn state(&self) -> &DrawState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DrawState {
        &mut self.state
    }

    fn create_depth_stencil_state(&self, desc: DepthStencilStateDesc) -> Result<DepthStencilStateRef> {
        Ok(RefCounted::new(Box::new(MockState { desc })))
    }

    fn create_blend_state(&self, desc: BlendStateDesc) -> Result<BlendStateRef> {
        Ok(RefCounted::new(Box::new(MockState { desc })))
    }

    fn create_sampler_state(&self, desc: SamplerStateDesc) -> Result<SamplerStateRef> {
        Ok(RefCounted::new(Box::new(MockState { desc })))
    }

    fn create_raster_state(&self, desc: RasterStateDesc) -> Result<RasterStateRef> {
        Ok(RefCounted::new(Box::new(MockState { desc })))
    }

    fn create_buffer(&self, size: usize, usage: BufferUsage) -> Result<BufferRef> {
        Ok(RefCounted::new(Box::new(MockBuffer {
            data: vec![0; size],
            usage,
        })))
    }

    fn create_pipeline(&self, desc: PipelineDesc) -> Result<PipelineRef> {
        self.factory().create_pipeline(desc)
    }

    fn create_input_layout(
        &self,
        desc: VertexFormatDesc,
        vertex_shader: &ShaderModuleRef,
    ) -> Result<InputLayoutRef> {
        require_alive(vertex_shader, "vertex shader")?;
        Ok(RefCounted::new(Box::new(MockInputLayout {
            desc,
            requires_buffer: self.config.requires_buffer,
        })))
    }

    fn create_texture(&self) -> TextureRef {
        RefCounted::new(Box::new(MockTexture::new(self.config.supported_formats.clone())))
    }

    fn compile_shader_module(
        &self,
        stage: ShaderStage,
        language: ShaderLanguage,
        source: &str,
    ) -> Result<ShaderModuleRef> {
        self.factory().compile_shader_module(stage, language, source)
    }

    fn clear(&mut self, mask: ClearFlags, color: u32, depth: f32, stencil: i32) -> Result<()> {
        self.commands.push(MockCommand::Clear {
            mask,
            color,
            depth,
            stencil,
        });
        Ok(())
    }

    fn draw(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vdata: &BufferRef,
        vertex_count: u32,
        offset: u32,
    ) -> Result<()> {
        require_alive(vdata, "vertex buffer")?;
        self.record_draw(DrawKind::Array, prim, layout, vertex_count, offset, &[])
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
        require_alive(vdata, "vertex buffer")?;
        require_alive(idata, "index buffer")?;
        self.record_draw(DrawKind::Indexed, prim, layout, vertex_count, offset, &[])
    }

    fn draw_user(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vertex_bytes: &[u8],
        vertex_count: u32,
    ) -> Result<()> {
        check_user_draw(layout, vertex_bytes, vertex_count)?;
        self.record_draw(DrawKind::User, prim, layout, vertex_count, 0, vertex_bytes)
    }

    fn feature_list(&self) -> Vec<String> {
        self.config.features.clone()
    }

    fn info_string(&self, field: InfoField) -> String {
        match field {
            InfoField::ApiName => "Mock".to_string(),
            InfoField::ApiVersion => "1.0".to_string(),
            InfoField::VendorString => "draw_hal".to_string(),
            InfoField::Vendor => "Mock".to_string(),
            InfoField::ShadeLangVersion => format!("{:?}", self.config.language),
            InfoField::Renderer => "MockDrawContext".to_string(),
        }
    }

    fn shader_language(&self) -> ShaderLanguage {
        self.factory().shader_language()
    }
}

#[cfg(test)]
#[path = "mock_draw_context_tests.rs"]
mod tests;
