//! The context facade: resource factories, binding state, draw submission
//!
//! Every backend embeds a [`DrawState`] and implements the required methods;
//! binding, loaders and preset lookups come as default methods recording into
//! that state. Backends override a default only when they must react to the
//! call itself (e.g. Vulkan's `begin`/`end`).

use std::path::Path;

use crate::draw::{
    load_from_file, load_from_file_data, BlendStateDesc, BlendStateRef, BufferRef, BufferUsage,
    ClearFlags, DepthStencilStateDesc, DepthStencilStateRef, DrawState, FragmentShaderPreset,
    ImageDecoder, ImageFileType, InfoField, InputLayoutRef, PipelineDesc, PipelineRef,
    Primitive, RasterStateDesc, RasterStateRef, SamplerStateDesc, SamplerStateRef, ScissorRect,
    ShaderLanguage, ShaderModuleRef, ShaderSetPreset, ShaderSources, ShaderStage, Texture,
    TextureDesc, TextureRef, VertexFormatDesc, VertexShaderPreset, Viewport, MAX_BOUND_SLOTS,
};
use crate::error::{Error, Result};
use crate::hal_warn;

/// Drawing context of one backend
///
/// Single-threaded: a context and every handle it produced belong to the
/// thread that created it.
pub trait DrawContext {
    // ===== STATE =====

    fn state(&self) -> &DrawState;

    fn state_mut(&mut self) -> &mut DrawState;

    // ===== FACTORIES =====

    fn create_depth_stencil_state(&self, desc: DepthStencilStateDesc) -> Result<DepthStencilStateRef>;

    fn create_blend_state(&self, desc: BlendStateDesc) -> Result<BlendStateRef>;

    fn create_sampler_state(&self, desc: SamplerStateDesc) -> Result<SamplerStateRef>;

    fn create_raster_state(&self, desc: RasterStateDesc) -> Result<RasterStateRef>;

    fn create_buffer(&self, size: usize, usage: BufferUsage) -> Result<BufferRef>;

    /// Build a pipeline from ordered shader modules
    ///
    /// Implementations run `validate_pipeline_stages` first.
    fn create_pipeline(&self, desc: PipelineDesc) -> Result<PipelineRef>;

    fn create_input_layout(
        &self,
        desc: VertexFormatDesc,
        vertex_shader: &ShaderModuleRef,
    ) -> Result<InputLayoutRef>;

    /// Empty texture; allocate it later with `Texture::create`
    fn create_texture(&self) -> TextureRef;

    /// Compile `source`, already written in `language`
    fn compile_shader_module(
        &self,
        stage: ShaderStage,
        language: ShaderLanguage,
        source: &str,
    ) -> Result<ShaderModuleRef>;

    /// Texture allocated immediately from `desc`
    fn create_texture_with(&self, desc: TextureDesc) -> Result<TextureRef> {
        new_texture_with(self, |texture| texture.create(&desc))
    }

    /// Compile the source matching `shader_language()`
    fn create_shader_module(&self, stage: ShaderStage, sources: ShaderSources<'_>) -> Result<ShaderModuleRef> {
        let language = self.shader_language();
        let source = sources.for_language(language)?;
        self.compile_shader_module(stage, language, source)
    }

    /// Decode an image held in memory into a new texture
    fn create_texture_from_file_data(&self, data: &[u8], file_type: ImageFileType) -> Result<TextureRef> {
        let decoder = self.state().image_decoder();
        new_texture_with(self, |texture| load_from_file_data(texture, decoder, data, file_type))
    }

    /// Load an image file into a new texture
    fn create_texture_from_file(&self, path: &Path, file_type: ImageFileType) -> Result<TextureRef> {
        let decoder = self.state().image_decoder();
        new_texture_with(self, |texture| load_from_file(texture, decoder, path, file_type))
    }

    /// Replace the decoder used by the file loaders
    fn set_image_decoder(&mut self, decoder: Box<dyn ImageDecoder>) {
        self.state_mut().set_image_decoder(decoder);
    }

    // ===== BINDING =====

    fn bind_pipeline(&mut self, pipeline: Option<&PipelineRef>) {
        self.state_mut().pipeline = pipeline.cloned();
    }

    fn set_blend_state(&mut self, state: &BlendStateRef) {
        self.state_mut().blend = Some(state.clone());
    }

    fn set_depth_stencil_state(&mut self, state: &DepthStencilStateRef) {
        self.state_mut().depth_stencil = Some(state.clone());
    }

    fn set_raster_state(&mut self, state: &RasterStateRef) {
        self.state_mut().raster = Some(state.clone());
    }

    /// Bind samplers to consecutive slots starting at `start`
    fn bind_sampler_states(&mut self, start: usize, states: &[SamplerStateRef]) {
        for (i, sampler) in states.iter().enumerate() {
            match self.state_mut().samplers.get_mut(start + i) {
                Some(slot) => *slot = Some(sampler.clone()),
                None => {
                    warn_slot_out_of_range("sampler", start + i);
                    break;
                }
            }
        }
    }

    /// Bind textures to consecutive slots starting at `start`; `None` unbinds
    fn bind_textures(&mut self, start: usize, textures: &[Option<TextureRef>]) {
        for (i, texture) in textures.iter().enumerate() {
            match self.state_mut().textures.get_mut(start + i) {
                Some(slot) => *slot = texture.clone(),
                None => {
                    warn_slot_out_of_range("texture", start + i);
                    break;
                }
            }
        }
    }

    fn bind_texture(&mut self, slot: usize, texture: Option<&TextureRef>) {
        self.bind_textures(slot, &[texture.cloned()]);
    }

    // ===== RASTER CONFIGURATION =====

    /// Scissor rectangle in pixels, top-left origin
    fn set_scissor_rect(&mut self, left: i32, top: i32, width: i32, height: i32) {
        self.state_mut().scissor = Some(ScissorRect {
            left,
            top,
            width,
            height,
        });
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        let state = self.state_mut();
        state.viewports.clear();
        state.viewports.extend_from_slice(viewports);
    }

    fn set_target_size(&mut self, width: u32, height: u32) {
        let state = self.state_mut();
        state.target_width = width;
        state.target_height = height;
    }

    // ===== RENDER PASS =====

    /// Start rendering to the current target, optionally clearing every plane
    fn begin(&mut self, clear: bool, color: u32, depth: f32, stencil: i32) -> Result<()> {
        if clear {
            self.clear(ClearFlags::all(), color, depth, stencil)?;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Clear the planes in `mask`; `color` is packed 0xAABBGGRR
    fn clear(&mut self, mask: ClearFlags, color: u32, depth: f32, stencil: i32) -> Result<()>;

    // ===== DRAWS =====

    /// Draw `vertex_count` vertices from `vdata` starting at vertex `offset`
    fn draw(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vdata: &BufferRef,
        vertex_count: u32,
        offset: u32,
    ) -> Result<()>;

    /// Draw `vertex_count` 16-bit indices from `idata` starting at index `offset`
    fn draw_indexed(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vdata: &BufferRef,
        idata: &BufferRef,
        vertex_count: u32,
        offset: u32,
    ) -> Result<()>;

    /// Draw vertices straight from caller memory
    ///
    /// Only allowed with layouts that do not `requires_buffer()`.
    fn draw_user(
        &mut self,
        prim: Primitive,
        layout: &InputLayoutRef,
        vertex_bytes: &[u8],
        vertex_count: u32,
    ) -> Result<()>;

    // ===== INTROSPECTION =====

    fn feature_list(&self) -> Vec<String> {
        Vec::new()
    }

    fn info_string(&self, field: InfoField) -> String;

    fn shader_language(&self) -> ShaderLanguage;

    // ===== PRESETS =====

    /// Preset vertex shader
    ///
    /// The handle is not an owned reference: `acquire` it before any `release`.
    fn vertex_shader_preset(&self, preset: VertexShaderPreset) -> ShaderModuleRef {
        self.state().presets().vertex_shader(preset)
    }

    /// Preset fragment shader, same ownership rules as `vertex_shader_preset`
    fn fragment_shader_preset(&self, preset: FragmentShaderPreset) -> ShaderModuleRef {
        self.state().presets().fragment_shader(preset)
    }

    /// Preset pipeline, same ownership rules as `vertex_shader_preset`
    fn shader_set_preset(&self, preset: ShaderSetPreset) -> PipelineRef {
        self.state().presets().shader_set(preset)
    }
}

/// Placeholder texture from `ctx`, initialized by `init` or released on failure
fn new_texture_with<C, F>(ctx: &C, init: F) -> Result<TextureRef>
where
    C: DrawContext + ?Sized,
    F: FnOnce(&mut dyn Texture) -> Result<()>,
{
    let texture = ctx.create_texture();
    let result = match texture.get_mut() {
        Some(mut t) => init(&mut *t),
        None => Err(Error::InvalidResource("new texture is not accessible".to_string())),
    };
    match result {
        Ok(()) => Ok(texture),
        Err(e) => {
            texture.release();
            Err(e)
        }
    }
}

fn warn_slot_out_of_range(kind: &str, slot: usize) {
    hal_warn!(
        "draw_hal::DrawContext",
        "{} slot {} out of range (max {}), binding ignored",
        kind,
        slot,
        MAX_BOUND_SLOTS
    );
}

/// Bound pipeline required by every draw
///
/// Fails with `Error::InvalidState` (logged at WARN) if nothing is bound or
/// the bound pipeline was destroyed.
pub fn require_pipeline(state: &DrawState) -> Result<PipelineRef> {
    match state.bound_pipeline() {
        Some(pipeline) => Ok(pipeline.clone()),
        None => {
            hal_warn!("draw_hal::DrawContext", "Draw without a live pipeline bound, skipped");
            Err(Error::InvalidState("no pipeline bound".to_string()))
        }
    }
}

/// Preconditions of `draw_user`: a buffer-free layout and enough vertex bytes
pub fn check_user_draw(layout: &InputLayoutRef, vertex_bytes: &[u8], vertex_count: u32) -> Result<()> {
    let layout = layout
        .get()
        .ok_or_else(|| Error::InvalidResource(format!("input layout #{} was destroyed", layout.id())))?;
    if layout.requires_buffer() {
        return Err(Error::InvalidState(
            "draw_user with an input layout that requires a buffer".to_string(),
        ));
    }
    let expected = layout.stride() as usize * vertex_count as usize;
    if vertex_bytes.len() < expected {
        return Err(Error::SizeMismatch {
            expected,
            actual: vertex_bytes.len(),
        });
    }
    Ok(())
}
