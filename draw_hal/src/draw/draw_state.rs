/// Binding record shared by every backend context

use crate::draw::{
    BlendStateRef, DepthStencilStateRef, ImageCrateDecoder, ImageDecoder, PipelineRef, Presets,
    RasterStateRef, SamplerStateRef, ScissorRect, TextureRef, Viewport,
};

/// Number of sampler and texture slots
pub const MAX_BOUND_SLOTS: usize = 8;

/// Current binding state of a context
///
/// Slots hold handle copies without taking references: binding an object
/// never keeps it alive. A bound object that has since been destroyed reads
/// as unbound through the `bound_*` accessors.
pub struct DrawState {
    pub pipeline: Option<PipelineRef>,
    pub blend: Option<BlendStateRef>,
    pub depth_stencil: Option<DepthStencilStateRef>,
    pub raster: Option<RasterStateRef>,
    pub samplers: [Option<SamplerStateRef>; MAX_BOUND_SLOTS],
    pub textures: [Option<TextureRef>; MAX_BOUND_SLOTS],
    pub scissor: Option<ScissorRect>,
    pub viewports: Vec<Viewport>,
    pub target_width: u32,
    pub target_height: u32,
    presets: Presets,
    image_decoder: Box<dyn ImageDecoder>,
}

impl DrawState {
    /// State of a freshly built context owning `presets`
    pub fn new(presets: Presets, target_width: u32, target_height: u32) -> Self {
        Self {
            pipeline: None,
            blend: None,
            depth_stencil: None,
            raster: None,
            samplers: Default::default(),
            textures: Default::default(),
            scissor: None,
            viewports: Vec::new(),
            target_width,
            target_height,
            presets,
            image_decoder: Box::new(ImageCrateDecoder),
        }
    }

    /// Bound pipeline if it is still alive
    pub fn bound_pipeline(&self) -> Option<&PipelineRef> {
        self.pipeline.as_ref().filter(|p| p.is_alive())
    }

    pub fn bound_blend(&self) -> Option<&BlendStateRef> {
        self.blend.as_ref().filter(|s| s.is_alive())
    }

    pub fn bound_depth_stencil(&self) -> Option<&DepthStencilStateRef> {
        self.depth_stencil.as_ref().filter(|s| s.is_alive())
    }

    pub fn bound_raster(&self) -> Option<&RasterStateRef> {
        self.raster.as_ref().filter(|s| s.is_alive())
    }

    pub fn bound_sampler(&self, slot: usize) -> Option<&SamplerStateRef> {
        self.samplers.get(slot)?.as_ref().filter(|s| s.is_alive())
    }

    pub fn bound_texture(&self, slot: usize) -> Option<&TextureRef> {
        self.textures.get(slot)?.as_ref().filter(|t| t.is_alive())
    }

    pub fn presets(&self) -> &Presets {
        &self.presets
    }

    pub fn image_decoder(&self) -> &dyn ImageDecoder {
        self.image_decoder.as_ref()
    }

    pub fn set_image_decoder(&mut self, decoder: Box<dyn ImageDecoder>) {
        self.image_decoder = decoder;
    }
}
