/// Frozen state objects (blend, depth/stencil, raster, sampler) and their descriptors

use std::any::Any;

use crate::RefCounted;

// ===== COLOR BLEND ENUMS =====

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    #[default]
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Blend factor for color and alpha blending equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    SrcAlpha,
    OneMinusSrcColor,
    OneMinusSrcAlpha,
    DstColor,
    DstAlpha,
    OneMinusDstColor,
    OneMinusDstAlpha,
    /// Constant blend color supplied by the backend
    FixedColor,
}

/// Framebuffer logic operation (applied instead of blending when enabled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LogicOp {
    Clear,
    Set,
    #[default]
    Copy,
    CopyInverted,
    Noop,
    Invert,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Equiv,
    AndReverse,
    AndInverted,
    OrReverse,
    OrInverted,
}

// ===== DEPTH ENUMS =====

/// Comparison function for depth tests and shadow samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Comparison {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

// ===== RASTER ENUMS =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
    /// Not available on every backend
    FrontAndBack,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Facing {
    #[default]
    Ccw,
    Cw,
}

// ===== SAMPLER ENUMS =====

/// Texture filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureAddressMode {
    Repeat,
    RepeatMirror,
    #[default]
    ClampToEdge,
    ClampToBorder,
}

/// Border color used with `TextureAddressMode::ClampToBorder`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderColor {
    #[default]
    DontCare,
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

// ===== DESCRIPTORS =====

/// Blend state descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDesc {
    pub enabled: bool,
    pub src_col: BlendFactor,
    pub dst_col: BlendFactor,
    pub eq_col: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub eq_alpha: BlendOp,
    pub logic_enabled: bool,
    pub logic_op: LogicOp,
}

impl Default for BlendStateDesc {
    fn default() -> Self {
        Self {
            enabled: false,
            src_col: BlendFactor::One,
            dst_col: BlendFactor::Zero,
            eq_col: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            eq_alpha: BlendOp::Add,
            logic_enabled: false,
            logic_op: LogicOp::Copy,
        }
    }
}

impl BlendStateDesc {
    /// Classic `src * a + dst * (1 - a)` alpha blending
    pub fn alpha_blend() -> Self {
        Self {
            enabled: true,
            src_col: BlendFactor::SrcAlpha,
            dst_col: BlendFactor::OneMinusSrcAlpha,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::OneMinusSrcAlpha,
            ..Self::default()
        }
    }
}

/// Depth state descriptor (stencil is not modeled)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthStencilStateDesc {
    pub depth_test_enabled: bool,
    pub depth_write_enabled: bool,
    pub depth_compare: Comparison,
}

/// Rasterizer state descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterStateDesc {
    pub cull: CullMode,
    pub facing: Facing,
}

/// Sampler state descriptor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerStateDesc {
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub mip_filter: TextureFilter,
    pub max_aniso: f32,
    pub wrap_u: TextureAddressMode,
    pub wrap_v: TextureAddressMode,
    pub wrap_w: TextureAddressMode,
    pub max_lod: f32,
    /// Depth comparison for shadow sampling; `None` disables it
    pub shadow_compare: Option<Comparison>,
    pub border_color: BorderColor,
}

impl Default for SamplerStateDesc {
    fn default() -> Self {
        Self {
            mag_filter: TextureFilter::Linear,
            min_filter: TextureFilter::Linear,
            mip_filter: TextureFilter::Linear,
            max_aniso: 1.0,
            wrap_u: TextureAddressMode::ClampToEdge,
            wrap_v: TextureAddressMode::ClampToEdge,
            wrap_w: TextureAddressMode::ClampToEdge,
            max_lod: 1000.0,
            shadow_compare: None,
            border_color: BorderColor::DontCare,
        }
    }
}

// ===== FROZEN STATE TRAITS =====

/// Immutable blend state, only ever bound
pub trait BlendState {
    fn as_any(&self) -> &dyn Any;
}

/// Immutable depth/stencil state, only ever bound
pub trait DepthStencilState {
    fn as_any(&self) -> &dyn Any;
}

/// Immutable rasterizer state, only ever bound
pub trait RasterState {
    fn as_any(&self) -> &dyn Any;
}

/// Immutable sampler state, only ever bound
pub trait SamplerState {
    fn as_any(&self) -> &dyn Any;
}

pub type BlendStateRef = RefCounted<dyn BlendState>;
pub type DepthStencilStateRef = RefCounted<dyn DepthStencilState>;
pub type RasterStateRef = RefCounted<dyn RasterState>;
pub type SamplerStateRef = RefCounted<dyn SamplerState>;
