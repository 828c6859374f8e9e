/// Vertex input layout trait and its descriptor

use std::any::Any;

use crate::draw::DataFormat;
use crate::RefCounted;

/// Meaning of a vertex component, mapped to shader attribute locations by backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Color0,
    TexCoord0,
    TexCoord1,
    Normal,
    Tangent,
    Binormal,
}

impl Semantic {
    /// Conventional attribute location used by the preset shaders
    pub fn location(&self) -> u32 {
        match self {
            Semantic::Position => 0,
            Semantic::Color0 => 1,
            Semantic::TexCoord0 => 2,
            Semantic::TexCoord1 => 3,
            Semantic::Normal => 4,
            Semantic::Tangent => 5,
            Semantic::Binormal => 6,
        }
    }
}

/// One attribute inside an interleaved vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexComponent {
    pub name: String,
    pub semantic: Semantic,
    pub format: DataFormat,
    /// Byte offset inside the vertex
    pub offset: u32,
}

impl VertexComponent {
    pub fn new(name: impl Into<String>, semantic: Semantic, format: DataFormat, offset: u32) -> Self {
        Self {
            name: name.into(),
            semantic,
            format,
            offset,
        }
    }
}

/// Descriptor for `DrawContext::create_input_layout`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexFormatDesc {
    pub components: Vec<VertexComponent>,
    /// Bytes between consecutive vertices
    pub stride: u32,
}

/// Input layout resource trait
pub trait InputLayout {
    /// True if vertices must come from a GPU buffer (no `draw_user`)
    fn requires_buffer(&self) -> bool;

    fn stride(&self) -> u32;

    fn components(&self) -> &[VertexComponent];

    fn as_any(&self) -> &dyn Any;
}

pub type InputLayoutRef = RefCounted<dyn InputLayout>;
