/// Viewport, scissor rectangle, clear flags and info queries

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

/// Viewport rectangle with depth range
///
/// Field order and layout are fixed; backends forward it field for field.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Viewport {
    pub top_left_x: f32,
    pub top_left_y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with the standard 0..1 depth range
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            top_left_x: 0.0,
            top_left_y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle in target pixels, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

bitflags! {
    /// Planes cleared by `DrawContext::clear`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1;
        const DEPTH = 2;
        const STENCIL = 4;
    }
}

/// Fields answered by `DrawContext::info_string`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoField {
    ApiName,
    ApiVersion,
    VendorString,
    Vendor,
    ShadeLangVersion,
    Renderer,
}

#[cfg(test)]
#[path = "viewport_tests.rs"]
mod tests;
