/*!
# draw_hal

Thin drawing hardware-abstraction layer.

This crate provides the backend-agnostic API: one trait per GPU resource kind,
plain descriptors, and the [`DrawContext`] facade through which resources are
created, bound and drawn. Backends (see `draw_hal_vulkan`) provide the
concrete types.

## Architecture

- **RefCounted**: manually reference-counted handle shared by every resource
- **DrawContext**: resource factories, binding state, draw submission
- **Buffer / Texture / Pipeline / ShaderModule / InputLayout**: resource traits
- **BlendState / DepthStencilState / RasterState / SamplerState**: frozen states
- **Presets**: built-in shaders each context compiles at construction
*/

// Internal modules
mod error;
mod ref_counted;
pub mod log;
pub mod draw;

#[cfg(test)]
mod test_utils;

// Error types
pub use error::{Error, Result};

// Lifetime primitive
pub use ref_counted::{RefCounted, REF_COUNT_SENTINEL};

// Drawing API
pub use draw::*;

// Re-export math library at crate root
pub use glam;
