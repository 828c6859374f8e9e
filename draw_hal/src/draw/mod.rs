/// Draw module - resource traits, descriptors and the context facade

pub mod format;
pub mod state;
pub mod buffer;
pub mod texture;
pub mod image_decoder;
pub mod texture_loader;
pub mod input_layout;
pub mod shader;
pub mod pipeline;
pub mod viewport;
pub mod draw_state;
pub mod presets;
pub mod draw_context;

#[cfg(test)]
pub mod mock_draw_context;

pub use format::*;
pub use state::*;
pub use buffer::*;
pub use texture::*;
pub use image_decoder::*;
pub use texture_loader::*;
pub use input_layout::*;
pub use shader::*;
pub use pipeline::*;
pub use viewport::*;
pub use draw_state::*;
pub use presets::*;
pub use draw_context::*;
