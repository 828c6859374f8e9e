/*!
# draw_hal_vulkan - Vulkan backend for draw_hal

Vulkan 1.3 implementation of the draw_hal traits, using the Ash library for
Vulkan bindings and gpu-allocator for memory management. Rendering uses
dynamic rendering, so there are no render pass or framebuffer objects.

The backend does not create the instance, device or swap chain: the
application creates them and wraps them in [`VulkanHandles`].

```no_run
use draw_hal::DrawContext;
use draw_hal_vulkan::{VulkanConfig, VulkanDrawContext, VulkanHandles};

# fn run(handles: VulkanHandles) -> draw_hal::Result<()> {
let mut ctx = VulkanDrawContext::new(handles, VulkanConfig::default())?;
println!("{}", ctx.info_string(draw_hal::InfoField::Renderer));
# Ok(())
# }
```
*/

mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_texture;
mod vulkan_state;
mod vulkan_shader;
mod vulkan_input_layout;
mod vulkan_pipeline;
mod vulkan_draw_context;

pub use vulkan_context::{GpuContext, VulkanHandles};
pub use vulkan_draw_context::{RenderTarget, VulkanConfig, VulkanDrawContext};
pub use vulkan_shader::{reflect_shader, BindingKind, NagaGlslCompiler, Reflection, ShaderBinding, ShaderCompiler};

// Resource types, for applications that downcast through `as_any`
pub use vulkan_buffer::VulkanBuffer;
pub use vulkan_texture::VulkanTexture;
pub use vulkan_state::{VulkanBlendState, VulkanDepthStencilState, VulkanRasterState, VulkanSamplerState};
pub use vulkan_shader::VulkanShaderModule;
pub use vulkan_input_layout::VulkanInputLayout;
pub use vulkan_pipeline::VulkanPipeline;

// Re-export ash so applications build their handles against the same version
pub use ash;
