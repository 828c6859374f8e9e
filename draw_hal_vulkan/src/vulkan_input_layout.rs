/// Vertex input layout for the Vulkan backend
///
/// Vertices always come from binding 0; attribute locations follow the
/// component semantics. Caller-memory draws are streamed through a ring
/// buffer, so no layout requires a GPU buffer.

use std::any::Any;

use ash::vk;
use draw_hal::{
    DataFormat, Error, InputLayout, Result, TextureType, VertexComponent, VertexFormatDesc,
};

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::data_format_to_vk;

pub struct VulkanInputLayout {
    desc: VertexFormatDesc,
    pub(crate) attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VulkanInputLayout {
    /// Translate `desc`, rejecting formats the device cannot fetch as vertex data
    pub fn new(ctx: &GpuContext, desc: VertexFormatDesc) -> Result<Self> {
        let attributes = vertex_attributes(&desc.components)?;
        for (attribute, component) in attributes.iter().zip(&desc.components) {
            if !ctx
                .buffer_format_features(attribute.format)
                .contains(vk::FormatFeatureFlags::VERTEX_BUFFER)
            {
                return Err(unsupported_vertex_format(component.format));
            }
        }
        Ok(Self { desc, attributes })
    }

    pub(crate) fn binding(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.desc.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }
}

impl InputLayout for VulkanInputLayout {
    fn requires_buffer(&self) -> bool {
        false
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

/// Attribute descriptions of `components`, all on binding 0
pub fn vertex_attributes(components: &[VertexComponent]) -> Result<Vec<vk::VertexInputAttributeDescription>> {
    components
        .iter()
        .map(|component| {
            if component.format.is_block_compressed() || component.format.is_depth_stencil() {
                return Err(unsupported_vertex_format(component.format));
            }
            let format = data_format_to_vk(component.format).ok_or(unsupported_vertex_format(component.format))?;
            Ok(vk::VertexInputAttributeDescription {
                location: component.semantic.location(),
                binding: 0,
                format,
                offset: component.offset,
            })
        })
        .collect()
}

fn unsupported_vertex_format(format: DataFormat) -> Error {
    Error::UnsupportedFormat {
        texture_type: TextureType::Unknown,
        format,
    }
}

#[cfg(test)]
#[path = "vulkan_input_layout_tests.rs"]
mod tests;
