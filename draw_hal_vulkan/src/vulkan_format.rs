/// Conversions from draw_hal enumerations to Vulkan values
///
/// Total over the enums; values Vulkan cannot express map to `None` and are
/// reported by the caller as creation failures.

use ash::vk;
use draw_hal::{
    BlendFactor, BlendOp, BorderColor, Comparison, CullMode, DataFormat, Facing, LogicOp, Primitive,
    ShaderStage, TextureAddressMode, TextureFilter, TextureType,
};

/// Convert DataFormat to a Vulkan format (textures and vertex attributes)
pub fn data_format_to_vk(format: DataFormat) -> Option<vk::Format> {
    let vk_format = match format {
        DataFormat::UNDEFINED => return None,

        DataFormat::R8_UNORM => vk::Format::R8_UNORM,
        DataFormat::R8G8_UNORM => vk::Format::R8G8_UNORM,
        DataFormat::R8G8B8_UNORM => vk::Format::R8G8B8_UNORM,
        DataFormat::R8G8B8A8_UNORM => vk::Format::R8G8B8A8_UNORM,
        DataFormat::R8G8B8A8_UNORM_SRGB => vk::Format::R8G8B8A8_SRGB,
        DataFormat::R8G8B8A8_SNORM => vk::Format::R8G8B8A8_SNORM,
        DataFormat::R8G8B8A8_UINT => vk::Format::R8G8B8A8_UINT,
        DataFormat::R8G8B8A8_SINT => vk::Format::R8G8B8A8_SINT,

        DataFormat::R4G4_UNORM => vk::Format::R4G4_UNORM_PACK8,
        DataFormat::R4G4B4A4_UNORM => vk::Format::R4G4B4A4_UNORM_PACK16,

        DataFormat::R16_FLOAT => vk::Format::R16_SFLOAT,
        DataFormat::R16G16_FLOAT => vk::Format::R16G16_SFLOAT,
        DataFormat::R16G16B16A16_FLOAT => vk::Format::R16G16B16A16_SFLOAT,

        DataFormat::R32_FLOAT => vk::Format::R32_SFLOAT,
        DataFormat::R32G32_FLOAT => vk::Format::R32G32_SFLOAT,
        DataFormat::R32G32B32_FLOAT => vk::Format::R32G32B32_SFLOAT,
        DataFormat::R32G32B32A32_FLOAT => vk::Format::R32G32B32A32_SFLOAT,

        // Block compression formats
        DataFormat::BC1_RGBA_UNORM_BLOCK => vk::Format::BC1_RGBA_UNORM_BLOCK,
        DataFormat::BC1_RGBA_SRGB_BLOCK => vk::Format::BC1_RGBA_SRGB_BLOCK,
        DataFormat::BC2_UNORM_BLOCK => vk::Format::BC2_UNORM_BLOCK,
        DataFormat::BC2_SRGB_BLOCK => vk::Format::BC2_SRGB_BLOCK,
        DataFormat::BC3_UNORM_BLOCK => vk::Format::BC3_UNORM_BLOCK,
        DataFormat::BC3_SRGB_BLOCK => vk::Format::BC3_SRGB_BLOCK,
        DataFormat::BC4_UNORM_BLOCK => vk::Format::BC4_UNORM_BLOCK,
        DataFormat::BC4_SNORM_BLOCK => vk::Format::BC4_SNORM_BLOCK,
        DataFormat::BC5_UNORM_BLOCK => vk::Format::BC5_UNORM_BLOCK,
        DataFormat::BC5_SNORM_BLOCK => vk::Format::BC5_SNORM_BLOCK,
        DataFormat::BC6H_UFLOAT_BLOCK => vk::Format::BC6H_UFLOAT_BLOCK,
        DataFormat::BC6H_SFLOAT_BLOCK => vk::Format::BC6H_SFLOAT_BLOCK,
        DataFormat::BC7_UNORM_BLOCK => vk::Format::BC7_UNORM_BLOCK,
        DataFormat::BC7_SRGB_BLOCK => vk::Format::BC7_SRGB_BLOCK,

        // ETC1 data is valid ETC2 RGB8 data
        DataFormat::ETC1 => vk::Format::ETC2_R8G8B8_UNORM_BLOCK,

        // Depth/stencil formats
        DataFormat::S8 => vk::Format::S8_UINT,
        DataFormat::D16 => vk::Format::D16_UNORM,
        DataFormat::D24_S8 => vk::Format::D24_UNORM_S8_UINT,
        DataFormat::D32F => vk::Format::D32_SFLOAT,
        DataFormat::D32F_S8 => vk::Format::D32_SFLOAT_S8_UINT,
    };
    Some(vk_format)
}

/// Image aspect touched by uploads and sampling for `format`
pub fn aspect_mask(format: DataFormat) -> vk::ImageAspectFlags {
    match format {
        DataFormat::S8 => vk::ImageAspectFlags::STENCIL,
        f if f.is_depth_stencil() => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Image type, view type and array layer count of a texture
pub fn texture_type_to_vk(
    texture_type: TextureType,
    depth: u32,
) -> Option<(vk::ImageType, vk::ImageViewType, u32)> {
    let layers = depth.max(1);
    match texture_type {
        TextureType::Unknown => None,
        TextureType::Linear1D => Some((vk::ImageType::TYPE_1D, vk::ImageViewType::TYPE_1D, 1)),
        TextureType::Linear2D => Some((vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D, 1)),
        TextureType::Linear3D => Some((vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D, 1)),
        TextureType::Cube => Some((vk::ImageType::TYPE_2D, vk::ImageViewType::CUBE, 6)),
        TextureType::Array1D => Some((vk::ImageType::TYPE_1D, vk::ImageViewType::TYPE_1D_ARRAY, layers)),
        TextureType::Array2D => Some((vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D_ARRAY, layers)),
    }
}

/// Convert ShaderStage to Vulkan shader stage flags
pub fn shader_stage_to_vk(stage: ShaderStage) -> vk::ShaderStageFlags {
    match stage {
        ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
        ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
        ShaderStage::Control => vk::ShaderStageFlags::TESSELLATION_CONTROL,
        ShaderStage::Evaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
    }
}

/// Convert Primitive to Vulkan topology
pub fn topology_to_vk(primitive: Primitive) -> vk::PrimitiveTopology {
    match primitive {
        Primitive::PointList => vk::PrimitiveTopology::POINT_LIST,
        Primitive::LineList => vk::PrimitiveTopology::LINE_LIST,
        Primitive::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        Primitive::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        Primitive::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        Primitive::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
        Primitive::PatchList => vk::PrimitiveTopology::PATCH_LIST,
        Primitive::LineListAdjacency => vk::PrimitiveTopology::LINE_LIST_WITH_ADJACENCY,
        Primitive::LineStripAdjacency => vk::PrimitiveTopology::LINE_STRIP_WITH_ADJACENCY,
        Primitive::TriangleListAdjacency => vk::PrimitiveTopology::TRIANGLE_LIST_WITH_ADJACENCY,
        Primitive::TriangleStripAdjacency => vk::PrimitiveTopology::TRIANGLE_STRIP_WITH_ADJACENCY,
    }
}

// ===== Pipeline state conversions =====

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face_to_vk(facing: Facing) -> vk::FrontFace {
    match facing {
        Facing::Ccw => vk::FrontFace::COUNTER_CLOCKWISE,
        Facing::Cw => vk::FrontFace::CLOCKWISE,
    }
}

pub fn compare_op_to_vk(op: Comparison) -> vk::CompareOp {
    match op {
        Comparison::Never => vk::CompareOp::NEVER,
        Comparison::Less => vk::CompareOp::LESS,
        Comparison::Equal => vk::CompareOp::EQUAL,
        Comparison::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        Comparison::Greater => vk::CompareOp::GREATER,
        Comparison::NotEqual => vk::CompareOp::NOT_EQUAL,
        Comparison::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        Comparison::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::FixedColor => vk::BlendFactor::CONSTANT_COLOR,
    }
}

pub fn blend_op_to_vk(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::RevSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn logic_op_to_vk(op: LogicOp) -> vk::LogicOp {
    match op {
        LogicOp::Clear => vk::LogicOp::CLEAR,
        LogicOp::Set => vk::LogicOp::SET,
        LogicOp::Copy => vk::LogicOp::COPY,
        LogicOp::CopyInverted => vk::LogicOp::COPY_INVERTED,
        LogicOp::Noop => vk::LogicOp::NO_OP,
        LogicOp::Invert => vk::LogicOp::INVERT,
        LogicOp::And => vk::LogicOp::AND,
        LogicOp::Nand => vk::LogicOp::NAND,
        LogicOp::Or => vk::LogicOp::OR,
        LogicOp::Nor => vk::LogicOp::NOR,
        LogicOp::Xor => vk::LogicOp::XOR,
        LogicOp::Equiv => vk::LogicOp::EQUIVALENT,
        LogicOp::AndReverse => vk::LogicOp::AND_REVERSE,
        LogicOp::AndInverted => vk::LogicOp::AND_INVERTED,
        LogicOp::OrReverse => vk::LogicOp::OR_REVERSE,
        LogicOp::OrInverted => vk::LogicOp::OR_INVERTED,
    }
}

// ===== Sampler conversions =====

pub fn filter_to_vk(filter: TextureFilter) -> vk::Filter {
    match filter {
        TextureFilter::Nearest => vk::Filter::NEAREST,
        TextureFilter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode_to_vk(filter: TextureFilter) -> vk::SamplerMipmapMode {
    match filter {
        TextureFilter::Nearest => vk::SamplerMipmapMode::NEAREST,
        TextureFilter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode_to_vk(mode: TextureAddressMode) -> vk::SamplerAddressMode {
    match mode {
        TextureAddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        TextureAddressMode::RepeatMirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        TextureAddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        TextureAddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn border_color_to_vk(color: BorderColor) -> vk::BorderColor {
    match color {
        BorderColor::DontCare | BorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        BorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        BorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

/// Unpack a 0xAABBGGRR color into normalized RGBA floats
pub fn unpack_color(color: u32) -> [f32; 4] {
    let channel = |shift: u32| ((color >> shift) & 0xFF) as f32 / 255.0;
    [channel(0), channel(8), channel(16), channel(24)]
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
