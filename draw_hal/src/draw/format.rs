/// Pixel/vertex data formats and texture types

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    Unknown,
    Linear1D,
    Linear2D,
    Linear3D,
    Cube,
    Array1D,
    Array2D,
}

/// Pixel and vertex attribute data format
///
/// Used for texture storage, decoded images and vertex components alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(non_camel_case_types)]
pub enum DataFormat {
    #[default]
    UNDEFINED,

    R8_UNORM,
    R8G8_UNORM,
    R8G8B8_UNORM,

    R8G8B8A8_UNORM,
    R8G8B8A8_UNORM_SRGB,

    R8G8B8A8_SNORM,
    R8G8B8A8_UINT,
    R8G8B8A8_SINT,

    R4G4_UNORM,
    R4G4B4A4_UNORM,

    R16_FLOAT,
    R16G16_FLOAT,
    R16G16B16A16_FLOAT,

    R32_FLOAT,
    R32G32_FLOAT,
    R32G32B32_FLOAT,
    R32G32B32A32_FLOAT,

    // Block compression formats (4x4 blocks)
    BC1_RGBA_UNORM_BLOCK,
    BC1_RGBA_SRGB_BLOCK,
    BC2_UNORM_BLOCK,
    BC2_SRGB_BLOCK,
    BC3_UNORM_BLOCK,
    BC3_SRGB_BLOCK,
    BC4_UNORM_BLOCK,
    BC4_SNORM_BLOCK,
    BC5_UNORM_BLOCK,
    BC5_SNORM_BLOCK,
    BC6H_UFLOAT_BLOCK,
    BC6H_SFLOAT_BLOCK,
    BC7_UNORM_BLOCK,
    BC7_SRGB_BLOCK,

    ETC1,

    S8,
    D16,
    D24_S8,
    D32F,
    D32F_S8,
}

impl DataFormat {
    /// Bytes per texel for uncompressed formats, 0 for block formats and UNDEFINED
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            DataFormat::UNDEFINED => 0,
            DataFormat::R8_UNORM | DataFormat::R4G4_UNORM | DataFormat::S8 => 1,
            DataFormat::R8G8_UNORM
            | DataFormat::R4G4B4A4_UNORM
            | DataFormat::R16_FLOAT
            | DataFormat::D16 => 2,
            DataFormat::R8G8B8_UNORM => 3,
            DataFormat::R8G8B8A8_UNORM
            | DataFormat::R8G8B8A8_UNORM_SRGB
            | DataFormat::R8G8B8A8_SNORM
            | DataFormat::R8G8B8A8_UINT
            | DataFormat::R8G8B8A8_SINT
            | DataFormat::R16G16_FLOAT
            | DataFormat::R32_FLOAT
            | DataFormat::D24_S8
            | DataFormat::D32F => 4,
            DataFormat::R16G16B16A16_FLOAT | DataFormat::R32G32_FLOAT | DataFormat::D32F_S8 => 8,
            DataFormat::R32G32B32_FLOAT => 12,
            DataFormat::R32G32B32A32_FLOAT => 16,
            _ => 0,
        }
    }

    /// Bytes per 4x4 block for block-compressed formats
    pub fn block_bytes(&self) -> Option<u32> {
        match self {
            DataFormat::BC1_RGBA_UNORM_BLOCK
            | DataFormat::BC1_RGBA_SRGB_BLOCK
            | DataFormat::BC4_UNORM_BLOCK
            | DataFormat::BC4_SNORM_BLOCK
            | DataFormat::ETC1 => Some(8),
            DataFormat::BC2_UNORM_BLOCK
            | DataFormat::BC2_SRGB_BLOCK
            | DataFormat::BC3_UNORM_BLOCK
            | DataFormat::BC3_SRGB_BLOCK
            | DataFormat::BC5_UNORM_BLOCK
            | DataFormat::BC5_SNORM_BLOCK
            | DataFormat::BC6H_UFLOAT_BLOCK
            | DataFormat::BC6H_SFLOAT_BLOCK
            | DataFormat::BC7_UNORM_BLOCK
            | DataFormat::BC7_SRGB_BLOCK => Some(16),
            _ => None,
        }
    }

    /// Returns true for 4x4 block-compressed formats (BCn, ETC1)
    pub fn is_block_compressed(&self) -> bool {
        self.block_bytes().is_some()
    }

    /// Returns true for depth and/or stencil formats
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            DataFormat::S8 | DataFormat::D16 | DataFormat::D24_S8 | DataFormat::D32F | DataFormat::D32F_S8
        )
    }

    /// Size in bytes of a tightly packed region of this format
    pub fn region_size(&self, width: u32, height: u32, depth: u32) -> usize {
        let (width, height, depth) = (width as usize, height as usize, depth.max(1) as usize);
        match self.block_bytes() {
            Some(block) => width.div_ceil(4) * height.div_ceil(4) * block as usize * depth,
            None => width * height * depth * self.bytes_per_pixel() as usize,
        }
    }
}

/// Number of levels in a full mip chain for the given extent
pub fn full_mip_chain_levels(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    32 - largest.leading_zeros()
}
