/// Texture trait, texture descriptor, upload regions and texture info

use std::any::Any;

use bitflags::bitflags;

use crate::draw::{full_mip_chain_levels, DataFormat, TextureType};
use crate::error::{Error, Result};
use crate::RefCounted;

/// Encoded image container kinds understood by the texture loaders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFileType {
    Png,
    Jpeg,
    /// Internal compressed container ("ZIMG" signature)
    Zim,
    /// Sniff the container from the data signature
    Detect,
    Unknown,
}

bitflags! {
    /// Deferred post-processing committed by `Texture::finalize`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FinalizeFlags: u32 {
        /// Derive levels 1.. from level 0 if they were not uploaded
        const GENERATE_MIPS = 1;
    }
}

// ===== TEXTURE DESC =====

/// Parameters of `Texture::create`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub texture_type: TextureType,
    pub format: DataFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
}

impl TextureDesc {
    /// Single-level 2D texture
    pub fn linear_2d(format: DataFormat, width: u32, height: u32) -> Self {
        Self {
            texture_type: TextureType::Linear2D,
            format,
            width,
            height,
            depth: 1,
            mip_levels: 1,
        }
    }

    /// Same texture with a full mip chain
    pub fn with_full_mip_chain(mut self) -> Self {
        let depth = if self.texture_type == TextureType::Linear3D { self.depth } else { 1 };
        self.mip_levels = full_mip_chain_levels(self.width, self.height, depth);
        self
    }
}

/// Sub-region of one mip level targeted by `Texture::set_image_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub level: u32,
}

impl TextureRegion {
    /// Whole extent of `level` for a texture described by `desc`
    pub fn full_level(desc: &TextureDesc, level: u32) -> Self {
        let (width, height, depth) = level_extent(desc.texture_type, desc.width, desc.height, desc.depth, level);
        Self {
            x: 0,
            y: 0,
            z: 0,
            width,
            height,
            depth,
            level,
        }
    }
}

/// Extent of mip `level`
///
/// The third component is the slice count for 3D textures and the layer
/// count for arrays and cubes; only 3D slices shrink with the level.
pub fn level_extent(texture_type: TextureType, width: u32, height: u32, depth: u32, level: u32) -> (u32, u32, u32) {
    let shrink = |v: u32| (v >> level).max(1);
    let third = match texture_type {
        TextureType::Linear3D => shrink(depth),
        TextureType::Cube => 6,
        TextureType::Array1D | TextureType::Array2D => depth.max(1),
        _ => 1,
    };
    (shrink(width), shrink(height), third)
}

// ===== TEXTURE INFO =====

/// Read-only properties of a texture
///
/// All dimensions read zero until `create` succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureInfo {
    pub texture_type: TextureType,
    pub format: DataFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    /// Set when the texture was loaded from a file
    pub filename: Option<String>,
}

impl TextureInfo {
    /// Info of a successfully created texture
    pub fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            texture_type: desc.texture_type,
            format: desc.format,
            width: desc.width,
            height: desc.height,
            depth: desc.depth.max(1),
            mip_levels: desc.mip_levels.max(1),
            filename: None,
        }
    }

    pub fn is_created(&self) -> bool {
        self.width > 0
    }
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// A texture may be created empty (`DrawContext::create_texture`) and
/// allocated later with [`create`](Texture::create).
pub trait Texture {
    /// Allocate backend storage
    ///
    /// Returns `Error::UnsupportedFormat` if the backend cannot allocate this
    /// format/type combination; the texture then stays uncreated.
    fn create(&mut self, desc: &TextureDesc) -> Result<()>;

    /// Upload a region of one mip level
    ///
    /// `row_stride` is the source row length in texels; 0 means tightly packed.
    fn set_image_data(&mut self, region: TextureRegion, row_stride: u32, data: &[u8]) -> Result<()>;

    /// Derive all levels above 0 with backend-native filtering
    ///
    /// Backends may defer the work to `finalize`; same effect as passing
    /// `FinalizeFlags::GENERATE_MIPS` there.
    fn auto_gen_mipmaps(&mut self) -> Result<()>;

    /// Commit deferred uploads and post-processing; call before first use
    fn finalize(&mut self, flags: FinalizeFlags) -> Result<()>;

    /// Current properties
    fn info(&self) -> &TextureInfo;

    /// Remember the file this texture was loaded from
    fn set_filename(&mut self, filename: String);

    fn as_any(&self) -> &dyn Any;

    fn width(&self) -> u32 {
        self.info().width
    }

    fn height(&self) -> u32 {
        self.info().height
    }

    fn depth(&self) -> u32 {
        self.info().depth
    }

    fn format(&self) -> DataFormat {
        self.info().format
    }

    fn texture_type(&self) -> TextureType {
        self.info().texture_type
    }

    fn mip_levels(&self) -> u32 {
        self.info().mip_levels
    }

    fn filename(&self) -> Option<&str> {
        self.info().filename.as_deref()
    }

    fn is_created(&self) -> bool {
        self.info().is_created()
    }
}

pub type TextureRef = RefCounted<dyn Texture>;

/// Validate an upload against a created texture
///
/// Shared by every backend so they agree on what a legal upload is.
pub fn check_image_upload(
    info: &TextureInfo,
    region: &TextureRegion,
    row_stride: u32,
    data_len: usize,
) -> Result<()> {
    if !info.is_created() {
        return Err(Error::InvalidState("set_image_data on an uncreated texture".to_string()));
    }
    if region.level >= info.mip_levels {
        return Err(Error::InvalidState(format!(
            "mip level {} out of range ({} levels)",
            region.level, info.mip_levels
        )));
    }

    let (level_width, level_height, level_depth) =
        level_extent(info.texture_type, info.width, info.height, info.depth, region.level);
    let fits = |start: u32, len: u32, limit: u32| start.checked_add(len).is_some_and(|end| end <= limit);
    if !fits(region.x, region.width, level_width)
        || !fits(region.y, region.height, level_height)
        || !fits(region.z, region.depth.max(1), level_depth)
    {
        return Err(Error::InvalidState(format!(
            "region {}x{}x{} at ({}, {}, {}) exceeds level {} extent {}x{}x{}",
            region.width, region.height, region.depth, region.x, region.y, region.z,
            region.level, level_width, level_height, level_depth
        )));
    }

    let required = upload_size(info.format, region, row_stride);
    if data_len < required {
        return Err(Error::SizeMismatch {
            expected: required,
            actual: data_len,
        });
    }
    Ok(())
}

/// Bytes read from the source for an upload of `region`
pub fn upload_size(format: DataFormat, region: &TextureRegion, row_stride: u32) -> usize {
    if format.is_block_compressed() || row_stride == 0 || row_stride <= region.width {
        return format.region_size(region.width, region.height, region.depth);
    }
    let bpp = format.bytes_per_pixel() as usize;
    let row_pitch = row_stride as usize * bpp;
    let rows = region.height.max(1) as usize * region.depth.max(1) as usize;
    row_pitch * (rows - 1) + region.width as usize * bpp
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
