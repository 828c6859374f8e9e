/// Image decoding collaborator used by the file texture loaders

use crate::draw::{DataFormat, ImageFileType};
use crate::error::{Error, Result};

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const ZIM_SIGNATURE: &[u8] = b"ZIMG";

/// Decoded image ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: DataFormat,
    /// Tightly packed pixel data, level 0 first
    pub levels: Vec<Vec<u8>>,
    /// The loader should derive the remaining mip levels on the GPU
    pub generate_mips: bool,
}

/// Image container detection and decoding
///
/// Implemented by `ImageCrateDecoder`; replace it on a context with
/// `DrawContext::set_image_decoder` to support other containers.
pub trait ImageDecoder {
    /// Identify the container from its leading bytes
    fn detect(&self, data: &[u8]) -> Option<ImageFileType>;

    /// Decode `data` as `file_type` (never `Detect`)
    fn decode(&self, data: &[u8], file_type: ImageFileType) -> Result<DecodedImage>;
}

/// Default decoder backed by the `image` crate (PNG, JPEG)
///
/// ZIM data is recognized but not decodable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn detect(&self, data: &[u8]) -> Option<ImageFileType> {
        if data.starts_with(ZIM_SIGNATURE) {
            return Some(ImageFileType::Zim);
        }
        if data.starts_with(PNG_SIGNATURE) {
            return Some(ImageFileType::Png);
        }
        if data.starts_with(JPEG_SIGNATURE) {
            return Some(ImageFileType::Jpeg);
        }
        None
    }

    fn decode(&self, data: &[u8], file_type: ImageFileType) -> Result<DecodedImage> {
        let format = match file_type {
            ImageFileType::Png => image::ImageFormat::Png,
            ImageFileType::Jpeg => image::ImageFormat::Jpeg,
            ImageFileType::Zim => {
                return Err(Error::ImageDecodeFailed(
                    "ZIM containers are not supported by this decoder".to_string(),
                ))
            }
            ImageFileType::Detect | ImageFileType::Unknown => {
                return Err(Error::ImageDecodeFailed(format!(
                    "cannot decode image of type {:?}",
                    file_type
                )))
            }
        };

        let decoded = image::load_from_memory_with_format(data, format)
            .map_err(|e| Error::ImageDecodeFailed(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(DecodedImage {
            width,
            height,
            format: DataFormat::R8G8B8A8_UNORM,
            levels: vec![rgba.into_raw()],
            generate_mips: true,
        })
    }
}

#[cfg(test)]
#[path = "image_decoder_tests.rs"]
mod tests;
