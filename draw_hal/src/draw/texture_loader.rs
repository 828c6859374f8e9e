/// Texture loading from encoded image files

use std::path::Path;

use crate::draw::{
    full_mip_chain_levels, FinalizeFlags, ImageDecoder, ImageFileType, Texture, TextureDesc,
    TextureRegion, TextureType,
};
use crate::error::{Error, Result};
use crate::hal_debug;

/// Decode `data` and upload it into `texture`
///
/// The texture is (re)created as a 2D texture in the decoded format. When the
/// decoder asks for mipmaps the texture gets a full chain and levels past
/// the decoded ones are generated by the backend.
pub fn load_from_file_data(
    texture: &mut dyn Texture,
    decoder: &dyn ImageDecoder,
    data: &[u8],
    file_type: ImageFileType,
) -> Result<()> {
    let file_type = match file_type {
        ImageFileType::Detect => decoder.detect(data).ok_or(Error::ImageDetectionFailed)?,
        other => other,
    };
    let image = decoder.decode(data, file_type)?;
    if image.levels.is_empty() {
        return Err(Error::ImageDecodeFailed("decoder produced no image levels".to_string()));
    }

    let decoded_levels = image.levels.len() as u32;
    let mip_levels = if image.generate_mips {
        full_mip_chain_levels(image.width, image.height, 1).max(decoded_levels)
    } else {
        decoded_levels
    };
    let desc = TextureDesc {
        texture_type: TextureType::Linear2D,
        format: image.format,
        width: image.width,
        height: image.height,
        depth: 1,
        mip_levels,
    };
    texture.create(&desc)?;

    for (level, pixels) in image.levels.iter().enumerate() {
        texture.set_image_data(TextureRegion::full_level(&desc, level as u32), 0, pixels)?;
    }
    if mip_levels > decoded_levels {
        texture.auto_gen_mipmaps()?;
    }
    texture.finalize(FinalizeFlags::empty())?;

    hal_debug!(
        "draw_hal::texture_loader",
        "Loaded {:?} image {}x{} ({} levels)",
        file_type,
        image.width,
        image.height,
        mip_levels
    );
    Ok(())
}

/// Read `path` and load it with [`load_from_file_data`]
///
/// On success the texture remembers the path as its filename.
pub fn load_from_file(
    texture: &mut dyn Texture,
    decoder: &dyn ImageDecoder,
    path: &Path,
    file_type: ImageFileType,
) -> Result<()> {
    let data = std::fs::read(path).map_err(|e| {
        Error::InvalidResource(format!("cannot read image file '{}': {}", path.display(), e))
    })?;
    load_from_file_data(texture, decoder, &data, file_type)?;
    texture.set_filename(path.display().to_string());
    Ok(())
}
