use image::{ImageFormat, load_from_memory, load_from_memory_with_format};

use crate::{data_structures::geometry::TextureData, errors::ParseError};

/**
 * Decodes an encoded image (PNG, JPEG, ...) into RGBA8 pixels.
 *
 * The mime type, when known, is used instead of guessing the format from the
 * leading bytes.
 */
pub fn decode_texture(
    bytes: &[u8],
    name: &str,
    mime_type: Option<&str>,
) -> Result<TextureData, ParseError> {
    let image = match mime_type.and_then(ImageFormat::from_mime_type) {
        Some(format) => load_from_memory_with_format(bytes, format),
        None => load_from_memory(bytes),
    }
    .map_err(|e| ParseError::Image(format!("{}: {}", name, e)))?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureData {
        name: name.to_string(),
        width,
        height,
        rgba: rgba.into_raw(),
    })
}
