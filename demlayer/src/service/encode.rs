//! Response body encoding.

use super::format::ContentType;
use crate::codec;
use crate::raster::{EncodedKind, Image, PixelData, PixelType, Sample};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{content_type} cannot carry {pixel_type} pixels")]
    Unsupported {
        content_type: ContentType,
        pixel_type: PixelType,
    },

    #[error("PNG encoding failed: {0}")]
    Png(#[from] ::image::ImageError),

    #[error("Elevation encoding failed: {0}")]
    Codec(#[from] codec::CodecError),
}

/// Encode `image` as `content_type`.
///
/// When the image already carries an encoded form of the matching kind
/// (e.g. a cached `.elev` tile) those bytes are returned as they are.
pub fn encode(
    image: &mut Image,
    content_type: ContentType,
    invalid: f64,
) -> Result<Vec<u8>, EncodeError> {
    let wanted = match content_type {
        ContentType::Png => EncodedKind::Png,
        ContentType::Elevation => EncodedKind::Elevation,
        ContentType::RawS16 | ContentType::RawU8 | ContentType::RawU32 => EncodedKind::Raw,
    };
    if let Some(encoded) = image.take_encoded() {
        if encoded.kind == wanted {
            return Ok(encoded.bytes);
        }
    }

    match content_type {
        ContentType::Png => encode_png(image),
        ContentType::Elevation => Ok(codec::compress(image, i16::from_f64(invalid))?),
        ContentType::RawS16 | ContentType::RawU8 | ContentType::RawU32 => Ok(image.raw_bytes()),
    }
}

fn encode_png(image: &Image) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = image.dimensions();
    let unsupported = || EncodeError::Unsupported {
        content_type: ContentType::Png,
        pixel_type: image.pixel_type(),
    };
    let dynamic = match image.data() {
        PixelData::U8(v) => ::image::GrayImage::from_raw(width, height, v.clone())
            .map(::image::DynamicImage::ImageLuma8),
        PixelData::Rgba8(v) => {
            ::image::RgbaImage::from_raw(width, height, v.iter().flatten().copied().collect())
                .map(::image::DynamicImage::ImageRgba8)
        }
        // packed little-endian RGBA
        PixelData::U32(v) => ::image::RgbaImage::from_raw(
            width,
            height,
            v.iter().flat_map(|p| p.to_le_bytes()).collect(),
        )
        .map(::image::DynamicImage::ImageRgba8),
        _ => None,
    }
    .ok_or_else(unsupported)?;

    let mut cursor = Cursor::new(Vec::new());
    dynamic.write_to(&mut cursor, ::image::ImageFormat::Png)?;
    Ok(cursor.into_inner())
}
