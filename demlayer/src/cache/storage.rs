//! Tile file encoding and atomic writes.
//!
//! A tile is either a compressed raster or a zero-byte marker meaning the
//! tile holds no data. Both are written to a temp file first and renamed
//! into place, so an interrupted write never leaves a truncated tile that a
//! later scan would take for `Present`.

use super::descriptor::TileCacheDescriptor;
use super::path::{temp_path, tile_path};
use super::types::{CacheError, Compression};
use crate::codec;
use crate::coord::TileCoord;
use crate::raster::{Encoded, EncodedKind, Image, PixelData, Sample};
use std::fs;

/// Serialize a tile with the descriptor's compression.
pub fn encode_tile(desc: &TileCacheDescriptor, image: &Image) -> Result<Vec<u8>, CacheError> {
    match desc.compression {
        Compression::Raw => Ok(image.raw_bytes()),
        Compression::Elevation => Ok(codec::compress(
            image,
            i16::from_f64(desc.invalid_value),
        )?),
    }
}

/// Parse a stored tile. The stored bytes are kept as the image's encoded
/// form so the serving path can pass them through untouched.
pub fn decode_tile(
    desc: &TileCacheDescriptor,
    coord: TileCoord,
    bytes: Vec<u8>,
) -> Result<Image, CacheError> {
    let edge = desc.tile_pixels();
    let (mut image, kind) = match desc.compression {
        Compression::Raw => {
            let image = Image::from_le_bytes(edge, edge, desc.pixel_type(), &bytes).map_err(
                |e| CacheError::Corrupt {
                    tile: coord,
                    reason: e.to_string(),
                },
            )?;
            (image, EncodedKind::Raw)
        }
        Compression::Elevation => {
            let image = codec::decompress(&bytes).map_err(|e| CacheError::Corrupt {
                tile: coord,
                reason: e.to_string(),
            })?;
            if image.dimensions() != (edge, edge) {
                return Err(CacheError::Corrupt {
                    tile: coord,
                    reason: format!(
                        "decoded {}x{}, expected {}x{}",
                        image.width(),
                        image.height(),
                        edge,
                        edge
                    ),
                });
            }
            (image, EncodedKind::Elevation)
        }
    };
    image.set_encoded(Encoded::new(kind, bytes));
    Ok(image)
}

/// Whether every pixel equals the sentinel.
pub fn is_all_invalid(image: &Image, invalid: f64) -> bool {
    fn all<T: Sample>(samples: &[T], invalid: f64) -> bool {
        let sentinel = T::from_f64(invalid);
        samples.iter().all(|&s| s == sentinel)
    }

    match image.data() {
        PixelData::U8(v) => all(v, invalid),
        PixelData::S16(v) => all(v, invalid),
        PixelData::U32(v) => all(v, invalid),
        PixelData::F32(v) => all(v, invalid),
        PixelData::F64(v) => all(v, invalid),
        PixelData::Rgba8(v) => {
            let c = u8::from_f64(invalid);
            v.iter().all(|p| *p == [c; 4])
        }
    }
}

/// Write a tile (or, for `None`, a zero-byte marker) via temp file and rename.
pub fn write_tile(
    desc: &TileCacheDescriptor,
    coord: TileCoord,
    bytes: Option<&[u8]>,
) -> Result<(), CacheError> {
    let path = tile_path(desc, coord);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = temp_path(&path);
    fs::write(&temp, bytes.unwrap_or_default())?;
    if let Err(e) = fs::rename(&temp, &path) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

/// Async counterpart of [`write_tile`] for the builder's fetch workers.
pub async fn store_tile(
    desc: &TileCacheDescriptor,
    coord: TileCoord,
    bytes: Option<Vec<u8>>,
) -> Result<(), CacheError> {
    let path = tile_path(desc, coord);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let temp = temp_path(&path);
    tokio::fs::write(&temp, bytes.unwrap_or_default()).await?;
    if let Err(e) = tokio::fs::rename(&temp, &path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Read a tile file. A zero-length result is an empty marker.
pub fn read_tile(desc: &TileCacheDescriptor, coord: TileCoord) -> Result<Vec<u8>, CacheError> {
    Ok(fs::read(tile_path(desc, coord))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::descriptor::tests::test_descriptor;
    use crate::raster::PixelType;
    use tempfile::TempDir;

    fn tile(values: impl Fn(usize) -> i16) -> Image {
        let samples: Vec<i16> = (0..36).map(values).collect();
        Image::from_data(6, 6, PixelData::S16(samples)).unwrap()
    }

    #[test]
    fn test_encode_decode_elevation() {
        let temp = TempDir::new().unwrap();
        let desc = test_descriptor(temp.path(), Compression::Elevation);
        let image = tile(|i| (i as i16) * 3 - 40);

        let bytes = encode_tile(&desc, &image).unwrap();
        let decoded = decode_tile(&desc, TileCoord::new(1, 0, 0), bytes.clone()).unwrap();

        assert_eq!(decoded.data(), image.data());
        let encoded = decoded.encoded().unwrap();
        assert_eq!(encoded.kind, EncodedKind::Elevation);
        assert_eq!(encoded.bytes, bytes);
    }

    #[test]
    fn test_decode_raw_wrong_size_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let desc = test_descriptor(temp.path(), Compression::Raw);
        let result = decode_tile(&desc, TileCoord::new(1, 0, 0), vec![0; 10]);
        assert!(matches!(result, Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_decode_elevation_wrong_dimensions_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let desc = test_descriptor(temp.path(), Compression::Elevation);
        let bytes = codec::compress_s16(&[1, 2, 3, 4], 2, 2, -32768).unwrap();
        let result = decode_tile(&desc, TileCoord::new(1, 0, 0), bytes);
        assert!(matches!(result, Err(CacheError::Corrupt { .. })));
    }

    #[test]
    fn test_is_all_invalid() {
        let all = Image::filled(3, 3, PixelType::S16, -32768.0);
        assert!(is_all_invalid(&all, -32768.0));

        let mut one = all.clone();
        one.as_s16_mut().unwrap()[4] = 12;
        assert!(!is_all_invalid(&one, -32768.0));
    }

    #[test]
    fn test_write_and_read_tile() {
        let temp = TempDir::new().unwrap();
        let desc = test_descriptor(temp.path(), Compression::Raw);
        let coord = TileCoord::new(1, 2, 1);

        write_tile(&desc, coord, Some(&[1u8, 2, 3][..])).unwrap();
        assert_eq!(read_tile(&desc, coord).unwrap(), vec![1, 2, 3]);
        assert!(!temp_path(&tile_path(&desc, coord)).exists());

        write_tile(&desc, coord, None).unwrap();
        assert!(read_tile(&desc, coord).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_tile_marker() {
        let temp = TempDir::new().unwrap();
        let desc = test_descriptor(temp.path(), Compression::Raw);
        let coord = TileCoord::new(0, 1, 0);

        store_tile(&desc, coord, None).await.unwrap();
        let meta = fs::metadata(tile_path(&desc, coord)).unwrap();
        assert_eq!(meta.len(), 0);
    }
}
