//! Stream parsing and reconstruction.

use super::{CodecError, BULK_FLAG, MAX_DELTA, RLE_FLAG};
use crate::raster::{Image, PixelData};

/// Row count recorded in a stream's header.
pub fn stream_height(bytes: &[u8]) -> Result<usize, CodecError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    let first = read_u32(bytes, 0)? as usize;
    if first == 0 || first % 4 != 0 || first > bytes.len() {
        return Err(CodecError::InvalidHeader(format!(
            "first row offset {} is not a valid header length",
            first
        )));
    }
    Ok(first / 4)
}

/// Decodes an entire stream into an S16 image.
pub fn decompress(bytes: &[u8]) -> Result<Image, CodecError> {
    let offsets = row_offsets(bytes)?;
    let height = offsets.len();
    let mut samples = Vec::new();
    let mut width = 0;

    for row in 0..height {
        let start = samples.len();
        decode_row_into(bytes, row_span(bytes, &offsets, row), &mut samples)?;
        let row_width = samples.len() - start;
        if row == 0 {
            width = row_width;
        } else if row_width != width {
            return Err(CodecError::RowWidthMismatch {
                row,
                expected: width,
                actual: row_width,
            });
        }
    }

    let width = u32::try_from(width).map_err(|_| CodecError::StreamTooLarge(width))?;
    let height = u32::try_from(height).map_err(|_| CodecError::StreamTooLarge(height))?;
    Image::from_data(width, height, PixelData::S16(samples))
        .map_err(|e| CodecError::InvalidHeader(e.to_string()))
}

/// Decodes a single row without touching the others.
pub fn decompress_row(bytes: &[u8], row: usize) -> Result<Vec<i16>, CodecError> {
    let offsets = row_offsets(bytes)?;
    if row >= offsets.len() {
        return Err(CodecError::RowOutOfRange {
            row,
            height: offsets.len(),
        });
    }
    let mut samples = Vec::new();
    decode_row_into(bytes, row_span(bytes, &offsets, row), &mut samples)?;
    Ok(samples)
}

fn row_offsets(bytes: &[u8]) -> Result<Vec<usize>, CodecError> {
    let height = stream_height(bytes)?;
    let mut offsets = Vec::with_capacity(height);
    let mut previous = height * 4;

    for row in 0..height {
        let offset = read_u32(bytes, row * 4)? as usize;
        if offset < previous || offset > bytes.len() {
            return Err(CodecError::InvalidHeader(format!(
                "row {} offset {} outside {}..={}",
                row,
                offset,
                previous,
                bytes.len()
            )));
        }
        offsets.push(offset);
        previous = offset;
    }
    Ok(offsets)
}

fn row_span(bytes: &[u8], offsets: &[usize], row: usize) -> (usize, usize) {
    let end = offsets.get(row + 1).copied().unwrap_or(bytes.len());
    (offsets[row], end)
}

fn decode_row_into(
    bytes: &[u8],
    (start, end): (usize, usize),
    out: &mut Vec<i16>,
) -> Result<(), CodecError> {
    let body = &bytes[..end];
    let mut pos = start;

    while pos < end {
        let flag = body[pos];
        let len = read_u16(body, pos + 1)? as usize;
        let value = read_i16(body, pos + 3)?;
        match flag {
            RLE_FLAG => {
                out.extend(std::iter::repeat(value).take(len));
                pos += 5;
            }
            BULK_FLAG => {
                let deltas_at = pos + 5;
                let deltas = body
                    .get(deltas_at..deltas_at + len)
                    .ok_or(CodecError::Truncated { offset: end })?;
                for (i, &delta) in deltas.iter().enumerate() {
                    let sample = value as i32 + delta as i32;
                    if delta as i32 > MAX_DELTA || sample > i16::MAX as i32 {
                        return Err(CodecError::InvalidDelta {
                            offset: deltas_at + i,
                            delta,
                        });
                    }
                    out.push(sample as i16);
                }
                pos = deltas_at + len;
            }
            other => {
                return Err(CodecError::InvalidFlag {
                    offset: pos,
                    flag: other,
                })
            }
        }
    }
    Ok(())
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, CodecError> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(CodecError::Truncated { offset: bytes.len() })
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16, CodecError> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(CodecError::Truncated { offset: bytes.len() })
}

fn read_i16(bytes: &[u8], at: usize) -> Result<i16, CodecError> {
    read_u16(bytes, at).map(|v| v as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hand_built_stream() {
        let bytes = vec![
            0, 0, 0, 8, 0, 0, 0, 13, //
            0xFE, 0, 3, 0xFF, 0xFE, //
            0xFF, 0, 3, 0, 10, 0, 5, 2,
        ];
        let image = decompress(&bytes).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.as_s16().unwrap(), &[-2, -2, -2, 10, 15, 12]);
    }

    #[test]
    fn test_empty_stream_is_empty_image() {
        let image = decompress(&[]).unwrap();
        assert_eq!(image.dimensions(), (0, 0));
    }

    #[test]
    fn test_truncated_segment() {
        let bytes = vec![0, 0, 0, 4, 0xFF, 0, 3, 0, 10, 0];
        assert!(matches!(
            decompress(&bytes),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_invalid_flag() {
        let bytes = vec![0, 0, 0, 4, 0x01, 0, 1, 0, 0];
        assert_eq!(
            decompress(&bytes),
            Err(CodecError::InvalidFlag {
                offset: 4,
                flag: 0x01
            })
        );
    }

    #[test]
    fn test_reserved_delta_rejected() {
        let bytes = vec![0, 0, 0, 4, 0xFF, 0, 1, 0, 0, 0xFF];
        assert!(matches!(
            decompress(&bytes),
            Err(CodecError::InvalidDelta { delta: 0xFF, .. })
        ));
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            decompress(&[0, 0, 0, 3, 0]),
            Err(CodecError::InvalidHeader(_))
        ));
        // second offset points before the first
        assert!(matches!(
            decompress(&[0, 0, 0, 8, 0, 0, 0, 4]),
            Err(CodecError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_row_width_mismatch() {
        let bytes = vec![
            0, 0, 0, 8, 0, 0, 0, 13, //
            0xFE, 0, 3, 0, 1, //
            0xFE, 0, 2, 0, 1,
        ];
        assert_eq!(
            decompress(&bytes),
            Err(CodecError::RowWidthMismatch {
                row: 1,
                expected: 3,
                actual: 2
            })
        );
    }
}
