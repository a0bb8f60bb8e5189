//! Lossless row-wise codec for 16-bit elevation rasters.
//!
//! # Stream layout
//!
//! ```text
//! header   : height × u32 BE    absolute byte offset of each row's segments
//! row body : segment*
//!   RLE    : 0xFE  len:u16 BE  value:i16 BE
//!   bulk   : 0xFF  len:u16 BE  reference:i16 BE  len × u8 delta
//! ```
//!
//! The first header offset is always `4 * height`, which lets a decoder
//! recover the row count from the stream alone. Bulk deltas are
//! `value - reference` in `0..=254` with the chunk minimum as reference.
//! Any row can be decoded without touching the rows before it.

mod decode;
mod encode;

pub use decode::{decompress, decompress_row, stream_height};
pub use encode::{compress, compress_s16};

use crate::raster::PixelType;
use thiserror::Error;

/// Segment flag for a run of one repeated value.
pub const RLE_FLAG: u8 = 0xFE;

/// Segment flag for reference-anchored byte deltas.
pub const BULK_FLAG: u8 = 0xFF;

/// Longest segment the u16 length field can describe.
pub const MAX_SEGMENT_LEN: usize = u16::MAX as usize;

/// Largest delta a bulk segment may store (0xFF is reserved).
pub const MAX_DELTA: i32 = 254;

/// RLE runs this short (and not the sentinel) are folded into a neighbouring
/// bulk segment.
pub const SHORT_RUN_LEN: usize = 5;

/// Codec errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Only S16 rasters can be encoded
    #[error("Elevation codec requires s16 pixels, got {0}")]
    UnsupportedPixelType(PixelType),

    /// Sample slice does not match the stated dimensions
    #[error("Expected {expected} samples, got {actual}")]
    SampleCount { expected: usize, actual: usize },

    /// Encoded stream exceeds the u32 offset range
    #[error("Encoded stream too large ({0} bytes)")]
    StreamTooLarge(usize),

    /// Stream ended inside a header or segment
    #[error("Truncated stream at byte {offset}")]
    Truncated { offset: usize },

    /// Header offsets are inconsistent
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Unknown segment flag byte
    #[error("Invalid segment flag 0x{flag:02X} at byte {offset}")]
    InvalidFlag { offset: usize, flag: u8 },

    /// Bulk delta outside 0..=254 or overflowing i16
    #[error("Invalid delta {delta} at byte {offset}")]
    InvalidDelta { offset: usize, delta: u8 },

    /// Requested row beyond the stream's row count
    #[error("Row {row} out of range (height {height})")]
    RowOutOfRange { row: usize, height: usize },

    /// Rows decode to different widths
    #[error("Row {row} decodes to {actual} samples, expected {expected}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
}
