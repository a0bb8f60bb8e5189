//! Core types for the tile cache.

use crate::codec::CodecError;
use crate::coord::TileCoord;
use crate::raster::RasterError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// On-disk tile encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Little-endian pixel dump, `.raw`
    Raw,
    /// Elevation codec stream (S16 only), `.elev`
    Elevation,
}

impl Compression {
    /// File extension including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Compression::Raw => ".raw",
            Compression::Elevation => ".elev",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::Raw => f.write_str("raw"),
            Compression::Elevation => f.write_str("elevation"),
        }
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(Compression::Raw),
            "elevation" | "elev" => Ok(Compression::Elevation),
            other => Err(format!("unknown compression '{}'", other)),
        }
    }
}

/// State of one tile slot.
///
/// `Failed` is only ever held in memory; a restart re-derives it as `Missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileStatus {
    /// No file on disk
    Missing = 0,
    /// Zero-byte marker: tile confirmed to hold no data
    EmptyConfirmed = 1,
    /// Non-empty tile file on disk
    Present = 2,
    /// Upstream fetch gave up after bounded retries
    Failed = 3,
}

impl FileStatus {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => FileStatus::EmptyConfirmed,
            2 => FileStatus::Present,
            3 => FileStatus::Failed,
            _ => FileStatus::Missing,
        }
    }

    /// Whether a file (data or marker) exists for this slot.
    pub fn is_on_disk(self) -> bool {
        matches!(self, FileStatus::EmptyConfirmed | FileStatus::Present)
    }
}

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tile file could not be decoded
    #[error("Corrupt tile {tile}: {reason}")]
    Corrupt { tile: TileCoord, reason: String },

    #[error("Tile codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Tile buffer error: {0}")]
    Raster(#[from] RasterError),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// A builder or fold task panicked or was aborted
    #[error("Builder task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_roundtrip_names() {
        for c in [Compression::Raw, Compression::Elevation] {
            assert_eq!(c.to_string().parse::<Compression>(), Ok(c));
        }
        assert_eq!(Compression::Elevation.extension(), ".elev");
        assert!("zip".parse::<Compression>().is_err());
    }

    #[test]
    fn test_file_status_from_u8() {
        for status in [
            FileStatus::Missing,
            FileStatus::EmptyConfirmed,
            FileStatus::Present,
            FileStatus::Failed,
        ] {
            assert_eq!(FileStatus::from_u8(status as u8), status);
        }
        assert_eq!(FileStatus::from_u8(200), FileStatus::Missing);
    }
}
