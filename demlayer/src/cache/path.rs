//! On-disk tile layout: `{root}/{level}/{row}/{col}{ext}`.
//!
//! Every component is zero-padded to the width the descriptor derives from
//! the largest value it can take, so a lexical directory listing is also the
//! numeric order.

use super::descriptor::TileCacheDescriptor;
use crate::coord::TileCoord;
use std::path::{Path, PathBuf};

/// Suffix appended to a tile path while it is being written.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Final path of a tile.
pub fn tile_path(desc: &TileCacheDescriptor, coord: TileCoord) -> PathBuf {
    let (lw, rw, cw) = desc.pad_widths();
    desc.storage
        .join(format!("{:0lw$}", coord.level))
        .join(format!("{:0rw$}", coord.row))
        .join(format!("{:0cw$}{}", coord.col, desc.compression.extension()))
}

/// Temporary path a tile is written to before the rename.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Parse a path relative to the storage root back into a coordinate.
///
/// Returns `None` for anything that is not `level/row/col{ext}`, including
/// temp files and files with another extension.
pub fn parse_tile_path(relative: &Path, extension: &str) -> Option<TileCoord> {
    let mut parts = relative.iter();
    let level = parts.next()?.to_str()?.parse().ok()?;
    let row = parts.next()?.to_str()?.parse().ok()?;
    let file = parts.next()?.to_str()?;
    if parts.next().is_some() {
        return None;
    }
    let col = file.strip_suffix(extension)?.parse().ok()?;
    Some(TileCoord::new(level, col, row))
}
