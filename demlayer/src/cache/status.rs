//! Per-tile status arrays and the startup directory scan.

use super::descriptor::TileCacheDescriptor;
use super::path::parse_tile_path;
use super::types::{CacheError, FileStatus};
use crate::coord::{TileCoord, TileGrid};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One atomic status byte per tile, one array per level.
///
/// Builder workers write disjoint indices while the serving path reads.
/// The store happens after the tile file is renamed into place, so a reader
/// that sees `Present` also sees the file.
#[derive(Debug)]
pub struct TileStatusTable {
    grid: TileGrid,
    levels: Vec<Arc<[AtomicU8]>>,
}

impl TileStatusTable {
    /// All tiles `Missing`.
    pub fn new(grid: TileGrid) -> Self {
        let levels = (0..grid.num_levels())
            .map(|level| {
                (0..grid.level_len(level))
                    .map(|_| AtomicU8::new(FileStatus::Missing as u8))
                    .collect()
            })
            .collect();
        Self { grid, levels }
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Status of a tile; out-of-grid coordinates read as `Missing`.
    pub fn get(&self, coord: TileCoord) -> FileStatus {
        self.slot(coord)
            .map(|slot| FileStatus::from_u8(slot.load(Ordering::Acquire)))
            .unwrap_or(FileStatus::Missing)
    }

    /// Store a status. Returns `false` when `coord` is outside the grid.
    pub fn set(&self, coord: TileCoord, status: FileStatus) -> bool {
        match self.slot(coord) {
            Some(slot) => {
                slot.store(status as u8, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Number of tiles at `level` currently holding `status`.
    pub fn count(&self, level: u32, status: FileStatus) -> usize {
        self.levels
            .get(level as usize)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|s| FileStatus::from_u8(s.load(Ordering::Relaxed)) == status)
                    .count()
            })
            .unwrap_or(0)
    }

    fn slot(&self, coord: TileCoord) -> Option<&AtomicU8> {
        let index = self.grid.index_of(coord)?;
        self.levels.get(coord.level as usize)?.get(index)
    }
}

/// Walk the storage tree once and derive the status of every tile.
///
/// Zero-byte files are `EmptyConfirmed`, non-empty files `Present`.
/// Entries that do not parse as a tile of this grid are ignored.
pub fn scan_file_status(desc: &TileCacheDescriptor) -> Result<TileStatusTable, CacheError> {
    let table = TileStatusTable::new(*desc.grid());
    let mut found = 0usize;
    scan_directory(
        &desc.storage,
        &desc.storage,
        desc.compression.extension(),
        &table,
        &mut found,
    )?;

    info!(
        layer = %desc.name,
        root = %desc.storage.display(),
        tiles = found,
        "Scanned tile cache"
    );
    Ok(table)
}

fn scan_directory(
    root: &Path,
    dir: &Path,
    extension: &str,
    table: &TileStatusTable,
    found: &mut usize,
) -> Result<(), CacheError> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            scan_directory(root, &path, extension, table, found)?;
            continue;
        }

        let Some(coord) = path
            .strip_prefix(root)
            .ok()
            .and_then(|rel| parse_tile_path(rel, extension))
        else {
            debug!(path = %path.display(), "Ignoring non-tile entry");
            continue;
        };

        let status = if entry.metadata()?.len() == 0 {
            FileStatus::EmptyConfirmed
        } else {
            FileStatus::Present
        };
        if table.set(coord, status) {
            *found += 1;
        } else {
            debug!(tile = %coord, "Ignoring tile outside the grid");
        }
    }

    Ok(())
}
