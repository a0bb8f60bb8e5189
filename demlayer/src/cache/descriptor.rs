//! Static description of one tile cache.

use super::types::{CacheError, Compression};
use crate::config::CacheSettings;
use crate::coord::{BBox, TileCoord, TileGrid};
use crate::crs::CrsHandle;
use crate::provider::UpstreamSource;
use crate::raster::PixelType;
use crate::service::raw_pixel_type;
use std::path::PathBuf;

/// Everything needed to locate, fetch and decode the tiles of one cache.
#[derive(Debug, Clone)]
pub struct TileCacheDescriptor {
    /// Layer name, used in logs and events
    pub name: String,
    /// Core tile edge in pixels
    pub tile_size: u32,
    /// Extra samples stored on each side of the core
    pub padding: u32,
    pub storage: PathBuf,
    pub compression: Compression,
    pub invalid_value: f64,
    pub tile_matrix_set: String,
    pub source: UpstreamSource,
    grid: TileGrid,
    level_width: usize,
    row_width: usize,
    col_width: usize,
}

impl TileCacheDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        grid: TileGrid,
        tile_size: u32,
        padding: u32,
        storage: PathBuf,
        compression: Compression,
        invalid_value: f64,
        tile_matrix_set: impl Into<String>,
        source: UpstreamSource,
    ) -> Result<Self, CacheError> {
        if tile_size == 0 {
            return Err(CacheError::InvalidConfig("tile_size must be positive".into()));
        }
        if compression == Compression::Elevation && source.pixel_type != PixelType::S16 {
            return Err(CacheError::InvalidConfig(format!(
                "elevation compression needs s16 tiles, upstream delivers {}",
                source.pixel_type
            )));
        }

        let (cols, rows) = grid
            .level_dims(grid.base_level())
            .ok_or_else(|| CacheError::InvalidConfig("empty tile grid".into()))?;
        Ok(Self {
            name: name.into(),
            tile_size,
            padding,
            storage,
            compression,
            invalid_value,
            tile_matrix_set: tile_matrix_set.into(),
            source,
            level_width: digits(grid.num_levels().saturating_sub(1)),
            row_width: digits(rows.saturating_sub(1)),
            col_width: digits(cols.saturating_sub(1)),
            grid,
        })
    }

    /// Builds a descriptor from a `[layer.<name>]` cache section.
    pub fn from_settings(name: &str, settings: &CacheSettings) -> Result<Self, CacheError> {
        let pixel_type = raw_pixel_type(&settings.source_format).ok_or_else(|| {
            CacheError::InvalidConfig(format!(
                "source_format '{}' is not a raw format",
                settings.source_format
            ))
        })?;
        let grid = TileGrid::new(settings.bbox, settings.tiles_x, settings.tiles_y)
            .map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        let source = UpstreamSource {
            host: settings.source_host.clone(),
            port: settings.source_port,
            layer: settings.source_layer.clone(),
            crs: settings.crs,
            format: settings.source_format.clone(),
            pixel_type,
        };
        Self::new(
            name,
            grid,
            settings.tile_size,
            settings.padding,
            settings.storage.clone(),
            settings.compression,
            settings.invalid_value,
            settings.tile_matrix_set.clone(),
            source,
        )
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn num_levels(&self) -> u32 {
        self.grid.num_levels()
    }

    pub fn crs(&self) -> CrsHandle {
        self.source.crs
    }

    pub fn pixel_type(&self) -> PixelType {
        self.source.pixel_type
    }

    /// Stored tile edge: core plus padding on both sides.
    pub fn tile_pixels(&self) -> u32 {
        self.tile_size + 2 * self.padding
    }

    /// Bytes of one decoded tile.
    pub fn tile_bytes(&self) -> usize {
        let edge = self.tile_pixels() as usize;
        edge * edge * self.pixel_type().size_of()
    }

    /// Zero-padding widths for the level, row and col path components.
    pub fn pad_widths(&self) -> (usize, usize, usize) {
        (self.level_width, self.row_width, self.col_width)
    }

    /// Extent requested upstream for a tile, padding included.
    pub fn fetch_bbox(&self, coord: TileCoord) -> BBox {
        self.grid
            .padded_tile_bbox(coord, self.tile_size, self.padding)
    }
}

/// Decimal digits needed to print `n`.
fn digits(n: u32) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}
