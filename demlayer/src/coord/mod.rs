//! Bounding boxes, tile addresses and tile-grid geometry.
//!
//! A [`TileGrid`] describes the finest pyramid level (`tiles_x` by `tiles_y`
//! tiles over a coverage box). Coarser levels halve the tile count per axis,
//! rounding up, until the shorter axis reaches a single tile.

mod types;

pub use types::{BBox, CoordError, TileCoord};

/// Number of pyramid levels for a base grid: `floor(log2(min(x, y))) + 1`.
#[inline]
pub fn num_levels(tiles_x: u32, tiles_y: u32) -> u32 {
    let min = tiles_x.min(tiles_y).max(1);
    (u32::BITS - 1 - min.leading_zeros()) + 1
}

/// Tile grid over a coverage box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    bbox: BBox,
    tiles_x: u32,
    tiles_y: u32,
    num_levels: u32,
}

impl TileGrid {
    pub fn new(bbox: BBox, tiles_x: u32, tiles_y: u32) -> Result<Self, CoordError> {
        if tiles_x == 0 || tiles_y == 0 {
            return Err(CoordError::EmptyGrid);
        }
        Ok(Self {
            bbox,
            tiles_x,
            tiles_y,
            num_levels: num_levels(tiles_x, tiles_y),
        })
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn num_levels(&self) -> u32 {
        self.num_levels
    }

    /// Index of the finest level.
    pub fn base_level(&self) -> u32 {
        self.num_levels - 1
    }

    /// `(cols, rows)` at `level`, or `None` above the finest level.
    pub fn level_dims(&self, level: u32) -> Option<(u32, u32)> {
        if level >= self.num_levels {
            return None;
        }
        let shift = self.base_level() - level;
        Some((
            self.tiles_x.div_ceil(1 << shift),
            self.tiles_y.div_ceil(1 << shift),
        ))
    }

    /// Tile count at `level` (0 for a level outside the pyramid).
    pub fn level_len(&self, level: u32) -> usize {
        self.level_dims(level)
            .map(|(c, r)| c as usize * r as usize)
            .unwrap_or(0)
    }

    pub fn contains(&self, coord: TileCoord) -> bool {
        match self.level_dims(coord.level) {
            Some((cols, rows)) => coord.col < cols && coord.row < rows,
            None => false,
        }
    }

    /// Row-major index of `coord` within its level.
    pub fn index_of(&self, coord: TileCoord) -> Option<usize> {
        let (cols, rows) = self.level_dims(coord.level)?;
        if coord.col >= cols || coord.row >= rows {
            return None;
        }
        Some(coord.row as usize * cols as usize + coord.col as usize)
    }

    /// Inverse of [`index_of`](Self::index_of).
    pub fn coord_at(&self, level: u32, index: usize) -> Option<TileCoord> {
        let (cols, rows) = self.level_dims(level)?;
        if index >= cols as usize * rows as usize {
            return None;
        }
        let cols = cols as usize;
        Some(TileCoord::new(
            level,
            (index % cols) as u32,
            (index / cols) as u32,
        ))
    }

    /// Extent of one tile at `level` in coverage units, `(width, height)`.
    pub fn tile_extent(&self, level: u32) -> (f64, f64) {
        let factor = (1u64 << (self.base_level().saturating_sub(level))) as f64;
        (
            self.bbox.width() / self.tiles_x as f64 * factor,
            self.bbox.height() / self.tiles_y as f64 * factor,
        )
    }

    /// Geographic extent of a tile (no padding). Row 0 touches `max_y`.
    ///
    /// Edge tiles of a level with rounded-up dimensions may extend past the
    /// coverage box.
    pub fn tile_bbox(&self, coord: TileCoord) -> BBox {
        let (w, h) = self.tile_extent(coord.level);
        let min_x = self.bbox.min_x + coord.col as f64 * w;
        let max_y = self.bbox.max_y - coord.row as f64 * h;
        BBox {
            min_x,
            min_y: max_y - h,
            max_x: min_x + w,
            max_y,
        }
    }

    /// Tile extent grown by `padding` pixels of a `tile_size` pixel tile.
    pub fn padded_tile_bbox(&self, coord: TileCoord, tile_size: u32, padding: u32) -> BBox {
        let bbox = self.tile_bbox(coord);
        let px = bbox.width() / tile_size as f64;
        let py = bbox.height() / tile_size as f64;
        bbox.expand(px * padding as f64, py * padding as f64)
    }
}

#[cfg(test)]
mod tests;
