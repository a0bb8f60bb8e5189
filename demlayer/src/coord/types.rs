//! Coordinate type definitions

use std::fmt;

/// Axis-aligned bounding box in the units of some CRS.
///
/// Always normalised: `min_x <= max_x`, `min_y <= max_y`, all values finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    /// Creates a bounding box, rejecting inverted or non-finite extents.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, CoordError> {
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(CoordError::NonFinite);
        }
        if min_x > max_x || min_y > max_y {
            return Err(CoordError::Inverted {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Builds the box spanned by two arbitrary corners.
    ///
    /// Used after reprojection, where the corner order may flip.
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Result<Self, CoordError> {
        Self::new(a.0.min(b.0), a.1.min(b.1), a.0.max(b.0), a.1.max(b.1))
    }

    /// Parses `minX,minY,maxX,maxY`.
    pub fn parse(text: &str) -> Result<Self, CoordError> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(CoordError::FieldCount(parts.len()));
        }
        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .map_err(|_| CoordError::NotANumber(part.to_string()))?;
        }
        Self::new(values[0], values[1], values[2], values[3])
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grows the box by `dx` on the left/right and `dy` on the top/bottom.
    pub fn expand(&self, dx: f64, dy: f64) -> Self {
        Self {
            min_x: self.min_x - dx,
            min_y: self.min_y - dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Tile address in a cache pyramid.
///
/// Level `num_levels - 1` is the finest; row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Pyramid level, 0 is the coarsest
    pub level: u32,
    /// X index (west to east)
    pub col: u32,
    /// Y index (north to south)
    pub row: u32,
}

impl TileCoord {
    #[inline]
    pub fn new(level: u32, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }

    /// The four children one level finer, in (dx, dy) order
    /// `(0,0) (1,0) (0,1) (1,1)`.
    pub fn children(&self) -> [TileCoord; 4] {
        let (c, r, l) = (self.col * 2, self.row * 2, self.level + 1);
        [
            TileCoord::new(l, c, r),
            TileCoord::new(l, c + 1, r),
            TileCoord::new(l, c, r + 1),
            TileCoord::new(l, c + 1, r + 1),
        ]
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.row, self.col)
    }
}

/// Errors that can occur building coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// A min value exceeds its max counterpart
    Inverted {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    /// NaN or infinite component
    NonFinite,
    /// Wrong number of comma-separated fields
    FieldCount(usize),
    /// A field failed to parse as a number
    NotANumber(String),
    /// Tile grid with zero tiles on an axis
    EmptyGrid,
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::Inverted {
                min_x,
                min_y,
                max_x,
                max_y,
            } => write!(
                f,
                "Inverted bounding box: {},{},{},{} (min must not exceed max)",
                min_x, min_y, max_x, max_y
            ),
            CoordError::NonFinite => write!(f, "Bounding box contains a non-finite value"),
            CoordError::FieldCount(n) => {
                write!(f, "Bounding box needs 4 comma-separated values, got {}", n)
            }
            CoordError::NotANumber(s) => write!(f, "Invalid number in bounding box: '{}'", s),
            CoordError::EmptyGrid => write!(f, "Tile grid must have at least one tile per axis"),
        }
    }
}

impl std::error::Error for CoordError {}
