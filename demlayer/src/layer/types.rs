//! Request and error types shared by all layers.

use crate::cache::CacheError;
use crate::coord::{BBox, CoordError};
use crate::crs::{CrsError, CrsHandle};
use crate::raster::PixelType;
use thiserror::Error;

/// A validated WMS GetMap request.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest {
    pub layer: String,
    /// Raw `styles` value, empty when absent
    pub styles: String,
    pub crs: CrsHandle,
    pub bbox: BBox,
    pub width: u32,
    pub height: u32,
}

/// A validated WMTS GetTile request.
#[derive(Debug, Clone, PartialEq)]
pub struct GetTileRequest {
    pub layer: String,
    pub styles: String,
    pub tile_matrix_set: String,
    pub tile_matrix: u32,
    pub tile_row: u32,
    pub tile_col: u32,
}

/// Whether a `styles` value selects the default rendering.
pub fn is_default_style(styles: &str) -> bool {
    let styles = styles.trim();
    styles.is_empty() || styles.eq_ignore_ascii_case("default")
}

/// Errors a layer reports while handling a request.
///
/// Each variant maps to one service exception code.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayerError {
    #[error("Unsupported style '{0}'")]
    InvalidStyle(String),

    #[error("Pixel type {0} not supported by this layer")]
    InvalidFormat(PixelType),

    #[error("Unsupported CRS {0}")]
    InvalidSrs(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBBox(String),

    #[error("Tile {matrix}/{row}/{col} is outside the tile matrix")]
    TileOutOfRange { matrix: u32, row: u32, col: u32 },

    #[error("Operation not supported by this layer")]
    OperationNotSupported,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors that prevent a layer from being registered.
#[derive(Debug, Error)]
pub enum LayerInitError {
    /// Missing or invalid setting
    #[error("Setting '{key}': {reason}")]
    Setting { key: String, reason: String },

    #[error("CRS setup failed: {0}")]
    Crs(#[from] CrsError),

    #[error("Invalid extent: {0}")]
    Coord(#[from] CoordError),

    #[error("Cannot open raster source {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tile cache setup failed: {0}")]
    Cache(#[from] CacheError),

    #[error("{0}")]
    Other(String),
}

impl LayerInitError {
    pub fn setting(key: &str, reason: impl Into<String>) -> Self {
        LayerInitError::Setting {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors building the layer registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Every configured layer failed to initialise (or none was configured)
    #[error("No layers could be initialised")]
    NoLayers,
}
