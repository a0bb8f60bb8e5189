//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::cache::Compression;
use crate::coord::BBox;
use crate::crs::CrsHandle;
use crate::raster::PixelType;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// HTTP listener settings
    pub server: ServerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
    /// One entry per `[layer.<name>]` section, in file order
    pub layers: Vec<LayerSettings>,
}

/// `[server]` section.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Address the HTTP listener binds to
    pub listen: SocketAddr,
    /// Static capabilities document; `None` serves the built-in document
    pub capabilities: Option<PathBuf>,
}

/// `[logging]` section.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Directory holding the log file
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}

/// A `[layer.<name>]` section.
#[derive(Debug, Clone)]
pub struct LayerSettings {
    /// Layer name as used in the `layers` request parameter
    pub name: String,
    pub kind: LayerKindSettings,
}

impl LayerSettings {
    /// The `kind` key value used to select a layer factory.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            LayerKindSettings::Grid(_) => "grid",
            LayerKindSettings::Cache(_) => "cache",
        }
    }
}

/// Kind-specific layer settings.
#[derive(Debug, Clone)]
pub enum LayerKindSettings {
    Grid(GridSettings),
    Cache(CacheSettings),
}

/// Settings for a computational layer over a local raw grid.
#[derive(Debug, Clone)]
pub struct GridSettings {
    /// Raw little-endian pixel file
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    /// CRS of the grid's extent
    pub crs: CrsHandle,
    /// Outer edges of the grid's corner pixels
    pub bbox: BBox,
    /// No-data sentinel
    pub invalid_value: f64,
    /// CRSs accepted in requests (always includes `crs`)
    pub supported_crs: Vec<CrsHandle>,
    /// Value mapped to black in 8-bit previews
    pub visual_min: f64,
    /// Value mapped to white in 8-bit previews
    pub visual_max: f64,
}

/// Settings for a disk tile cache filled from an upstream WMS.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Root directory of the tile pyramid
    pub storage: PathBuf,
    /// Core tile edge in pixels
    pub tile_size: u32,
    /// Extra pixels stored around each tile edge
    pub padding: u32,
    /// Base-level tile count along x
    pub tiles_x: u32,
    /// Base-level tile count along y
    pub tiles_y: u32,
    /// Coverage extent in `crs`
    pub bbox: BBox,
    pub crs: CrsHandle,
    pub compression: Compression,
    pub invalid_value: f64,
    pub source_host: String,
    pub source_port: u16,
    pub source_layer: String,
    /// Raw MIME type requested from upstream
    pub source_format: String,
    /// Name clients must pass as `tilematrixset`
    pub tile_matrix_set: String,
    /// Concurrent base-fill workers
    pub workers: usize,
    /// Attempts after the first failure before a tile is marked failed
    pub max_retries: u32,
    /// First backoff delay; doubles each attempt
    pub retry_base_delay_ms: u64,
    /// Deadline for one upstream request
    pub request_timeout_secs: u64,
}
