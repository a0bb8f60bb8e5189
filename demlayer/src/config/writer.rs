//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented representation written to `config.ini`.

use std::fmt::Write as _;
use std::path::Path;

use super::parser::LAYER_SECTION_PREFIX;
use super::settings::*;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let capabilities = config
        .server
        .capabilities
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();

    let mut out = format!(
        r#"[server]
; Address the WMS/WMTS listener binds to (default: 127.0.0.1:8080)
listen = {}
; Static capabilities XML served for request=GetCapabilities
; Leave empty to serve a minimal built-in document
capabilities = {}

[logging]
; Directory for the log file (default: ~/.demlayer/logs)
directory = {}
; Log file name, truncated on every start
file = {}
"#,
        config.server.listen,
        capabilities,
        path_to_string(&config.logging.directory),
        config.logging.file,
    );

    if config.layers.is_empty() {
        out.push_str(EXAMPLE_LAYERS);
    }
    for layer in &config.layers {
        out.push('\n');
        match &layer.kind {
            LayerKindSettings::Grid(grid) => write_grid(&mut out, &layer.name, grid),
            LayerKindSettings::Cache(cache) => write_cache(&mut out, &layer.name, cache),
        }
    }
    out
}

fn write_grid(out: &mut String, name: &str, grid: &GridSettings) {
    let supported: Vec<String> = grid.supported_crs.iter().map(|c| c.to_string()).collect();
    let _ = write!(
        out,
        r#"[{}{}]
kind = grid
; Raw little-endian pixel file of width x height samples
path = {}
width = {}
height = {}
pixel_type = {}
crs = {}
bbox = {}
invalid_value = {}
; CRSs accepted in GetMap requests (comma separated)
supported_crs = {}
; Value range stretched to 0..255 for image/png previews
visual_min = {}
visual_max = {}
"#,
        LAYER_SECTION_PREFIX,
        name,
        path_to_string(&grid.path),
        grid.width,
        grid.height,
        grid.pixel_type,
        grid.crs,
        grid.bbox,
        grid.invalid_value,
        supported.join(","),
        grid.visual_min,
        grid.visual_max,
    );
}

fn write_cache(out: &mut String, name: &str, cache: &CacheSettings) {
    let _ = write!(
        out,
        r#"[{}{}]
kind = cache
; Tile pyramid root: <storage>/<level>/<row>/<col>.<raw|elev>
storage = {}
tile_size = {}
padding = {}
; Base (finest) level tile counts
tiles_x = {}
tiles_y = {}
bbox = {}
crs = {}
; raw or elevation
compression = {}
invalid_value = {}
; Upstream WMS the builder fetches base tiles from
source_host = {}
source_port = {}
source_layer = {}
source_format = {}
tile_matrix_set = {}
workers = {}
max_retries = {}
retry_base_delay_ms = {}
request_timeout_secs = {}
"#,
        LAYER_SECTION_PREFIX,
        name,
        path_to_string(&cache.storage),
        cache.tile_size,
        cache.padding,
        cache.tiles_x,
        cache.tiles_y,
        cache.bbox,
        cache.crs,
        cache.compression,
        cache.invalid_value,
        cache.source_host,
        cache.source_port,
        cache.source_layer,
        cache.source_format,
        cache.tile_matrix_set,
        cache.workers,
        cache.max_retries,
        cache.retry_base_delay_ms,
        cache.request_timeout_secs,
    );
}

const EXAMPLE_LAYERS: &str = r#"
; Layers are declared one per section as [layer.<name>].
;
; [layer.dem]
; kind = grid
; path = ~/data/dem.raw
; width = 3600
; height = 1800
; pixel_type = s16
; crs = EPSG:4326
; bbox = -180,-90,180,90
;
; [layer.srtm]
; kind = cache
; storage = ~/.demlayer/tiles/srtm
; tiles_x = 64
; tiles_y = 32
; bbox = -180,-90,180,90
; source_host = dem.example.com
; source_layer = srtm30
"#;

/// Convert a path to a string, collapsing the home directory to `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
