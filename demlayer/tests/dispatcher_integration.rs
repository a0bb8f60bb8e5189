//! Integration tests for request dispatch over configured layers.
//!
//! Layers are built from an INI config the same way `demlayer serve` builds
//! them, then driven through `Dispatcher::handle_request`:
//! - GetCapabilities returns the static document untouched
//! - GetMap errors for unknown layers and inverted boxes
//! - GetTile serves tiles that are already on disk without any upstream
//!
//! Run with: `cargo test --test dispatcher_integration`

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use demlayer::cache::{encode_tile, write_tile, TileCacheDescriptor};
use demlayer::codec;
use demlayer::config::{ConfigFile, LayerKindSettings};
use demlayer::coord::TileCoord;
use demlayer::layer::{LayerContext, LayerRegistry};
use demlayer::raster::{Image, PixelType};
use demlayer::service::{Dispatcher, ServiceResponse};

// ============================================================================
// Test Helpers
// ============================================================================

const CAPABILITIES: &[u8] = b"<?xml version=\"1.0\"?>\n<WMS_Capabilities version=\"1.3.0\"/>\n";

/// Grid layer `dem` (4x4 S16 of 100s) plus cache layer `tiles` (2x2 base
/// tiles of 4+2*1 pixels) whose upstream is unreachable.
fn config(dir: &TempDir) -> ConfigFile {
    let grid_path = dir.path().join("dem.raw");
    let samples: Vec<u8> = std::iter::repeat(100i16.to_le_bytes())
        .take(16)
        .flatten()
        .collect();
    fs::write(&grid_path, samples).unwrap();

    let text = format!(
        "[layer.dem]\n\
         kind = grid\n\
         path = {}\n\
         width = 4\n\
         height = 4\n\
         bbox = -20,-20,20,20\n\
         \n\
         [layer.tiles]\n\
         kind = cache\n\
         storage = {}\n\
         tile_size = 4\n\
         padding = 1\n\
         tiles_x = 2\n\
         tiles_y = 2\n\
         bbox = 0,0,20,20\n\
         compression = elevation\n\
         source_host = upstream.invalid\n\
         source_layer = base\n",
        grid_path.display(),
        dir.path().join("tiles").display()
    );
    ConfigFile::from_ini_str(&text).unwrap()
}

fn cache_descriptor(config: &ConfigFile) -> TileCacheDescriptor {
    let layer = config.layers.iter().find(|l| l.name == "tiles").unwrap();
    let LayerKindSettings::Cache(cache) = &layer.kind else {
        panic!("tiles should be a cache layer");
    };
    TileCacheDescriptor::from_settings(&layer.name, cache).unwrap()
}

/// Registry without a runtime: no builder starts, so nothing can fetch.
fn dispatcher(config: &ConfigFile) -> Dispatcher {
    let registry = LayerRegistry::build(&config.layers, &LayerContext::new()).unwrap();
    Dispatcher::new(Arc::new(registry), Some(CAPABILITIES.to_vec()))
}

fn request(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn exception_code(response: &ServiceResponse) -> String {
    String::from_utf8_lossy(&response.body)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_get_capabilities_returns_static_document() {
    let dir = TempDir::new().unwrap();
    let dispatcher = dispatcher(&config(&dir));

    let response = dispatcher.handle_request(&request("service=WMS&request=GetCapabilities"));

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "application/xml");
    assert_eq!(response.body, CAPABILITIES);
}

#[test]
fn test_get_map_unknown_layer() {
    let dir = TempDir::new().unwrap();
    let dispatcher = dispatcher(&config(&dir));

    let response = dispatcher.handle_request(&request(
        "service=WMS&request=GetMap&layers=UnknownLayer&crs=EPSG:4326\
         &bbox=-10,-10,10,10&width=256&height=256&format=image/png",
    ));

    assert_eq!(response.status, 400);
    assert_eq!(exception_code(&response), "LayerNotDefined");
}

#[test]
fn test_get_map_inverted_bbox() {
    let dir = TempDir::new().unwrap();
    let dispatcher = dispatcher(&config(&dir));

    let response = dispatcher.handle_request(&request(
        "service=WMS&request=GetMap&layers=dem&crs=EPSG:4326\
         &bbox=10,10,-10,-10&width=256&height=256&format=image/png",
    ));

    assert_eq!(response.status, 400);
    assert_eq!(exception_code(&response), "InvalidBBOX");
}

#[test]
fn test_get_map_valid_request() {
    let dir = TempDir::new().unwrap();
    let dispatcher = dispatcher(&config(&dir));

    let response = dispatcher.handle_request(&request(
        "service=WMS&request=GetMap&layers=dem&crs=EPSG:4326\
         &bbox=-10,-10,10,10&width=8&height=8&format=application/raw-s16",
    ));

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "application/raw-s16");
    assert_eq!(response.body.len(), 8 * 8 * 2);

    let png = dispatcher.handle_request(&request(
        "request=GetMap&layers=dem&srs=EPSG:4326\
         &bbox=-10,-10,10,10&width=8&height=8&format=image/png",
    ));
    assert_eq!(png.status, 200);
    assert_eq!(png.content_type, "image/png");
}

#[test]
fn test_get_tile_served_from_disk() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let desc = cache_descriptor(&config);
    let base = desc.grid().base_level();

    let coord = TileCoord::new(base, 1, 0);
    let stored = encode_tile(&desc, &Image::filled(6, 6, PixelType::S16, 250.0)).unwrap();
    write_tile(&desc, coord, Some(stored.as_slice())).unwrap();

    let dispatcher = dispatcher(&config);
    let query = format!(
        "service=WMTS&request=GetTile&layers=tiles&tilematrixset=EPSG:4326\
         &tilematrix={}&tilerow=0&tilecol=1",
        base
    );

    // Elevation bytes go out exactly as stored
    let response = dispatcher.handle_request(&request(&format!(
        "{}&format=application/elevation",
        query
    )));
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "application/elevation");
    assert_eq!(response.body, stored);
    let decoded = codec::decompress(&response.body).unwrap();
    assert!(decoded.as_s16().unwrap().iter().all(|&v| v == 250));

    let raw = dispatcher.handle_request(&request(&format!(
        "{}&format=application/raw-s16",
        query
    )));
    assert_eq!(raw.status, 200);
    assert_eq!(raw.body.len(), 6 * 6 * 2);
    assert_eq!(&raw.body[..2], &250i16.to_le_bytes());
}

#[test]
fn test_get_tile_not_yet_cached() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let base = cache_descriptor(&config).grid().base_level();
    let dispatcher = dispatcher(&config);

    let response = dispatcher.handle_request(&request(&format!(
        "request=GetTile&layers=tiles&tilematrixset=EPSG:4326&tilematrix={}\
         &tilerow=1&tilecol=1&format=application/elevation",
        base
    )));
    assert_eq!(response.status, 500);
    assert_eq!(exception_code(&response), "InternalError");

    let out_of_range = dispatcher.handle_request(&request(&format!(
        "request=GetTile&layers=tiles&tilematrixset=EPSG:4326&tilematrix={}\
         &tilerow=5&tilecol=0&format=application/elevation",
        base
    )));
    assert_eq!(out_of_range.status, 400);
    assert_eq!(exception_code(&out_of_range), "TileOutOfRange");
}
