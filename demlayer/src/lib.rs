//! demlayer - WMS/WMTS raster tile serving with an on-disk tile pyramid
//!
//! The library turns WMS/WMTS query parameters into typed raster operations
//! and answers them from configured layers:
//!
//! - [`layer::grid::GridLayer`] resamples a local raster grid on demand
//!   (Lanczos, with CRS reprojection of the request box).
//! - [`cache::CacheLayer`] serves tiles from a disk pyramid that a background
//!   [`cache::TileCacheBuilder`] fills from an upstream WMS.
//!
//! # Example
//!
//! ```ignore
//! use demlayer::config::ConfigFile;
//! use demlayer::layer::{LayerContext, LayerRegistry};
//! use demlayer::service::Dispatcher;
//!
//! let config = ConfigFile::load()?;
//! let context = LayerContext::new().with_runtime(tokio::runtime::Handle::current());
//! let registry = Arc::new(LayerRegistry::build(&config.layers, &context)?);
//! let dispatcher = Dispatcher::new(Arc::clone(&registry), None);
//!
//! let response = dispatcher.handle_request(&query_pairs);
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod coord;
pub mod crs;
pub mod layer;
pub mod logging;
pub mod provider;
pub mod raster;
pub mod resample;
pub mod service;

/// Version of the demlayer library and CLI.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
