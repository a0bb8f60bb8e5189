//! CLI command implementations.
//!
//! - [`serve`] - run the WMS/WMTS endpoint and the cache builders
//! - [`build`] - fill one tile cache and exit
//! - [`config`] - inspect or create the configuration file

pub mod build;
pub mod config;
pub mod serve;
