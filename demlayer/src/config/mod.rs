//! Configuration for demlayer.
//!
//! The configuration lives in an INI file (default `~/.demlayer/config.ini`)
//! with a `[server]` section, a `[logging]` section and one
//! `[layer.<name>]` section per layer.
//!
//! # Example
//!
//! ```
//! use demlayer::config::{ConfigFile, LayerKindSettings};
//!
//! let config = ConfigFile::from_ini_str(
//!     "[layer.dem]\nkind = grid\npath = dem.raw\nwidth = 4\nheight = 4\nbbox = 0,0,1,1\n",
//! )
//! .unwrap();
//! assert!(matches!(config.layers[0].kind, LayerKindSettings::Grid(_)));
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ConfigFile, GridSettings, LayerKindSettings, LayerSettings, LoggingSettings,
    ServerSettings,
};
