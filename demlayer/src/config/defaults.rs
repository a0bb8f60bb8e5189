//! Default values and constants for all configuration settings.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8080));

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "demlayer.log";

/// Default no-data sentinel for elevation data.
pub const DEFAULT_INVALID_VALUE: f64 = -32768.0;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default tile padding in pixels.
pub const DEFAULT_PADDING: u32 = 2;

/// Default upstream port.
pub const DEFAULT_SOURCE_PORT: u16 = 80;

/// Default upstream raw format.
pub const DEFAULT_SOURCE_FORMAT: &str = "application/raw-s16";

/// Default retry budget per tile.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default first backoff delay.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

/// Upper bound on a single backoff delay.
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Default upstream request deadline.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default preview range (metres) for 8-bit renderings of elevation.
pub const DEFAULT_VISUAL_MIN: f64 = 0.0;
pub const DEFAULT_VISUAL_MAX: f64 = 4000.0;

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Default base-fill worker count: one per core, at most 8.
pub fn default_workers() -> usize {
    num_cpus().min(8)
}

/// Default log directory (~/.demlayer/logs).
pub fn default_log_directory() -> PathBuf {
    config_directory().join("logs")
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN,
            capabilities: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            layers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workers_bounded() {
        let workers = default_workers();
        assert!((1..=8).contains(&workers));
    }

    #[test]
    fn test_default_listen() {
        assert_eq!(DEFAULT_LISTEN.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_default_log_directory_under_config() {
        assert!(default_log_directory().ends_with(".demlayer/logs"));
    }
}
