//! Shared setup for commands that load the config and log to a file.

use crate::error::CliError;
use demlayer::config::ConfigFile;
use demlayer::logging::{init_logging, LoggingGuard};
use std::path::{Path, PathBuf};
use tracing::info;

/// Loaded configuration plus the logging guard for the command's lifetime.
pub struct CliRunner {
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Load the config (defaults when the file is absent) and start logging.
    pub fn new(config_path: &Path) -> Result<Self, CliError> {
        let config = ConfigFile::load_from(config_path)?;

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path: config_path.to_path_buf(),
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!("demlayer v{}", demlayer::VERSION);
        info!(config = %self.config_path.display(), "demlayer CLI: {} command", command);
    }
}
