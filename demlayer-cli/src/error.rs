//! CLI error handling with user-facing messages.

use demlayer::cache::CacheError;
use demlayer::config::ConfigFileError;
use demlayer::layer::RegistryError;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

/// Errors that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// No layer could be initialised
    Registry(RegistryError),
    /// Cache scan or build failure
    Cache(CacheError),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: io::Error },
    /// Listener could not be bound
    Bind { addr: SocketAddr, error: io::Error },
    /// HTTP server error
    Serve(io::Error),
}

impl CliError {
    /// Exit the process with an error message and code 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Registry(_) => {
                eprintln!();
                eprintln!("Check the [layer.<name>] sections of your config file.");
                eprintln!("Run 'demlayer config path' to find it.");
            }
            CliError::Bind { .. } => {
                eprintln!();
                eprintln!("Another process may be using the port. Try --listen <addr:port>.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Registry(e) => write!(f, "Failed to initialise layers: {}", e),
            CliError::Cache(e) => write!(f, "Tile cache error: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read '{}': {}", path.display(), error)
            }
            CliError::Bind { addr, error } => write!(f, "Cannot listen on {}: {}", addr, error),
            CliError::Serve(e) => write!(f, "HTTP server error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Registry(e) => Some(e),
            CliError::Cache(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Bind { error, .. } => Some(error),
            CliError::Serve(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<RegistryError> for CliError {
    fn from(e: RegistryError) -> Self {
        CliError::Registry(e)
    }
}

impl From<CacheError> for CliError {
    fn from(e: CacheError) -> Self {
        CliError::Cache(e)
    }
}
