//! demlayer CLI - WMS/WMTS raster tile server
//!
//! `serve` runs the HTTP endpoint (and the background cache builders),
//! `build` fills one tile cache and exits, `config` manages the INI file.

mod commands;
mod error;
mod runner;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use demlayer::config::config_file_path;

use commands::build::BuildArgs;
use commands::config::ConfigCommands;
use commands::serve::ServeArgs;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "demlayer")]
#[command(version = demlayer::VERSION)]
#[command(about = "WMS/WMTS server for elevation grids and cached tile pyramids", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.demlayer/config.ini)
    #[arg(long, global = true, env = "DEMLAYER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve all configured layers over HTTP
    Serve {
        /// Address to listen on, overriding [server] listen
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Serve cached tiles only; do not start the cache builders
        #[arg(long)]
        no_build: bool,
    },

    /// Fill one cache layer from its upstream, then exit
    Build {
        /// Name of the [layer.<name>] section to build
        #[arg(long)]
        layer: String,

        /// Concurrent fetch workers, overriding the layer's setting
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config_file_path);

    let result = match cli.command {
        Commands::Serve { listen, no_build } => match CliRunner::new(&config_path) {
            Ok(runner) => commands::serve::run(&runner, ServeArgs { listen, no_build }).await,
            Err(e) => Err(e),
        },
        Commands::Build { layer, workers } => match CliRunner::new(&config_path) {
            Ok(runner) => commands::build::run(&runner, BuildArgs { layer, workers }).await,
            Err(e) => Err(e),
        },
        Commands::Config(command) => commands::config::run(command, &config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}
