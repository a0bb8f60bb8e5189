//! Configuration CLI commands.

use std::path::Path;

use clap::Subcommand;
use demlayer::config::{ConfigFile, LayerKindSettings};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write a commented default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand against `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Init { force } => run_init(path, force),
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_from(path)?;
    if !path.exists() {
        println!("(no file at {}, showing defaults)", path.display());
        println!();
    }

    println!("[server]");
    println!("  listen       = {}", config.server.listen);
    match &config.server.capabilities {
        Some(doc) => println!("  capabilities = {}", doc.display()),
        None => println!("  capabilities = (built-in)"),
    }
    println!();
    println!("[logging]");
    println!(
        "  file         = {}",
        config.logging.directory.join(&config.logging.file).display()
    );

    if config.layers.is_empty() {
        println!();
        println!("No layers configured.");
    }
    for layer in &config.layers {
        println!();
        println!("[layer.{}] kind = {}", layer.name, layer.kind_name());
        match &layer.kind {
            LayerKindSettings::Grid(grid) => {
                println!("  path         = {}", grid.path.display());
                println!(
                    "  size         = {}x{} {}",
                    grid.width, grid.height, grid.pixel_type
                );
                println!("  extent       = {} ({})", grid.bbox, grid.crs);
            }
            LayerKindSettings::Cache(cache) => {
                println!("  storage      = {}", cache.storage.display());
                println!(
                    "  tiles        = {}x{} of {} (+{} padding)",
                    cache.tiles_x, cache.tiles_y, cache.tile_size, cache.padding
                );
                println!("  extent       = {} ({})", cache.bbox, cache.crs);
                println!(
                    "  upstream     = {}:{} layer {}",
                    cache.source_host, cache.source_port, cache.source_layer
                );
            }
        }
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
