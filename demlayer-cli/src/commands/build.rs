//! Build command - fill one tile cache from its upstream and exit.

use std::sync::Arc;

use demlayer::cache::{
    scan_file_status, BuildReport, BuilderEvent, BuilderOptions, FileStatus, TileCacheBuilder,
    TileCacheDescriptor,
};
use demlayer::config::LayerKindSettings;
use demlayer::provider::ReqwestUpstreamClient;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the build command.
pub struct BuildArgs {
    pub layer: String,
    pub workers: Option<usize>,
}

/// Run the builder for one cache layer to completion or Ctrl+C.
pub async fn run(runner: &CliRunner, args: BuildArgs) -> Result<(), CliError> {
    runner.log_startup("build");
    let config = runner.config();

    let settings = config
        .layers
        .iter()
        .find(|layer| layer.name == args.layer)
        .ok_or_else(|| CliError::Config(format!("No layer named '{}'", args.layer)))?;
    let LayerKindSettings::Cache(cache) = &settings.kind else {
        return Err(CliError::Config(format!(
            "Layer '{}' is a {} layer, not a cache",
            settings.name,
            settings.kind_name()
        )));
    };

    let descriptor = Arc::new(TileCacheDescriptor::from_settings(&settings.name, cache)?);
    let status = Arc::new(scan_file_status(&descriptor)?);
    let base = descriptor.num_levels().saturating_sub(1);

    let mut options = BuilderOptions::from_settings(cache);
    if let Some(workers) = args.workers {
        options.workers = workers.max(1);
    }
    let client = ReqwestUpstreamClient::with_timeout(cache.request_timeout_secs)
        .map_err(|e| CliError::Config(e.to_string()))?;

    println!("Building tile cache '{}'", settings.name);
    println!("  Storage: {}", descriptor.storage.display());
    println!(
        "  Levels:  {} ({} base tiles present, {} empty)",
        descriptor.num_levels(),
        status.count(base, FileStatus::Present),
        status.count(base, FileStatus::EmptyConfirmed)
    );
    println!("  Workers: {}", options.workers);
    println!();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = TileCacheBuilder::new(descriptor, status, Arc::new(client), options)
        .with_events(events_tx)
        .spawn(&Handle::current(), cancel.clone());

    let progress = tokio::spawn(print_events(events_rx));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            println!("Cancelling...");
            cancel.cancel();
        }
    });

    let report = handle.join().await?;
    // the builder's sender is gone once it finishes
    let _ = progress.await;

    print_report(&report);
    info!(?report, "Build finished");
    Ok(())
}

async fn print_events(mut events: mpsc::UnboundedReceiver<BuilderEvent>) {
    let mut done = 0usize;
    let mut total = 0usize;
    while let Some(event) = events.recv().await {
        match event {
            BuilderEvent::Started { missing, .. } => {
                total = missing;
                println!("{} base tiles to fetch", missing);
            }
            BuilderEvent::TileFetched { .. } => {
                done += 1;
                if done % 100 == 0 || done == total {
                    println!("  fetched {}/{}", done, total);
                }
            }
            BuilderEvent::TileFailed {
                tile,
                error,
                attempts,
                ..
            } => {
                done += 1;
                println!("  tile {} failed after {} attempts: {}", tile, attempts, error);
            }
            BuilderEvent::BaseLevelComplete { fetched, failed, .. } => {
                println!("Base level done: {} fetched, {} failed", fetched, failed);
            }
            BuilderEvent::LevelFolded {
                level,
                written,
                empty,
                ..
            } => {
                println!("  level {}: {} written, {} empty", level, written, empty);
            }
            BuilderEvent::Finished { .. } | BuilderEvent::Cancelled { .. } => {}
        }
    }
}

fn print_report(report: &BuildReport) {
    println!();
    if report.cancelled {
        println!("Build cancelled.");
    } else {
        println!("Build complete.");
    }
    println!("  Fetched:   {}", report.fetched);
    println!("  Empty:     {}", report.empty);
    println!("  Skipped:   {}", report.skipped);
    println!("  Failed:    {}", report.failed);
    println!("  Requests:  {}", report.requests);
    println!("  Folded:    {}", report.folded);
    println!("  Deferred:  {}", report.deferred);
    if report.failed > 0 || report.deferred > 0 {
        println!();
        println!("Run the build again to retry failed tiles.");
    }
}
