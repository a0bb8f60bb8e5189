//! Background tile cache builder.
//!
//! A build runs in two phases:
//!
//! 1. **Base fill**: `workers` async workers fetch every `Missing` tile of the
//!    finest level from upstream. Worker `w` owns indices `i % workers == w`.
//!    Each fetch is retried with capped exponential backoff; a tile that
//!    exhausts its retries is marked `Failed` for the rest of the run.
//! 2. **Pyramid fold**: once the base level is complete, each coarser level
//!    is derived from the one below it, finest first.
//!
//! Cancellation is checked between tiles, during requests and during
//! backoff. A cancelled build skips the fold and reports `cancelled`.

use super::descriptor::TileCacheDescriptor;
use super::pyramid::{fold_level, FoldStats};
use super::status::TileStatusTable;
use super::storage::{encode_tile, is_all_invalid, store_tile};
use super::types::{CacheError, FileStatus};
use crate::config::{CacheSettings, MAX_RETRY_DELAY_MS};
use crate::coord::TileCoord;
use crate::provider::UpstreamClient;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tuning for one builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderOptions {
    pub workers: usize,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_retry_delay: Duration,
    pub request_timeout: Duration,
}

impl BuilderOptions {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            workers: settings.workers.max(1),
            max_retries: settings.max_retries,
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            max_retry_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_retry_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_base_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

/// Progress notifications from a running builder.
#[derive(Debug, Clone, PartialEq)]
pub enum BuilderEvent {
    Started {
        layer: String,
        missing: usize,
    },
    TileFetched {
        layer: String,
        tile: TileCoord,
        /// Every pixel was the sentinel; a zero-byte marker was written
        empty: bool,
    },
    TileFailed {
        layer: String,
        tile: TileCoord,
        error: String,
        attempts: u32,
    },
    BaseLevelComplete {
        layer: String,
        fetched: usize,
        failed: usize,
    },
    LevelFolded {
        layer: String,
        level: u32,
        written: usize,
        empty: usize,
    },
    Finished {
        layer: String,
        report: BuildReport,
    },
    Cancelled {
        layer: String,
    },
}

/// Summary of one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Base tiles fetched and written with data
    pub fetched: usize,
    /// Base tiles fetched and written as empty markers
    pub empty: usize,
    /// Base tiles already on disk at start
    pub skipped: usize,
    /// Base tiles that exhausted their retries
    pub failed: usize,
    /// Upstream requests issued, retries included
    pub requests: usize,
    /// Parent tiles written by the fold, markers included
    pub folded: usize,
    /// Parent tiles left for a later run
    pub deferred: usize,
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct WorkerStats {
    fetched: usize,
    empty: usize,
    skipped: usize,
    failed: usize,
    requests: usize,
}

enum FetchOutcome {
    Stored { empty: bool },
    Failed { error: String },
    Cancelled,
}

/// Fills and folds one tile cache from an upstream source.
pub struct TileCacheBuilder<C> {
    descriptor: Arc<TileCacheDescriptor>,
    status: Arc<TileStatusTable>,
    client: Arc<C>,
    options: BuilderOptions,
    events: Option<mpsc::UnboundedSender<BuilderEvent>>,
}

impl<C> Clone for TileCacheBuilder<C> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            status: Arc::clone(&self.status),
            client: Arc::clone(&self.client),
            options: self.options.clone(),
            events: self.events.clone(),
        }
    }
}

impl<C: UpstreamClient + 'static> TileCacheBuilder<C> {
    pub fn new(
        descriptor: Arc<TileCacheDescriptor>,
        status: Arc<TileStatusTable>,
        client: Arc<C>,
        options: BuilderOptions,
    ) -> Self {
        Self {
            descriptor,
            status,
            client,
            options,
            events: None,
        }
    }

    /// Send [`BuilderEvent`]s to `sender`.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<BuilderEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Run both phases to completion or cancellation.
    pub async fn run(self, cancel: CancellationToken) -> Result<BuildReport, CacheError> {
        let layer = self.descriptor.name.clone();
        let started = Instant::now();
        let mut report = BuildReport::default();

        let base = self.descriptor.grid().base_level();
        let missing = self.status.count(base, FileStatus::Missing);
        info!(
            layer = %layer,
            missing,
            levels = self.descriptor.num_levels(),
            workers = self.options.workers,
            "Tile cache build starting"
        );
        self.emit(BuilderEvent::Started {
            layer: layer.clone(),
            missing,
        });

        tokio::fs::create_dir_all(&self.descriptor.storage).await?;

        let stats = self.fill_base_level(&cancel).await?;
        report.fetched = stats.fetched;
        report.empty = stats.empty;
        report.skipped = stats.skipped;
        report.failed = stats.failed;
        report.requests = stats.requests;

        if cancel.is_cancelled() {
            return Ok(self.cancelled(report));
        }
        info!(
            layer = %layer,
            fetched = stats.fetched,
            empty = stats.empty,
            failed = stats.failed,
            requests = stats.requests,
            "Base level complete"
        );
        self.emit(BuilderEvent::BaseLevelComplete {
            layer: layer.clone(),
            fetched: stats.fetched + stats.empty,
            failed: stats.failed,
        });

        for level in (0..base).rev() {
            let folded = fold_level(
                Arc::clone(&self.descriptor),
                Arc::clone(&self.status),
                level,
                self.options.workers,
                cancel.clone(),
            )
            .await?;
            if cancel.is_cancelled() {
                return Ok(self.cancelled(report));
            }
            self.record_fold(&mut report, level, folded);
        }

        info!(
            layer = %layer,
            elapsed_ms = started.elapsed().as_millis() as u64,
            folded = report.folded,
            deferred = report.deferred,
            "Tile cache build finished"
        );
        self.emit(BuilderEvent::Finished {
            layer,
            report: report.clone(),
        });
        Ok(report)
    }

    /// Start [`run`](Self::run) as a task on `runtime`.
    pub fn spawn(self, runtime: &Handle, cancel: CancellationToken) -> BuilderHandle {
        let layer = self.descriptor.name.clone();
        let task = runtime.spawn(self.run(cancel.clone()));
        BuilderHandle {
            layer,
            cancel,
            task,
        }
    }

    async fn fill_base_level(&self, cancel: &CancellationToken) -> Result<WorkerStats, CacheError> {
        let workers = self.options.workers.max(1);
        let mut tasks = Vec::with_capacity(workers);
        for worker in 0..workers {
            let builder = self.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                builder.fill_partition(worker, workers, cancel).await
            }));
        }

        let mut total = WorkerStats::default();
        for task in tasks {
            let stats = task
                .await
                .map_err(|e| CacheError::Task(format!("base fill worker: {}", e)))?;
            total.fetched += stats.fetched;
            total.empty += stats.empty;
            total.skipped += stats.skipped;
            total.failed += stats.failed;
            total.requests += stats.requests;
        }
        Ok(total)
    }

    async fn fill_partition(
        &self,
        worker: usize,
        workers: usize,
        cancel: CancellationToken,
    ) -> WorkerStats {
        let grid = self.descriptor.grid();
        let base = grid.base_level();
        let mut stats = WorkerStats::default();

        for index in (worker..grid.level_len(base)).step_by(workers) {
            if cancel.is_cancelled() {
                break;
            }
            let Some(tile) = grid.coord_at(base, index) else {
                continue;
            };
            if self.status.get(tile) != FileStatus::Missing {
                stats.skipped += 1;
                continue;
            }

            let (outcome, attempts) = self.fetch_tile(tile, &cancel).await;
            stats.requests += attempts as usize;
            match outcome {
                FetchOutcome::Stored { empty } => {
                    let status = if empty {
                        stats.empty += 1;
                        FileStatus::EmptyConfirmed
                    } else {
                        stats.fetched += 1;
                        FileStatus::Present
                    };
                    self.status.set(tile, status);
                    self.emit(BuilderEvent::TileFetched {
                        layer: self.descriptor.name.clone(),
                        tile,
                        empty,
                    });
                }
                FetchOutcome::Failed { error } => {
                    warn!(
                        layer = %self.descriptor.name,
                        tile = %tile,
                        attempts,
                        error = %error,
                        "Giving up on tile"
                    );
                    stats.failed += 1;
                    self.status.set(tile, FileStatus::Failed);
                    self.emit(BuilderEvent::TileFailed {
                        layer: self.descriptor.name.clone(),
                        tile,
                        error,
                        attempts,
                    });
                }
                FetchOutcome::Cancelled => break,
            }
        }

        debug!(layer = %self.descriptor.name, worker, ?stats, "Base fill worker done");
        stats
    }

    /// Fetch and store one base tile. Returns the outcome and the number of
    /// requests issued.
    async fn fetch_tile(&self, tile: TileCoord, cancel: &CancellationToken) -> (FetchOutcome, u32) {
        let desc = &self.descriptor;
        let edge = desc.tile_pixels();
        let bbox = desc.fetch_bbox(tile);
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 0..=self.options.max_retries {
            if cancel.is_cancelled() {
                return (FetchOutcome::Cancelled, attempts);
            }

            attempts += 1;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return (FetchOutcome::Cancelled, attempts),
                result = desc.source.fetch(
                    self.client.as_ref(),
                    &bbox,
                    edge,
                    edge,
                    self.options.request_timeout,
                ) => result,
            };

            match result {
                Ok(image) => {
                    let empty = is_all_invalid(&image, desc.invalid_value);
                    let stored = if empty {
                        store_tile(desc, tile, None).await
                    } else {
                        match encode_tile(desc, &image) {
                            Ok(bytes) => store_tile(desc, tile, Some(bytes)).await,
                            Err(e) => Err(e),
                        }
                    };
                    return match stored {
                        Ok(()) => (FetchOutcome::Stored { empty }, attempts),
                        Err(e) => {
                            error!(layer = %desc.name, tile = %tile, error = %e, "Failed to store tile");
                            (
                                FetchOutcome::Failed {
                                    error: e.to_string(),
                                },
                                attempts,
                            )
                        }
                    };
                }
                Err(e) => {
                    debug!(
                        layer = %desc.name,
                        tile = %tile,
                        attempt = attempt + 1,
                        error = %e,
                        "Upstream fetch failed"
                    );
                    last_error = e.to_string();
                    if !e.is_retryable() {
                        break;
                    }
                }
            }

            if attempt < self.options.max_retries {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (FetchOutcome::Cancelled, attempts),
                    _ = tokio::time::sleep(self.options.backoff(attempt)) => {}
                }
            }
        }

        (FetchOutcome::Failed { error: last_error }, attempts)
    }

    fn record_fold(&self, report: &mut BuildReport, level: u32, stats: FoldStats) {
        report.folded += stats.written + stats.empty;
        report.deferred += stats.deferred;
        info!(
            layer = %self.descriptor.name,
            level,
            written = stats.written,
            empty = stats.empty,
            skipped = stats.skipped,
            deferred = stats.deferred,
            failed = stats.failed,
            "Level folded"
        );
        self.emit(BuilderEvent::LevelFolded {
            layer: self.descriptor.name.clone(),
            level,
            written: stats.written,
            empty: stats.empty,
        });
    }

    fn cancelled(&self, mut report: BuildReport) -> BuildReport {
        report.cancelled = true;
        info!(layer = %self.descriptor.name, "Tile cache build cancelled");
        self.emit(BuilderEvent::Cancelled {
            layer: self.descriptor.name.clone(),
        });
        report
    }

    fn emit(&self, event: BuilderEvent) {
        if let Some(events) = &self.events {
            // receiver gone means nobody is listening
            let _ = events.send(event);
        }
    }
}

/// A running builder task.
#[derive(Debug)]
pub struct BuilderHandle {
    layer: String,
    cancel: CancellationToken,
    task: JoinHandle<Result<BuildReport, CacheError>>,
}

impl BuilderHandle {
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Ask the builder to stop at the next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the builder to finish.
    pub async fn join(self) -> Result<BuildReport, CacheError> {
        self.task
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
    }

    /// Cancel the builder and wait for it to stop.
    pub async fn shutdown(self) -> Option<BuildReport> {
        self.cancel.cancel();
        let layer = self.layer.clone();
        match self.join().await {
            Ok(report) => {
                info!(layer = %layer, "Tile cache builder stopped");
                Some(report)
            }
            Err(e) => {
                error!(layer = %layer, error = %e, "Tile cache builder failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::descriptor::tests::test_descriptor;
    use crate::cache::status::scan_file_status;
    use crate::cache::Compression;
    use crate::provider::{MockUpstreamClient, ProviderError};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn options(workers: usize, max_retries: u32) -> BuilderOptions {
        BuilderOptions {
            workers,
            max_retries,
            retry_base_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(4),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn body(value: i16) -> Vec<u8> {
        std::iter::repeat(value.to_le_bytes())
            .take(36)
            .flatten()
            .collect()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let opts = BuilderOptions {
            retry_base_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_millis(1000),
            ..options(1, 5)
        };
        assert_eq!(opts.backoff(0), Duration::from_millis(100));
        assert_eq!(opts.backoff(1), Duration::from_millis(200));
        assert_eq!(opts.backoff(3), Duration::from_millis(800));
        assert_eq!(opts.backoff(4), Duration::from_millis(1000));
        assert_eq!(opts.backoff(40), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_run_fills_and_folds() {
        let temp = TempDir::new().unwrap();
        let desc = Arc::new(test_descriptor(temp.path(), Compression::Elevation));
        let status = Arc::new(scan_file_status(&desc).unwrap());
        let client = Arc::new(MockUpstreamClient::new(Ok(body(120))));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = TileCacheBuilder::new(
            Arc::clone(&desc),
            Arc::clone(&status),
            Arc::clone(&client),
            options(3, 2),
        )
        .with_events(tx)
        .run(CancellationToken::new())
        .await
        .unwrap();

        assert_eq!(report.fetched, 8);
        assert_eq!(report.requests, 8);
        assert_eq!(report.folded, 2);
        assert!(!report.cancelled);
        assert_eq!(client.calls.load(Ordering::SeqCst), 8);
        assert_eq!(status.count(0, FileStatus::Present), 2);

        let mut fetched = 0;
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                BuilderEvent::TileFetched { .. } => fetched += 1,
                BuilderEvent::Finished { .. } => finished = true,
                _ => {}
            }
        }
        assert_eq!(fetched, 8);
        assert!(finished);
    }

    #[tokio::test]
    async fn test_sentinel_tiles_become_markers() {
        let temp = TempDir::new().unwrap();
        let desc = Arc::new(test_descriptor(temp.path(), Compression::Raw));
        let status = Arc::new(scan_file_status(&desc).unwrap());
        let client = Arc::new(MockUpstreamClient::new(Ok(body(-32768))));

        let report = TileCacheBuilder::new(desc, Arc::clone(&status), client, options(2, 0))
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.empty, 8);
        assert_eq!(status.count(1, FileStatus::EmptyConfirmed), 8);
        assert_eq!(status.count(0, FileStatus::EmptyConfirmed), 2);
    }

    #[tokio::test]
    async fn test_retries_then_fails() {
        let temp = TempDir::new().unwrap();
        let desc = Arc::new(test_descriptor(temp.path(), Compression::Raw));
        let status = Arc::new(scan_file_status(&desc).unwrap());
        let client = Arc::new(MockUpstreamClient::new(Err(ProviderError::Status(503))));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let report = TileCacheBuilder::new(desc, Arc::clone(&status), Arc::clone(&client), options(4, 2))
            .with_events(tx)
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed, 8);
        assert_eq!(report.requests, 24);
        assert_eq!(report.deferred, 2);
        assert_eq!(status.count(1, FileStatus::Failed), 8);
        assert_eq!(status.count(0, FileStatus::Missing), 2);

        let mut failures = 0;
        while let Ok(event) = rx.try_recv() {
            if let BuilderEvent::TileFailed { attempts, .. } = event {
                assert_eq!(attempts, 3);
                failures += 1;
            }
        }
        assert_eq!(failures, 8);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let desc = Arc::new(test_descriptor(temp.path(), Compression::Raw));
        let status = Arc::new(scan_file_status(&desc).unwrap());
        let client = Arc::new(MockUpstreamClient::new(Ok(body(1))));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = TileCacheBuilder::new(desc, status, Arc::clone(&client), options(2, 0))
            .run(cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handle_join() {
        let temp = TempDir::new().unwrap();
        let desc = Arc::new(test_descriptor(temp.path(), Compression::Raw));
        let status = Arc::new(scan_file_status(&desc).unwrap());
        let client = Arc::new(MockUpstreamClient::new(Ok(body(7))));

        let handle = TileCacheBuilder::new(desc, status, client, options(2, 0))
            .spawn(&Handle::current(), CancellationToken::new());
        assert_eq!(handle.layer(), "test");
        let report = handle.join().await.unwrap();
        assert_eq!(report.fetched, 8);
    }
}
