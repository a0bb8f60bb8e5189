//! Pyramid fold: derive each coarser level from the one below it.
//!
//! A parent tile `(l, c, r)` covers children `(l+1, 2c+dx, 2r+dy)`. Its core
//! pixel `(i, j)` is the mean of the non-sentinel samples in the 2x2 block
//! starting at mosaic pixel `(2i, 2j)`, where the mosaic is the four child
//! cores laid side by side. Parent padding samples read the children's
//! padding where it exists and otherwise the nearest stored child sample.

use super::descriptor::TileCacheDescriptor;
use super::status::TileStatusTable;
use super::storage::{decode_tile, encode_tile, read_tile, write_tile};
use super::types::{CacheError, FileStatus};
use crate::coord::TileCoord;
use crate::raster::{Image, PixelData};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-level fold counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Parents written with data
    pub written: usize,
    /// Parents written as zero-byte markers
    pub empty: usize,
    /// Parents already on disk
    pub skipped: usize,
    /// Parents left `Missing` because a child failed or is missing
    pub deferred: usize,
    /// Parents that could not be read or written
    pub failed: usize,
}

impl FoldStats {
    fn merge(&mut self, other: FoldStats) {
        self.written += other.written;
        self.empty += other.empty;
        self.skipped += other.skipped;
        self.deferred += other.deferred;
        self.failed += other.failed;
    }
}

enum FoldOutcome {
    Written,
    Empty,
    Skipped,
    Deferred,
}

/// Fold `level + 1` into `level` using `workers` blocking threads.
///
/// Worker `w` owns parent indices `i % workers == w`. Returns once every
/// worker has finished the level.
pub async fn fold_level(
    desc: Arc<TileCacheDescriptor>,
    status: Arc<TileStatusTable>,
    level: u32,
    workers: usize,
    cancel: CancellationToken,
) -> Result<FoldStats, CacheError> {
    let workers = workers.max(1);
    let mut tasks = Vec::with_capacity(workers);
    for worker in 0..workers {
        let desc = Arc::clone(&desc);
        let status = Arc::clone(&status);
        let cancel = cancel.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            fold_partition(&desc, &status, level, worker, workers, &cancel)
        }));
    }

    let mut stats = FoldStats::default();
    for task in tasks {
        let partial = task
            .await
            .map_err(|e| CacheError::Task(format!("fold worker: {}", e)))?;
        stats.merge(partial);
    }
    Ok(stats)
}

fn fold_partition(
    desc: &TileCacheDescriptor,
    status: &TileStatusTable,
    level: u32,
    worker: usize,
    workers: usize,
    cancel: &CancellationToken,
) -> FoldStats {
    let mut stats = FoldStats::default();
    let len = desc.grid().level_len(level);

    for index in (worker..len).step_by(workers) {
        if cancel.is_cancelled() {
            break;
        }
        let Some(parent) = desc.grid().coord_at(level, index) else {
            continue;
        };
        match fold_tile(desc, status, parent) {
            Ok(FoldOutcome::Written) => stats.written += 1,
            Ok(FoldOutcome::Empty) => stats.empty += 1,
            Ok(FoldOutcome::Skipped) => stats.skipped += 1,
            Ok(FoldOutcome::Deferred) => stats.deferred += 1,
            Err(e) => {
                warn!(layer = %desc.name, tile = %parent, error = %e, "Pyramid fold failed");
                stats.failed += 1;
            }
        }
    }
    stats
}

fn fold_tile(
    desc: &TileCacheDescriptor,
    status: &TileStatusTable,
    parent: TileCoord,
) -> Result<FoldOutcome, CacheError> {
    if status.get(parent).is_on_disk() {
        return Ok(FoldOutcome::Skipped);
    }

    let grid = desc.grid();
    let mut children: [Option<Vec<f64>>; 4] = Default::default();
    for (slot, child) in children.iter_mut().zip(parent.children()) {
        if !grid.contains(child) {
            continue;
        }
        match status.get(child) {
            FileStatus::Present => {
                let image = decode_tile(desc, child, read_tile(desc, child)?)?;
                *slot = Some(image.data().to_f64_vec());
            }
            FileStatus::EmptyConfirmed => {}
            FileStatus::Missing | FileStatus::Failed => {
                debug!(layer = %desc.name, tile = %parent, child = %child, "Deferring parent");
                return Ok(FoldOutcome::Deferred);
            }
        }
    }

    if children.iter().all(Option::is_none) {
        write_tile(desc, parent, None)?;
        status.set(parent, FileStatus::EmptyConfirmed);
        return Ok(FoldOutcome::Empty);
    }

    let pixel_type = desc.pixel_type();
    let sentinel = pixel_type.quantize(desc.invalid_value);
    let samples = downsample(desc, &children, sentinel);
    let image = Image::from_data(
        desc.tile_pixels(),
        desc.tile_pixels(),
        PixelData::from_f64_slice(pixel_type, &samples),
    )?;
    let bytes = encode_tile(desc, &image)?;
    write_tile(desc, parent, Some(bytes.as_slice()))?;
    status.set(parent, FileStatus::Present);
    Ok(FoldOutcome::Written)
}

/// Build the parent's padded samples from up to four padded children
/// ordered `[top-left, top-right, bottom-left, bottom-right]`.
fn downsample(desc: &TileCacheDescriptor, children: &[Option<Vec<f64>>; 4], sentinel: f64) -> Vec<f64> {
    let edge = desc.tile_pixels() as i64;
    let tile = desc.tile_size as i64;
    let pad = desc.padding as i64;

    // Mosaic coordinates stored by some child: [-pad, 2*tile + pad).
    let sample = |mx: i64, my: i64| -> Option<f64> {
        let mx = mx.clamp(-pad, 2 * tile + pad - 1);
        let my = my.clamp(-pad, 2 * tile + pad - 1);
        let dx = usize::from(mx >= tile);
        let dy = usize::from(my >= tile);
        let lx = mx - dx as i64 * tile + pad;
        let ly = my - dy as i64 * tile + pad;
        let value = children[dy * 2 + dx].as_ref()?[(ly * edge + lx) as usize];
        (value != sentinel).then_some(value)
    };

    let mut out = Vec::with_capacity((edge * edge) as usize);
    for py in 0..edge {
        for px in 0..edge {
            let (mx, my) = (2 * (px - pad), 2 * (py - pad));
            let mut sum = 0.0;
            let mut count = 0u32;
            for (ox, oy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                if let Some(v) = sample(mx + ox, my + oy) {
                    sum += v;
                    count += 1;
                }
            }
            out.push(if count == 0 {
                sentinel
            } else {
                sum / count as f64
            });
        }
    }
    out
}
