//! On-disk tile pyramid: layout, status tracking, background building and
//! the WMTS layer that serves it.
//!
//! Tiles live at `{storage}/{level}/{row}/{col}{ext}` with level
//! `num_levels - 1` the finest. A zero-byte file marks a tile that is known
//! to hold only the sentinel. The status of every tile is derived once from
//! a directory scan at startup and then kept in memory, where the builder
//! updates it as tiles are written.

mod builder;
mod descriptor;
mod layer;
mod path;
mod pyramid;
mod status;
mod storage;
mod types;

pub use builder::{BuildReport, BuilderEvent, BuilderHandle, BuilderOptions, TileCacheBuilder};
pub use descriptor::TileCacheDescriptor;
pub use layer::CacheLayer;
pub use path::{parse_tile_path, tile_path};
pub use pyramid::{fold_level, FoldStats};
pub use status::{scan_file_status, TileStatusTable};
pub use storage::{decode_tile, encode_tile, read_tile, write_tile};
pub use types::{CacheError, Compression, FileStatus};
