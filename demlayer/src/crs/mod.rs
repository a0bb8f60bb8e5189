//! Coordinate reference systems and memoized reprojection.
//!
//! Layers declare a fixed set of supported CRSs at init. [`TransformCache`]
//! builds a transform for every ordered pair up front so that requests never
//! construct projection objects. Identity pairs are represented by the
//! absence of a transform.
//!
//! Projection math is pure Rust: `crs-definitions` supplies the proj4 string
//! for an EPSG code and `proj4rs` performs the transform.

mod handle;
mod transform;

pub use handle::{CrsError, CrsHandle};
pub use transform::{CrsTransform, TransformCache, TransformKey};
