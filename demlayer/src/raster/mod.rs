//! Typed raster buffers shared by every layer, codec and resampler.
//!
//! An [`Image`] owns its pixels as a typed vector ([`PixelData`]) and may
//! carry an [`Encoded`] form of the same pixels (a compressed or visual
//! encoding produced by a layer or by the dispatcher).
//!
//! # Example
//!
//! ```
//! use demlayer::raster::{Image, PixelType};
//!
//! let mut image = Image::new(4, 2, PixelType::S16);
//! image.fill(-32768.0);
//! assert_eq!(image.as_s16().unwrap()[7], -32768);
//! assert_eq!(image.raw_bytes().len(), 4 * 2 * 2);
//! ```

mod image;
mod types;

pub use image::{Encoded, EncodedKind, Image, RasterError};
pub use types::{PixelData, PixelType, Sample};
