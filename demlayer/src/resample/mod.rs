//! Separable Lanczos (a = 3) resampling between same-typed rasters.
//!
//! A [`SampleTransform`] maps destination pixel `(i, j)` to the source
//! coordinate `(i * scale_x + offset_x, j * scale_y + offset_y)`, where source
//! pixel `k` is centred on coordinate `k`. Samples equal to the sentinel are
//! skipped; a destination pixel with no valid contributor receives the
//! sentinel.
//!
//! The caller must supply a source that covers the kernel window around every
//! mapped coordinate. Layers do this by copying a padded source window, see
//! [`SampleTransform::required_source_window`].

mod lanczos;

pub use lanczos::{lanczos3, resample_samples, WINDOW_RADIUS};

use crate::raster::{Image, PixelData, PixelType};
use thiserror::Error;

/// Destination-to-source affine mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl SampleTransform {
    pub fn new(scale_x: f64, scale_y: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale_x,
            scale_y,
            offset_x,
            offset_y,
        }
    }

    /// Pixel-for-pixel copy shifted by an integer offset.
    pub fn identity() -> Self {
        Self::new(1.0, 1.0, 0.0, 0.0)
    }

    /// The same mapping expressed against a source window starting at
    /// `(x0, y0)` of the original source.
    pub fn shifted(&self, x0: i64, y0: i64) -> Self {
        Self {
            offset_x: self.offset_x - x0 as f64,
            offset_y: self.offset_y - y0 as f64,
            ..*self
        }
    }

    /// Kernel support radius in source pixels for each axis.
    pub fn radius(&self) -> (f64, f64) {
        (
            WINDOW_RADIUS * self.scale_x.max(1.0),
            WINDOW_RADIUS * self.scale_y.max(1.0),
        )
    }

    /// Inclusive source pixel range `(x0, y0, x1, y1)` read when producing a
    /// `dst_width × dst_height` output. May be negative or exceed the source.
    pub fn required_source_window(&self, dst_width: u32, dst_height: u32) -> (i64, i64, i64, i64) {
        let (rx, ry) = self.radius();
        let (x0, x1) = tap_span(self.scale_x, self.offset_x, rx, dst_width);
        let (y0, y1) = tap_span(self.scale_y, self.offset_y, ry, dst_height);
        (x0, y0, x1, y1)
    }

    fn is_valid(&self) -> bool {
        self.scale_x > 0.0
            && self.scale_y > 0.0
            && self.scale_x.is_finite()
            && self.scale_y.is_finite()
            && self.offset_x.is_finite()
            && self.offset_y.is_finite()
    }
}

fn tap_span(scale: f64, offset: f64, radius: f64, dst_len: u32) -> (i64, i64) {
    let last = dst_len.saturating_sub(1) as f64 * scale + offset;
    (
        (offset - radius).ceil() as i64,
        (last + radius).floor() as i64,
    )
}

/// Resampling errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResampleError {
    /// Source and destination pixel types differ
    #[error("Pixel type mismatch: source {src}, destination {dst}")]
    PixelTypeMismatch { src: PixelType, dst: PixelType },

    /// Pixel type the resampler cannot interpolate
    #[error("Resampling {0} rasters is not supported")]
    UnsupportedPixelType(PixelType),

    /// Kernel window would read outside the source raster
    #[error("Kernel window {x0},{y0}..{x1},{y1} exceeds {width}x{height} source")]
    WindowOutOfBounds {
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        width: u32,
        height: u32,
    },

    /// Non-positive or non-finite scale/offset
    #[error("Invalid sample transform {0:?}")]
    InvalidTransform(SampleTransform),
}

/// Resamples `src` into `dst` (which fixes the output size and type).
pub fn resample(
    src: &Image,
    dst: &mut Image,
    transform: SampleTransform,
    invalid: f64,
) -> Result<(), ResampleError> {
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = dst.dimensions();

    match (src.data(), dst.data_mut()) {
        (PixelData::U8(s), PixelData::U8(d)) => {
            resample_samples(s, src_w, src_h, d, dst_w, dst_h, transform, invalid)
        }
        (PixelData::S16(s), PixelData::S16(d)) => {
            resample_samples(s, src_w, src_h, d, dst_w, dst_h, transform, invalid)
        }
        (PixelData::U32(s), PixelData::U32(d)) => {
            resample_samples(s, src_w, src_h, d, dst_w, dst_h, transform, invalid)
        }
        (PixelData::F32(s), PixelData::F32(d)) => {
            resample_samples(s, src_w, src_h, d, dst_w, dst_h, transform, invalid)
        }
        (PixelData::F64(s), PixelData::F64(d)) => {
            resample_samples(s, src_w, src_h, d, dst_w, dst_h, transform, invalid)
        }
        (PixelData::Rgba8(_), PixelData::Rgba8(_)) => {
            Err(ResampleError::UnsupportedPixelType(PixelType::Rgba8))
        }
        (s, d) => Err(ResampleError::PixelTypeMismatch {
            src: s.pixel_type(),
            dst: d.pixel_type(),
        }),
    }
}
