//! Lanczos kernel and the generic two-pass core.

use super::{ResampleError, SampleTransform};
use crate::raster::Sample;
use std::f64::consts::PI;

/// Lanczos `a` parameter: kernel support in unscaled source pixels.
pub const WINDOW_RADIUS: f64 = 3.0;

#[inline]
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// Weight sums below this count as no contribution.
const MIN_WEIGHT_SUM: f64 = 1e-9;

/// `sinc(x) * sinc(x / 3)` inside `|x| < 3`, zero outside.
///
/// Exactly zero at every nonzero integer, so a sample-aligned output reads
/// only the sample under it.
#[inline]
pub fn lanczos3(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else if x.abs() >= WINDOW_RADIUS || x.fract() == 0.0 {
        0.0
    } else {
        sinc(x) * sinc(x / WINDOW_RADIUS)
    }
}

/// Taps for one output coordinate: first source index and one weight per
/// consecutive source sample.
struct Taps {
    first: usize,
    weights: Vec<f64>,
}

/// Precomputes taps for each of `len` output positions along one axis.
///
/// Downsampling stretches the kernel by the scale so every source sample
/// inside the footprint contributes.
fn axis_taps(scale: f64, offset: f64, len: u32, origin: i64) -> Vec<Taps> {
    let stretch = scale.max(1.0);
    let radius = WINDOW_RADIUS * stretch;
    (0..len)
        .map(|i| {
            let center = i as f64 * scale + offset;
            let first = (center - radius).ceil() as i64;
            let last = (center + radius).floor() as i64;
            let weights = (first..=last)
                .map(|k| lanczos3((k as f64 - center) / stretch))
                .collect();
            Taps {
                first: (first - origin) as usize,
                weights,
            }
        })
        .collect()
}

/// Resamples typed sample slices.
///
/// `src` is `src_w × src_h`, `dst` is `dst_w × dst_h`, both row-major.
/// Pass one filters horizontally into an `f64` buffer covering only the
/// source rows the vertical pass reads, with NaN marking invalid results.
#[allow(clippy::too_many_arguments)]
pub fn resample_samples<T: Sample>(
    src: &[T],
    src_w: u32,
    src_h: u32,
    dst: &mut [T],
    dst_w: u32,
    dst_h: u32,
    transform: SampleTransform,
    invalid: f64,
) -> Result<(), ResampleError> {
    if !transform.is_valid() {
        return Err(ResampleError::InvalidTransform(transform));
    }
    if dst_w == 0 || dst_h == 0 {
        return Ok(());
    }

    let (x0, y0, x1, y1) = transform.required_source_window(dst_w, dst_h);
    if x0 < 0 || y0 < 0 || x1 >= src_w as i64 || y1 >= src_h as i64 {
        return Err(ResampleError::WindowOutOfBounds {
            x0,
            y0,
            x1,
            y1,
            width: src_w,
            height: src_h,
        });
    }

    let src_w = src_w as usize;
    let dst_w = dst_w as usize;
    let columns = axis_taps(transform.scale_x, transform.offset_x, dst_w as u32, 0);
    let rows = axis_taps(transform.scale_y, transform.offset_y, dst_h, y0);
    let band_rows = (y1 - y0 + 1) as usize;

    // Pass 1: horizontal
    let mut band = vec![f64::NAN; dst_w * band_rows];
    for r in 0..band_rows {
        let src_row = &src[(y0 as usize + r) * src_w..(y0 as usize + r + 1) * src_w];
        let out_row = &mut band[r * dst_w..(r + 1) * dst_w];
        for (out, taps) in out_row.iter_mut().zip(&columns) {
            let samples = src_row[taps.first..taps.first + taps.weights.len()]
                .iter()
                .map(|s| s.to_f64())
                .map(|v| if v == invalid { f64::NAN } else { v });
            *out = weighted_mean(samples, &taps.weights);
        }
    }

    // Pass 2: vertical
    for (j, taps) in rows.iter().enumerate() {
        for i in 0..dst_w {
            let samples = (0..taps.weights.len()).map(|k| band[(taps.first + k) * dst_w + i]);
            let value = weighted_mean(samples, &taps.weights);
            dst[j * dst_w + i] = if value.is_nan() {
                T::from_f64(invalid)
            } else {
                T::from_f64(value)
            };
        }
    }
    Ok(())
}

/// Normalised weighted sum skipping NaN samples; NaN when nothing contributed.
fn weighted_mean(samples: impl Iterator<Item = f64>, weights: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for (v, &w) in samples.zip(weights) {
        if v.is_nan() {
            continue;
        }
        sum += v * w;
        weight_sum += w;
    }
    if weight_sum.abs() < MIN_WEIGHT_SUM {
        f64::NAN
    } else {
        sum / weight_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_shape() {
        assert_eq!(lanczos3(0.0), 1.0);
        assert_eq!(lanczos3(3.0), 0.0);
        assert_eq!(lanczos3(-4.5), 0.0);
        assert_eq!(lanczos3(1.0), 0.0);
        assert_eq!(lanczos3(-2.0), 0.0);
        assert!(lanczos3(0.5) > 0.5);
        assert!(lanczos3(1.5) < 0.0);
        assert!((lanczos3(0.7) - lanczos3(-0.7)).abs() < 1e-15);
    }

    #[test]
    fn test_axis_taps_downsample_stretches_window() {
        let taps = axis_taps(2.0, 10.0, 1, 0);
        assert_eq!(taps[0].first, 4);
        assert_eq!(taps[0].weights.len(), 13);
    }

    #[test]
    fn test_weighted_mean_all_nan() {
        let v = weighted_mean([f64::NAN, f64::NAN].into_iter(), &[0.5, 0.5]);
        assert!(v.is_nan());
    }

    #[test]
    fn test_weighted_mean_negligible_weights() {
        let v = weighted_mean([f64::NAN, 4.0, 8.0].into_iter(), &[1.0, 3e-17, -1e-17]);
        assert!(v.is_nan());
    }

    #[test]
    fn test_weighted_mean_skips_nan() {
        let v = weighted_mean([f64::NAN, 4.0, 8.0].into_iter(), &[10.0, 1.0, 1.0]);
        assert_eq!(v, 6.0);
    }
}
