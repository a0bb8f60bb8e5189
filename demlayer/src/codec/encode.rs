//! Segmentation and serialization.

use super::{CodecError, BULK_FLAG, MAX_DELTA, MAX_SEGMENT_LEN, RLE_FLAG, SHORT_RUN_LEN};
use crate::raster::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Rle,
    Bulk,
}

/// A contiguous span of one row with its value range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    kind: SegmentKind,
    start: usize,
    len: usize,
    min: i32,
    max: i32,
}

impl Segment {
    /// Whether `other` can be absorbed into this bulk segment.
    fn can_absorb(&self, other: &Segment) -> bool {
        self.kind == SegmentKind::Bulk
            && self.len + other.len <= MAX_SEGMENT_LEN
            && self.max.max(other.max) - self.min.min(other.min) <= MAX_DELTA
    }

    fn absorb(&mut self, other: &Segment) {
        self.start = self.start.min(other.start);
        self.len += other.len;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

/// Encodes an S16 image.
///
/// Any other pixel type is rejected with [`CodecError::UnsupportedPixelType`].
pub fn compress(image: &Image, invalid: i16) -> Result<Vec<u8>, CodecError> {
    let samples = image
        .as_s16()
        .ok_or(CodecError::UnsupportedPixelType(image.pixel_type()))?;
    compress_s16(samples, image.width(), image.height(), invalid)
}

/// Encodes `width × height` row-major samples.
pub fn compress_s16(
    samples: &[i16],
    width: u32,
    height: u32,
    invalid: i16,
) -> Result<Vec<u8>, CodecError> {
    let (width, height) = (width as usize, height as usize);
    if samples.len() != width * height {
        return Err(CodecError::SampleCount {
            expected: width * height,
            actual: samples.len(),
        });
    }

    let mut out = vec![0u8; height * 4];
    for row in 0..height {
        let offset = u32::try_from(out.len()).map_err(|_| CodecError::StreamTooLarge(out.len()))?;
        out[row * 4..row * 4 + 4].copy_from_slice(&offset.to_be_bytes());

        let values = &samples[row * width..(row + 1) * width];
        let segments = merge_short_runs(segment_row(values), invalid);
        for segment in &segments {
            write_segment(&mut out, values, segment);
        }
    }

    if out.len() > u32::MAX as usize {
        return Err(CodecError::StreamTooLarge(out.len()));
    }
    Ok(out)
}

/// Greedy left-to-right classification of a row into RLE and bulk spans.
fn segment_row(values: &[i16]) -> Vec<Segment> {
    let n = values.len();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < n {
        let first = values[i] as i32;
        let mut segment = Segment {
            kind: SegmentKind::Bulk,
            start: i,
            len: 1,
            min: first,
            max: first,
        };

        if i + 1 < n && values[i] == values[i + 1] {
            segment.kind = SegmentKind::Rle;
            while i + segment.len < n
                && segment.len < MAX_SEGMENT_LEN
                && values[i + segment.len] == values[i]
            {
                segment.len += 1;
            }
        } else {
            while i + segment.len < n && segment.len < MAX_SEGMENT_LEN {
                let j = i + segment.len;
                if j + 1 < n && values[j] == values[j + 1] {
                    break;
                }
                let v = values[j] as i32;
                let (min, max) = (segment.min.min(v), segment.max.max(v));
                if max - min > MAX_DELTA {
                    break;
                }
                segment.min = min;
                segment.max = max;
                segment.len += 1;
            }
        }

        i += segment.len;
        segments.push(segment);
    }
    segments
}

/// Single pass folding short non-sentinel runs into an adjacent bulk segment.
///
/// The preceding bulk segment is tried first, then the following one. Each
/// short run gets exactly one attempt.
fn merge_short_runs(segments: Vec<Segment>, invalid: i16) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    let mut pending = segments.into_iter().peekable();

    while let Some(segment) = pending.next() {
        let short_run = segment.kind == SegmentKind::Rle
            && segment.len <= SHORT_RUN_LEN
            && segment.min != invalid as i32;
        if !short_run {
            merged.push(segment);
            continue;
        }

        if let Some(prev) = merged.last_mut() {
            if prev.can_absorb(&segment) {
                prev.absorb(&segment);
                continue;
            }
        }
        if let Some(next) = pending.peek_mut() {
            if next.can_absorb(&segment) {
                next.absorb(&segment);
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}

fn write_segment(out: &mut Vec<u8>, values: &[i16], segment: &Segment) {
    let len = segment.len as u16;
    match segment.kind {
        SegmentKind::Rle => {
            out.push(RLE_FLAG);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(&values[segment.start].to_be_bytes());
        }
        SegmentKind::Bulk => {
            let reference = segment.min as i16;
            out.push(BULK_FLAG);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(&reference.to_be_bytes());
            out.extend(
                values[segment.start..segment.start + segment.len]
                    .iter()
                    .map(|&v| (v as i32 - segment.min) as u8),
            );
        }
    }
}
