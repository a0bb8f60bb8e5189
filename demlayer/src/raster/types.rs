//! Pixel type definitions.

use std::fmt;
use std::str::FromStr;

/// Pixel layouts a raster can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// Unsigned 8-bit single channel
    U8,
    /// Signed 16-bit single channel (elevation)
    S16,
    /// Unsigned 32-bit single channel
    U32,
    /// 32-bit float single channel
    F32,
    /// 64-bit float single channel
    F64,
    /// Four 8-bit channels
    Rgba8,
}

impl PixelType {
    /// Size of one pixel in bytes.
    pub fn size_of(self) -> usize {
        match self {
            PixelType::U8 => 1,
            PixelType::S16 => 2,
            PixelType::U32 | PixelType::F32 | PixelType::Rgba8 => 4,
            PixelType::F64 => 8,
        }
    }

    /// Config/display name (`u8`, `s16`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            PixelType::U8 => "u8",
            PixelType::S16 => "s16",
            PixelType::U32 => "u32",
            PixelType::F32 => "f32",
            PixelType::F64 => "f64",
            PixelType::Rgba8 => "rgba8",
        }
    }

    /// `value` as it reads back after being stored in this type.
    pub fn quantize(self, value: f64) -> f64 {
        match self {
            PixelType::U8 | PixelType::Rgba8 => u8::from_f64(value).to_f64(),
            PixelType::S16 => i16::from_f64(value).to_f64(),
            PixelType::U32 => u32::from_f64(value).to_f64(),
            PixelType::F32 => f32::from_f64(value).to_f64(),
            PixelType::F64 => value,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "u8" => Ok(PixelType::U8),
            "s16" | "i16" => Ok(PixelType::S16),
            "u32" => Ok(PixelType::U32),
            "f32" => Ok(PixelType::F32),
            "f64" => Ok(PixelType::F64),
            "rgba8" => Ok(PixelType::Rgba8),
            other => Err(format!("unknown pixel type '{}'", other)),
        }
    }
}

/// Owned pixel storage, one variant per [`PixelType`].
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    S16(Vec<i16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Rgba8(Vec<[u8; 4]>),
}

impl PixelData {
    /// Allocate `len` zeroed pixels of the given type.
    pub fn zeroed(pixel_type: PixelType, len: usize) -> Self {
        match pixel_type {
            PixelType::U8 => PixelData::U8(vec![0; len]),
            PixelType::S16 => PixelData::S16(vec![0; len]),
            PixelType::U32 => PixelData::U32(vec![0; len]),
            PixelType::F32 => PixelData::F32(vec![0.0; len]),
            PixelType::F64 => PixelData::F64(vec![0.0; len]),
            PixelType::Rgba8 => PixelData::Rgba8(vec![[0; 4]; len]),
        }
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelData::U8(_) => PixelType::U8,
            PixelData::S16(_) => PixelType::S16,
            PixelData::U32(_) => PixelType::U32,
            PixelData::F32(_) => PixelType::F32,
            PixelData::F64(_) => PixelType::F64,
            PixelData::Rgba8(_) => PixelType::Rgba8,
        }
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        match self {
            PixelData::U8(v) => v.len(),
            PixelData::S16(v) => v.len(),
            PixelData::U32(v) => v.len(),
            PixelData::F32(v) => v.len(),
            PixelData::F64(v) => v.len(),
            PixelData::Rgba8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set every pixel to `value`. Rgba8 replicates the value into all channels.
    pub fn fill(&mut self, value: f64) {
        match self {
            PixelData::U8(v) => v.fill(u8::from_f64(value)),
            PixelData::S16(v) => v.fill(i16::from_f64(value)),
            PixelData::U32(v) => v.fill(u32::from_f64(value)),
            PixelData::F32(v) => v.fill(f32::from_f64(value)),
            PixelData::F64(v) => v.fill(value),
            PixelData::Rgba8(v) => {
                let c = u8::from_f64(value);
                v.fill([c; 4]);
            }
        }
    }

    /// Serialize pixels as little-endian bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.pixel_type().size_of());
        match self {
            PixelData::U8(v) => out.extend_from_slice(v),
            PixelData::S16(v) => v.iter().for_each(|p| out.extend_from_slice(&p.to_le_bytes())),
            PixelData::U32(v) => v.iter().for_each(|p| out.extend_from_slice(&p.to_le_bytes())),
            PixelData::F32(v) => v.iter().for_each(|p| out.extend_from_slice(&p.to_le_bytes())),
            PixelData::F64(v) => v.iter().for_each(|p| out.extend_from_slice(&p.to_le_bytes())),
            PixelData::Rgba8(v) => v.iter().for_each(|p| out.extend_from_slice(p)),
        }
        out
    }

    /// Widen every pixel to `f64`. Rgba8 yields its first channel.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            PixelData::U8(v) => v.iter().map(|s| s.to_f64()).collect(),
            PixelData::S16(v) => v.iter().map(|s| s.to_f64()).collect(),
            PixelData::U32(v) => v.iter().map(|s| s.to_f64()).collect(),
            PixelData::F32(v) => v.iter().map(|s| s.to_f64()).collect(),
            PixelData::F64(v) => v.clone(),
            PixelData::Rgba8(v) => v.iter().map(|p| p[0].to_f64()).collect(),
        }
    }

    /// Narrow `values` into `pixel_type`, rounding and saturating.
    pub fn from_f64_slice(pixel_type: PixelType, values: &[f64]) -> Self {
        fn narrow<T: Sample>(values: &[f64]) -> Vec<T> {
            values.iter().map(|&v| T::from_f64(v)).collect()
        }
        match pixel_type {
            PixelType::U8 => PixelData::U8(narrow(values)),
            PixelType::S16 => PixelData::S16(narrow(values)),
            PixelType::U32 => PixelData::U32(narrow(values)),
            PixelType::F32 => PixelData::F32(narrow(values)),
            PixelType::F64 => PixelData::F64(values.to_vec()),
            PixelType::Rgba8 => PixelData::Rgba8(
                values.iter().map(|&v| [u8::from_f64(v); 4]).collect(),
            ),
        }
    }

    /// Parse little-endian bytes. The caller guarantees `bytes.len()` is a
    /// multiple of the pixel size; a trailing partial pixel is dropped.
    pub fn from_le_bytes(pixel_type: PixelType, bytes: &[u8]) -> Self {
        match pixel_type {
            PixelType::U8 => PixelData::U8(bytes.to_vec()),
            PixelType::S16 => PixelData::S16(
                bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            PixelType::U32 => PixelData::U32(
                bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            PixelType::F32 => PixelData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            PixelType::F64 => PixelData::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(c);
                        f64::from_le_bytes(b)
                    })
                    .collect(),
            ),
            PixelType::Rgba8 => PixelData::Rgba8(
                bytes
                    .chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect(),
            ),
        }
    }
}

/// Scalar sample conversions used by resampling and pyramid folding.
///
/// `from_f64` rounds to nearest and saturates at the type's range.
pub trait Sample: Copy + PartialEq + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for u8 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value.round().clamp(u8::MIN as f64, u8::MAX as f64) as u8
    }
}

impl Sample for i16 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}

impl Sample for u32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value.round().clamp(u32::MIN as f64, u32::MAX as f64) as u32
    }
}

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Sample for f64 {
    fn to_f64(self) -> f64 {
        self
    }
    fn from_f64(value: f64) -> Self {
        value
    }
}
