//! The raster buffer type.

use super::types::{PixelData, PixelType};
use thiserror::Error;

/// Raster construction errors.
#[derive(Debug, Error, PartialEq)]
pub enum RasterError {
    /// Pixel count does not match `width * height`
    #[error("Buffer size mismatch: expected {expected} bytes for {width}x{height} {pixel_type}, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        pixel_type: PixelType,
        expected: usize,
        actual: usize,
    },
}

/// What an [`Encoded`] buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodedKind {
    /// Little-endian copy of the raw pixels
    Raw,
    /// Elevation codec stream (S16 only)
    Elevation,
    /// PNG image
    Png,
}

/// An encoded form of an image's pixels, owned independently of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub kind: EncodedKind,
    pub bytes: Vec<u8>,
}

impl Encoded {
    pub fn new(kind: EncodedKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }
}

/// A rectangular raster of typed pixels in row-major order.
///
/// `data.len() == width * height` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    data: PixelData,
    encoded: Option<Encoded>,
}

impl Image {
    /// Create a zero-filled image.
    pub fn new(width: u32, height: u32, pixel_type: PixelType) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            data: PixelData::zeroed(pixel_type, len),
            encoded: None,
        }
    }

    /// Create an image with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, pixel_type: PixelType, value: f64) -> Self {
        let mut image = Self::new(width, height, pixel_type);
        image.fill(value);
        image
    }

    /// Wrap existing pixel data, checking its length.
    pub fn from_data(width: u32, height: u32, data: PixelData) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            let pixel_type = data.pixel_type();
            return Err(RasterError::BufferSize {
                width,
                height,
                pixel_type,
                expected: expected * pixel_type.size_of(),
                actual: data.len() * pixel_type.size_of(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            encoded: None,
        })
    }

    /// Parse a little-endian raw buffer.
    pub fn from_le_bytes(
        width: u32,
        height: u32,
        pixel_type: PixelType,
        bytes: &[u8],
    ) -> Result<Self, RasterError> {
        let expected = width as usize * height as usize * pixel_type.size_of();
        if bytes.len() != expected {
            return Err(RasterError::BufferSize {
                width,
                height,
                pixel_type,
                expected,
                actual: bytes.len(),
            });
        }
        Self::from_data(width, height, PixelData::from_le_bytes(pixel_type, bytes))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_type(&self) -> PixelType {
        self.data.pixel_type()
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut PixelData {
        &mut self.data
    }

    pub fn into_data(self) -> PixelData {
        self.data
    }

    /// Replace the pixels with data of the same length.
    ///
    /// Any encoded form is dropped since it no longer describes the pixels.
    pub fn replace_data(&mut self, data: PixelData) -> Result<(), RasterError> {
        let replacement = Self::from_data(self.width, self.height, data)?;
        self.data = replacement.data;
        self.encoded = None;
        Ok(())
    }

    /// Little-endian serialization of the pixels.
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.data.to_le_bytes()
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
        self.encoded = None;
    }

    pub fn as_s16(&self) -> Option<&[i16]> {
        match &self.data {
            PixelData::S16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_s16_mut(&mut self) -> Option<&mut [i16]> {
        match &mut self.data {
            PixelData::S16(v) => Some(v),
            _ => None,
        }
    }

    pub fn encoded(&self) -> Option<&Encoded> {
        self.encoded.as_ref()
    }

    pub fn set_encoded(&mut self, encoded: Encoded) {
        self.encoded = Some(encoded);
    }

    pub fn take_encoded(&mut self) -> Option<Encoded> {
        self.encoded.take()
    }
}
