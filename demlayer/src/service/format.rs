//! Content types and their pixel type preferences.

use crate::raster::PixelType;
use std::fmt;

/// Response formats the dispatcher can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Png,
    RawS16,
    RawU8,
    RawU32,
    /// S16 samples through the elevation codec
    Elevation,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Png,
        ContentType::RawS16,
        ContentType::RawU8,
        ContentType::RawU32,
        ContentType::Elevation,
    ];

    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Png => "image/png",
            ContentType::RawS16 => "application/raw-s16",
            ContentType::RawU8 => "application/raw-u8",
            ContentType::RawU32 => "application/raw-u32",
            ContentType::Elevation => "application/elevation",
        }
    }

    /// Look up a `format` parameter value (case-insensitive).
    pub fn from_mime(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|ct| ct.mime().eq_ignore_ascii_case(value))
    }

    /// Pixel types this format can be produced from, most preferred first.
    pub fn preferred_pixel_types(self) -> &'static [PixelType] {
        match self {
            ContentType::Png => &[PixelType::Rgba8, PixelType::U8, PixelType::U32],
            ContentType::RawS16 | ContentType::Elevation => &[PixelType::S16],
            ContentType::RawU8 => &[PixelType::U8],
            ContentType::RawU32 => &[PixelType::U32],
        }
    }

    /// First preferred pixel type the layer supports.
    pub fn negotiate(self, supported: &[PixelType]) -> Option<PixelType> {
        self.preferred_pixel_types()
            .iter()
            .copied()
            .find(|pt| supported.contains(pt))
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Pixel type delivered by a raw (uncompressed) content type.
///
/// Used to validate upstream formats, which must be raw.
pub fn raw_pixel_type(mime: &str) -> Option<PixelType> {
    match ContentType::from_mime(mime)? {
        ContentType::RawS16 => Some(PixelType::S16),
        ContentType::RawU8 => Some(PixelType::U8),
        ContentType::RawU32 => Some(PixelType::U32),
        ContentType::Png | ContentType::Elevation => None,
    }
}
