//! Parsed CRS identifiers.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing or preparing a CRS.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrsError {
    /// Identifier is not `EPSG:<code>` or `CRS:84`
    #[error("Unrecognised CRS identifier '{0}'")]
    Unrecognised(String),

    /// EPSG code missing from the definitions database
    #[error("EPSG:{0} is not a supported CRS")]
    Unsupported(u16),

    /// proj4 definition rejected by the projection engine
    #[error("Cannot build projection for EPSG:{code}: {reason}")]
    Projection { code: u16, reason: String },
}

/// An EPSG-coded coordinate reference system.
///
/// Two handles are equal when their codes are equal. `CRS:84` parses to
/// EPSG:4326; bounding boxes are always read in x/y (lon/lat) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrsHandle {
    code: u16,
}

impl CrsHandle {
    /// WGS84 geographic.
    pub const WGS84: CrsHandle = CrsHandle { code: 4326 };
    /// Web Mercator.
    pub const WEB_MERCATOR: CrsHandle = CrsHandle { code: 3857 };

    pub fn from_epsg(code: u16) -> Self {
        Self { code }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// The proj4 definition for this code, if the database knows it.
    pub fn proj4(&self) -> Option<&'static str> {
        crs_definitions::from_code(self.code).map(|def| def.proj4)
    }

    /// Whether coordinates are longitude/latitude in degrees.
    pub fn is_geographic(&self) -> bool {
        match self.proj4() {
            Some(definition) => definition.contains("+proj=longlat"),
            None => self.code == 4326,
        }
    }
}

impl FromStr for CrsHandle {
    type Err = CrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(Self::WGS84);
        }
        normalized
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse::<u16>().ok())
            .map(Self::from_epsg)
            .ok_or_else(|| CrsError::Unrecognised(s.to_string()))
    }
}

impl fmt::Display for CrsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.code)
    }
}
