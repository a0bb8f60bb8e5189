//! Service exceptions returned to clients.

use crate::layer::LayerError;
use std::fmt;
use thiserror::Error;

/// Stable, machine-readable exception codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    MissingParameterValue,
    InvalidParameterValue,
    OperationNotSupported,
    LayerNotDefined,
    InvalidFormat,
    InvalidSize,
    InvalidBBox,
    InvalidStyle,
    InvalidSrs,
    TileOutOfRange,
    InternalError,
}

impl ExceptionCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionCode::MissingParameterValue => "MissingParameterValue",
            ExceptionCode::InvalidParameterValue => "InvalidParameterValue",
            ExceptionCode::OperationNotSupported => "OperationNotSupported",
            ExceptionCode::LayerNotDefined => "LayerNotDefined",
            ExceptionCode::InvalidFormat => "InvalidFormat",
            ExceptionCode::InvalidSize => "InvalidSize",
            ExceptionCode::InvalidBBox => "InvalidBBOX",
            ExceptionCode::InvalidStyle => "InvalidStyle",
            ExceptionCode::InvalidSrs => "InvalidSRS",
            ExceptionCode::TileOutOfRange => "TileOutOfRange",
            ExceptionCode::InternalError => "InternalError",
        }
    }

    /// HTTP status: 500 for internal errors, 400 for everything the client
    /// can fix.
    ///
    /// `InternalError` covers server-side faults only, such as a tile not
    /// yet cached or unreadable source data, and is the one code sent as 500.
    pub fn status(self) -> u16 {
        match self {
            ExceptionCode::InternalError => 500,
            _ => 400,
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed request: exception code plus a short locator naming what was
/// wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {locator}")]
pub struct ServiceException {
    pub code: ExceptionCode,
    pub locator: String,
}

impl ServiceException {
    pub fn new(code: ExceptionCode, locator: impl Into<String>) -> Self {
        Self {
            code,
            locator: locator.into(),
        }
    }

    pub fn missing(parameter: &str) -> Self {
        Self::new(ExceptionCode::MissingParameterValue, parameter)
    }

    pub fn invalid_value(parameter: &str, value: &str) -> Self {
        Self::new(
            ExceptionCode::InvalidParameterValue,
            format!("{}={}", parameter, value),
        )
    }

    /// Response body: the code, then the locator on a second line.
    pub fn body(&self) -> Vec<u8> {
        format!("{}\n{}", self.code, self.locator).into_bytes()
    }
}

impl From<LayerError> for ServiceException {
    fn from(err: LayerError) -> Self {
        let code = match &err {
            LayerError::InvalidStyle(_) => ExceptionCode::InvalidStyle,
            LayerError::InvalidFormat(_) => ExceptionCode::InvalidFormat,
            LayerError::InvalidSrs(_) => ExceptionCode::InvalidSrs,
            LayerError::InvalidBBox(_) => ExceptionCode::InvalidBBox,
            LayerError::TileOutOfRange { .. } => ExceptionCode::TileOutOfRange,
            LayerError::OperationNotSupported => ExceptionCode::OperationNotSupported,
            LayerError::Internal(_) => ExceptionCode::InternalError,
        };
        Self::new(code, err.to_string())
    }
}
