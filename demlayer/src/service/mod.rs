//! The WMS/WMTS request surface.
//!
//! [`Dispatcher`] turns query arguments into layer calls and encodes the
//! resulting image; failures become [`ServiceException`]s with a stable code.

mod dispatcher;
mod encode;
mod exception;
mod format;
mod params;

pub use dispatcher::{Dispatcher, ServiceResponse, MAX_IMAGE_EDGE};
pub use encode::{encode, EncodeError};
pub use exception::{ExceptionCode, ServiceException};
pub use format::{raw_pixel_type, ContentType};
pub use params::QueryParams;
