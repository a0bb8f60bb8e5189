//! Upstream raster providers.
//!
//! The tile cache builder pulls base tiles from a remote WMS through
//! [`UpstreamSource`], which builds GetMap URLs and validates response sizes.
//! Transport is abstracted behind [`UpstreamClient`].

mod http;
mod types;
mod upstream;

pub use http::{ReqwestUpstreamClient, UpstreamClient};
pub use types::ProviderError;
pub use upstream::UpstreamSource;

#[cfg(test)]
pub(crate) use http::tests::MockUpstreamClient;
