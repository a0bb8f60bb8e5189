//! The layer protocol.
//!
//! A [`Layer`] answers GetMap and/or GetTile requests by filling a
//! caller-allocated [`Image`]. Layers are created from configuration by the
//! factories in [`builtin_factories`] and collected in a [`LayerRegistry`]
//! that stays immutable once serving starts.

pub mod grid;
mod registry;
mod types;

pub use registry::LayerRegistry;
pub use types::{
    is_default_style, GetMapRequest, GetTileRequest, LayerError, LayerInitError, RegistryError,
};

use crate::cache::{BuilderEvent, BuilderHandle, CacheLayer};
use crate::config::{LayerSettings, DEFAULT_INVALID_VALUE};
use crate::crs::CrsHandle;
use crate::raster::{Image, PixelType};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A raster layer.
///
/// On `Ok` a handler has fully populated `out`; it never keeps a reference
/// to it. Handlers are called concurrently from many request threads.
pub trait Layer: Send + Sync {
    fn name(&self) -> &str;

    /// Pixel types this layer can write into `out`.
    fn supported_pixel_types(&self) -> &[PixelType];

    /// CRSs accepted in GetMap requests.
    fn supported_crs(&self) -> &[CrsHandle];

    fn handle_get_map(&self, _request: &GetMapRequest, _out: &mut Image) -> Result<(), LayerError> {
        Err(LayerError::OperationNotSupported)
    }

    fn handle_get_tile(
        &self,
        _request: &GetTileRequest,
        _out: &mut Image,
    ) -> Result<(), LayerError> {
        Err(LayerError::OperationNotSupported)
    }

    /// Size of the images GetTile produces, `None` for layers without tiles.
    fn tile_dimensions(&self) -> Option<(u32, u32)> {
        None
    }

    /// No-data sentinel of this layer's samples.
    fn invalid_value(&self) -> f64 {
        DEFAULT_INVALID_VALUE
    }
}

/// Creates a layer from its configuration section.
pub type LayerFactory = fn(&LayerSettings, &LayerContext) -> Result<Arc<dyn Layer>, LayerInitError>;

/// Factories for every layer kind, keyed by the `kind` config value.
pub fn builtin_factories() -> &'static [(&'static str, LayerFactory)] {
    &[("grid", grid::create), ("cache", CacheLayer::create)]
}

/// Shared state handed to layer factories.
///
/// Cache layers spawn their builders on `runtime` when one is set and park
/// the handles here so the registry can stop them on shutdown.
#[derive(Debug, Default)]
pub struct LayerContext {
    runtime: Option<Handle>,
    shutdown: CancellationToken,
    builders: Mutex<Vec<BuilderHandle>>,
    events: Option<mpsc::UnboundedSender<BuilderEvent>>,
}

impl LayerContext {
    /// A context that never starts background builders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start cache builders on `runtime`.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Forward builder events to `sender`.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<BuilderEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }

    pub fn events(&self) -> Option<&mpsc::UnboundedSender<BuilderEvent>> {
        self.events.as_ref()
    }

    /// Token cancelled when the registry shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn register_builder(&self, handle: BuilderHandle) {
        self.builders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    pub(crate) fn take_builders(&self) -> Vec<BuilderHandle> {
        std::mem::take(&mut *self.builders.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn cancel(&self) {
        self.shutdown.cancel();
    }
}
