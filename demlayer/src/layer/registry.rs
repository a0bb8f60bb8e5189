//! Registry of initialised layers.

use super::types::RegistryError;
use super::{builtin_factories, Layer, LayerContext};
use crate::cache::BuilderHandle;
use crate::config::LayerSettings;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The set of layers being served, by name.
pub struct LayerRegistry {
    layers: HashMap<String, Arc<dyn Layer>>,
    order: Vec<String>,
    shutdown: CancellationToken,
    builders: Mutex<Vec<BuilderHandle>>,
}

impl LayerRegistry {
    /// Initialise every configured layer.
    ///
    /// A layer whose factory fails is logged and left out. Having no layer
    /// left at the end is fatal.
    pub fn build(settings: &[LayerSettings], ctx: &LayerContext) -> Result<Self, RegistryError> {
        let factories = builtin_factories();
        let mut layers = HashMap::new();
        let mut order = Vec::new();

        for layer_settings in settings {
            let kind = layer_settings.kind_name();
            let Some((_, factory)) = factories.iter().find(|(name, _)| *name == kind) else {
                warn!(layer = %layer_settings.name, kind, "No factory for layer kind");
                continue;
            };
            match factory(layer_settings, ctx) {
                Ok(layer) => {
                    info!(layer = %layer_settings.name, kind, "Layer initialised");
                    order.push(layer_settings.name.clone());
                    layers.insert(layer_settings.name.clone(), layer);
                }
                Err(e) => {
                    warn!(layer = %layer_settings.name, kind, error = %e, "Skipping layer");
                }
            }
        }

        if layers.is_empty() {
            ctx.cancel();
            return Err(RegistryError::NoLayers);
        }

        Ok(Self {
            layers,
            order,
            shutdown: ctx.shutdown_token(),
            builders: Mutex::new(ctx.take_builders()),
        })
    }

    /// Registry over already constructed layers, with no builders attached.
    pub fn from_layers(layers: Vec<Arc<dyn Layer>>) -> Self {
        let order = layers.iter().map(|l| l.name().to_string()).collect();
        let layers = layers
            .into_iter()
            .map(|l| (l.name().to_string(), l))
            .collect();
        Self {
            layers,
            order,
            shutdown: CancellationToken::new(),
            builders: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Layer>> {
        self.layers.get(name)
    }

    /// Layer names in configuration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of cache builders still running.
    pub fn active_builders(&self) -> usize {
        self.builders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|b| !b.is_finished())
            .count()
    }

    /// Cancel all cache builders and wait for them to stop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let builders =
            std::mem::take(&mut *self.builders.lock().unwrap_or_else(PoisonError::into_inner));
        if builders.is_empty() {
            return;
        }
        info!(count = builders.len(), "Stopping tile cache builders");
        for builder in builders {
            builder.shutdown().await;
        }
    }
}
