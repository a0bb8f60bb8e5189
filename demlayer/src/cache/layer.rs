//! WMTS layer serving tiles straight from the on-disk cache.

use super::builder::{BuilderOptions, TileCacheBuilder};
use super::descriptor::TileCacheDescriptor;
use super::status::{scan_file_status, TileStatusTable};
use super::storage::{decode_tile, read_tile};
use super::types::FileStatus;
use crate::config::{LayerKindSettings, LayerSettings};
use crate::coord::TileCoord;
use crate::crs::CrsHandle;
use crate::layer::{
    is_default_style, GetTileRequest, Layer, LayerContext, LayerError, LayerInitError,
};
use crate::provider::ReqwestUpstreamClient;
use crate::raster::{Image, PixelType};
use std::sync::Arc;
use tracing::{error, info, trace};

/// Serves cached tiles. Never fetches upstream on the request path; tiles
/// the builder has not produced yet are reported as internal errors.
pub struct CacheLayer {
    descriptor: Arc<TileCacheDescriptor>,
    status: Arc<TileStatusTable>,
    pixel_types: [PixelType; 1],
    supported_crs: [CrsHandle; 1],
}

impl CacheLayer {
    pub fn new(descriptor: Arc<TileCacheDescriptor>, status: Arc<TileStatusTable>) -> Self {
        Self {
            pixel_types: [descriptor.pixel_type()],
            supported_crs: [descriptor.crs()],
            descriptor,
            status,
        }
    }

    pub fn descriptor(&self) -> &TileCacheDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> &TileStatusTable {
        &self.status
    }

    /// Factory for `kind = cache`.
    ///
    /// Scans the storage tree and, when the context carries a runtime,
    /// starts the background builder for this cache.
    pub fn create(
        settings: &LayerSettings,
        ctx: &LayerContext,
    ) -> Result<Arc<dyn Layer>, LayerInitError> {
        let LayerKindSettings::Cache(cache) = &settings.kind else {
            return Err(LayerInitError::setting("kind", "expected a cache layer"));
        };
        let descriptor = Arc::new(TileCacheDescriptor::from_settings(&settings.name, cache)?);
        let status = Arc::new(scan_file_status(&descriptor)?);

        if let Some(runtime) = ctx.runtime() {
            let client = ReqwestUpstreamClient::with_timeout(cache.request_timeout_secs)
                .map_err(|e| LayerInitError::Other(e.to_string()))?;
            let mut builder = TileCacheBuilder::new(
                Arc::clone(&descriptor),
                Arc::clone(&status),
                Arc::new(client),
                BuilderOptions::from_settings(cache),
            );
            if let Some(events) = ctx.events() {
                builder = builder.with_events(events.clone());
            }
            ctx.register_builder(builder.spawn(runtime, ctx.shutdown_token().child_token()));
            info!(layer = %settings.name, "Tile cache builder started");
        }

        Ok(Arc::new(Self::new(descriptor, status)))
    }

    fn load_tile(&self, coord: TileCoord, out: &mut Image) -> Result<(), LayerError> {
        let desc = &self.descriptor;
        let mut tile = read_tile(desc, coord)
            .and_then(|bytes| decode_tile(desc, coord, bytes))
            .map_err(|e| {
                error!(layer = %desc.name, tile = %coord, error = %e, "Failed to load cached tile");
                LayerError::Internal(e.to_string())
            })?;
        let encoded = tile.take_encoded();
        out.replace_data(tile.into_data())
            .map_err(|e| LayerError::Internal(e.to_string()))?;
        if let Some(encoded) = encoded {
            out.set_encoded(encoded);
        }
        Ok(())
    }
}

impl Layer for CacheLayer {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn supported_pixel_types(&self) -> &[PixelType] {
        &self.pixel_types
    }

    fn supported_crs(&self) -> &[CrsHandle] {
        &self.supported_crs
    }

    fn handle_get_tile(&self, request: &GetTileRequest, out: &mut Image) -> Result<(), LayerError> {
        if !is_default_style(&request.styles) {
            return Err(LayerError::InvalidStyle(request.styles.clone()));
        }
        if request.tile_matrix_set != self.descriptor.tile_matrix_set {
            return Err(LayerError::InvalidSrs(request.tile_matrix_set.clone()));
        }
        if out.pixel_type() != self.descriptor.pixel_type() {
            return Err(LayerError::InvalidFormat(out.pixel_type()));
        }

        let coord = TileCoord::new(request.tile_matrix, request.tile_col, request.tile_row);
        if !self.descriptor.grid().contains(coord) {
            return Err(LayerError::TileOutOfRange {
                matrix: request.tile_matrix,
                row: request.tile_row,
                col: request.tile_col,
            });
        }

        let status = self.status.get(coord);
        trace!(layer = %self.descriptor.name, tile = %coord, ?status, "GetTile");
        match status {
            FileStatus::Present => self.load_tile(coord, out),
            FileStatus::EmptyConfirmed => {
                out.fill(self.descriptor.invalid_value);
                Ok(())
            }
            FileStatus::Missing | FileStatus::Failed => {
                Err(LayerError::Internal("tile not cached".to_string()))
            }
        }
    }

    fn tile_dimensions(&self) -> Option<(u32, u32)> {
        let edge = self.descriptor.tile_pixels();
        Some((edge, edge))
    }

    fn invalid_value(&self) -> f64 {
        self.descriptor.invalid_value
    }
}
