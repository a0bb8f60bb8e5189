//! Computational layer over an in-memory raster grid.
//!
//! GetMap reprojects the request box into the grid's CRS, derives the affine
//! destination-to-source mapping and resamples a padded source window with
//! Lanczos. Samples outside the grid read as the sentinel.

use super::types::{is_default_style, GetMapRequest, LayerError, LayerInitError};
use super::{Layer, LayerContext};
use crate::config::{GridSettings, LayerKindSettings, LayerSettings};
use crate::coord::BBox;
use crate::crs::{CrsHandle, TransformCache};
use crate::raster::{Image, PixelData, PixelType};
use crate::resample::{resample, SampleTransform};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

/// Largest source window a single GetMap may copy.
const MAX_WINDOW_PIXELS: i64 = 1 << 26;

/// A 2D array of typed pixels.
pub trait RasterSource: Send + Sync {
    fn dimensions(&self) -> (u32, u32);

    fn pixel_type(&self) -> PixelType;

    /// Copy the `width × height` window whose top-left pixel is `(x0, y0)`.
    /// Pixels outside the source are set to `fill`.
    fn read_window(&self, x0: i64, y0: i64, width: u32, height: u32, fill: f64) -> Image;
}

/// Raw little-endian pixels loaded fully into memory.
#[derive(Debug, Clone)]
pub struct RawFileSource {
    image: Image,
}

impl RawFileSource {
    pub fn open(path: &Path, width: u32, height: u32, pixel_type: PixelType) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), width, height, pixel_type)
    }

    /// Read exactly `width × height` pixels from `reader`.
    pub fn from_reader<R: Read>(
        mut reader: R,
        width: u32,
        height: u32,
        pixel_type: PixelType,
    ) -> io::Result<Self> {
        let len = width as usize * height as usize * pixel_type.size_of();
        let mut bytes = vec![0u8; len];
        reader.read_exact(&mut bytes)?;
        let image = Image::from_le_bytes(width, height, pixel_type, &bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self { image })
    }

    pub fn from_image(image: Image) -> Self {
        Self { image }
    }
}

impl RasterSource for RawFileSource {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn pixel_type(&self) -> PixelType {
        self.image.pixel_type()
    }

    fn read_window(&self, x0: i64, y0: i64, width: u32, height: u32, fill: f64) -> Image {
        let mut out = Image::filled(width, height, self.pixel_type(), fill);
        let src_dims = self.image.dimensions();
        let window = Window {
            x0,
            y0,
            width,
            height,
        };
        match (self.image.data(), out.data_mut()) {
            (PixelData::U8(s), PixelData::U8(d)) => window.copy(s, src_dims, d),
            (PixelData::S16(s), PixelData::S16(d)) => window.copy(s, src_dims, d),
            (PixelData::U32(s), PixelData::U32(d)) => window.copy(s, src_dims, d),
            (PixelData::F32(s), PixelData::F32(d)) => window.copy(s, src_dims, d),
            (PixelData::F64(s), PixelData::F64(d)) => window.copy(s, src_dims, d),
            (PixelData::Rgba8(s), PixelData::Rgba8(d)) => window.copy(s, src_dims, d),
            _ => {}
        }
        out
    }
}

struct Window {
    x0: i64,
    y0: i64,
    width: u32,
    height: u32,
}

impl Window {
    /// Copy the overlap of this window and the source into `dst`.
    fn copy<T: Copy>(&self, src: &[T], (src_w, src_h): (u32, u32), dst: &mut [T]) {
        let (src_w, src_h) = (src_w as i64, src_h as i64);
        let (w, h) = (self.width as i64, self.height as i64);
        let cx0 = self.x0.max(0);
        let cx1 = self.x0.saturating_add(w).min(src_w);
        let cy0 = self.y0.max(0);
        let cy1 = self.y0.saturating_add(h).min(src_h);
        if cx0 >= cx1 || cy0 >= cy1 {
            return;
        }
        let span = (cx1 - cx0) as usize;
        for sy in cy0..cy1 {
            let s = (sy * src_w + cx0) as usize;
            let d = ((sy - self.y0) * w + (cx0 - self.x0)) as usize;
            dst[d..d + span].copy_from_slice(&src[s..s + span]);
        }
    }
}

/// A layer that resamples a raster grid on demand.
pub struct GridLayer {
    name: String,
    source: Box<dyn RasterSource>,
    crs: CrsHandle,
    bbox: BBox,
    invalid_value: f64,
    supported_crs: Vec<CrsHandle>,
    pixel_types: Vec<PixelType>,
    transforms: TransformCache,
    visual_range: (f64, f64),
}

impl GridLayer {
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn RasterSource>,
        settings: &GridSettings,
    ) -> Result<Self, LayerInitError> {
        if source.dimensions() != (settings.width, settings.height) {
            return Err(LayerInitError::setting(
                "width",
                format!(
                    "source is {:?}, configured {}x{}",
                    source.dimensions(),
                    settings.width,
                    settings.height
                ),
            ));
        }
        let native = source.pixel_type();
        let mut pixel_types = vec![native];
        if native != PixelType::U8 {
            pixel_types.push(PixelType::U8);
        }
        let mut crs_set = settings.supported_crs.clone();
        if !crs_set.contains(&settings.crs) {
            crs_set.push(settings.crs);
        }
        let transforms = TransformCache::new(&crs_set)?;
        Ok(Self {
            name: name.into(),
            source,
            crs: settings.crs,
            bbox: settings.bbox,
            invalid_value: settings.invalid_value,
            supported_crs: settings.supported_crs.clone(),
            pixel_types,
            transforms,
            visual_range: (settings.visual_min, settings.visual_max),
        })
    }

    /// Destination-to-source mapping for `bbox` (grid CRS) at `width × height`.
    ///
    /// Source pixel `k` is centred on `k`; destination pixel centres sit at
    /// half-pixel offsets inside `bbox`.
    fn sample_transform(&self, bbox: &BBox, width: u32, height: u32) -> SampleTransform {
        let (src_w, src_h) = self.source.dimensions();
        let px = self.bbox.width() / src_w as f64;
        let py = self.bbox.height() / src_h as f64;
        let scale_x = bbox.width() / width as f64 / px;
        let scale_y = bbox.height() / height as f64 / py;
        SampleTransform::new(
            scale_x,
            scale_y,
            (bbox.min_x - self.bbox.min_x) / px + 0.5 * scale_x - 0.5,
            (self.bbox.max_y - bbox.max_y) / py + 0.5 * scale_y - 0.5,
        )
    }

    /// Resample into an image of the source's native type.
    fn render_native(&self, bbox: &BBox, width: u32, height: u32) -> Result<Image, LayerError> {
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(LayerError::InvalidBBox(format!("{} has no area", bbox)));
        }
        let transform = self.sample_transform(bbox, width, height);
        let (x0, y0, x1, y1) = transform.required_source_window(width, height);
        let (src_w, src_h) = self.source.dimensions();
        if x1 < 0 || y1 < 0 || x0 >= src_w as i64 || y0 >= src_h as i64 {
            return Ok(Image::filled(
                width,
                height,
                self.source.pixel_type(),
                self.invalid_value,
            ));
        }
        let span = |lo: i64, hi: i64| hi.checked_sub(lo).and_then(|d| d.checked_add(1));
        let (win_w, win_h) = match (span(x0, x1), span(y0, y1)) {
            (Some(w), Some(h)) if w > 0 && h > 0 && w.saturating_mul(h) <= MAX_WINDOW_PIXELS => {
                (w, h)
            }
            _ => {
                return Err(LayerError::InvalidBBox(format!(
                    "{} needs a source window beyond {} pixels",
                    bbox, MAX_WINDOW_PIXELS
                )))
            }
        };

        let window =
            self.source
                .read_window(x0, y0, win_w as u32, win_h as u32, self.invalid_value);
        let mut out = Image::new(width, height, self.source.pixel_type());
        resample(&window, &mut out, transform.shifted(x0, y0), self.invalid_value).map_err(
            |e| {
                error!(layer = %self.name, error = %e, "Resampling failed");
                LayerError::Internal(e.to_string())
            },
        )?;
        Ok(out)
    }

    /// Stretch native samples over the visual range into 0..=255.
    fn to_preview(&self, native: &Image) -> PixelData {
        let (lo, hi) = self.visual_range;
        let sentinel = native.pixel_type().quantize(self.invalid_value);
        let grey = native
            .data()
            .to_f64_vec()
            .into_iter()
            .map(|v| {
                if v == sentinel {
                    0
                } else {
                    ((v - lo) / (hi - lo) * 255.0).round().clamp(0.0, 255.0) as u8
                }
            })
            .collect();
        PixelData::U8(grey)
    }
}

impl Layer for GridLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_pixel_types(&self) -> &[PixelType] {
        &self.pixel_types
    }

    fn supported_crs(&self) -> &[CrsHandle] {
        &self.supported_crs
    }

    fn invalid_value(&self) -> f64 {
        self.invalid_value
    }

    fn handle_get_map(&self, request: &GetMapRequest, out: &mut Image) -> Result<(), LayerError> {
        if !is_default_style(&request.styles) {
            return Err(LayerError::InvalidStyle(request.styles.clone()));
        }
        if !self.supported_crs.contains(&request.crs) {
            return Err(LayerError::InvalidSrs(request.crs.to_string()));
        }
        let pixel_type = out.pixel_type();
        if !self.pixel_types.contains(&pixel_type) {
            return Err(LayerError::InvalidFormat(pixel_type));
        }

        let bbox = self
            .transforms
            .transform_bbox(&request.bbox, request.crs, self.crs)
            .ok_or_else(|| {
                LayerError::InvalidBBox(format!(
                    "{} cannot be projected from {} to {}",
                    request.bbox, request.crs, self.crs
                ))
            })?;
        debug!(layer = %self.name, bbox = %bbox, width = out.width(), height = out.height(), "GetMap");

        let native = self.render_native(&bbox, out.width(), out.height())?;
        let data = if pixel_type == native.pixel_type() {
            native.into_data()
        } else {
            self.to_preview(&native)
        };
        out.replace_data(data)
            .map_err(|e| LayerError::Internal(e.to_string()))
    }
}

/// Factory for `kind = grid`.
pub fn create(
    settings: &LayerSettings,
    _ctx: &LayerContext,
) -> Result<Arc<dyn Layer>, LayerInitError> {
    let LayerKindSettings::Grid(grid) = &settings.kind else {
        return Err(LayerInitError::setting("kind", "expected a grid layer"));
    };
    let source = RawFileSource::open(&grid.path, grid.width, grid.height, grid.pixel_type)
        .map_err(|source| LayerInitError::Source {
            path: grid.path.display().to_string(),
            source,
        })?;
    Ok(Arc::new(GridLayer::new(
        settings.name.clone(),
        Box::new(source),
        grid,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVALID: f64 = -32768.0;

    fn settings(supported: Vec<CrsHandle>) -> GridSettings {
        GridSettings {
            path: "unused".into(),
            width: 36,
            height: 18,
            pixel_type: PixelType::S16,
            crs: CrsHandle::WGS84,
            bbox: BBox::new(-180.0, -90.0, 180.0, 90.0).unwrap(),
            invalid_value: INVALID,
            supported_crs: supported,
            visual_min: 0.0,
            visual_max: 1000.0,
        }
    }

    fn constant_layer(value: i16) -> GridLayer {
        let image = Image::filled(36, 18, PixelType::S16, value as f64);
        let settings = settings(vec![CrsHandle::WGS84, CrsHandle::WEB_MERCATOR]);
        GridLayer::new("dem", Box::new(RawFileSource::from_image(image)), &settings).unwrap()
    }

    fn request(crs: CrsHandle, bbox: BBox) -> GetMapRequest {
        GetMapRequest {
            layer: "dem".into(),
            styles: String::new(),
            crs,
            bbox,
            width: 16,
            height: 8,
        }
    }

    #[test]
    fn test_read_window_fills_outside() {
        let data: Vec<i16> = (0..12).collect();
        let source = RawFileSource::from_image(Image::from_data(4, 3, PixelData::S16(data)).unwrap());
        let window = source.read_window(-1, 1, 3, 3, -1.0);
        assert_eq!(
            window.as_s16().unwrap(),
            &[-1, 4, 5, -1, 8, 9, -1, -1, -1]
        );
    }

    #[test]
    fn test_from_reader_requires_full_grid() {
        let bytes = vec![0u8; 7];
        assert!(RawFileSource::from_reader(&bytes[..], 2, 2, PixelType::S16).is_err());
        let bytes = vec![1u8, 0, 2, 0, 3, 0, 4, 0];
        let source = RawFileSource::from_reader(&bytes[..], 2, 2, PixelType::S16).unwrap();
        assert_eq!(source.dimensions(), (2, 2));
    }

    #[test]
    fn test_get_map_constant_interior() {
        let layer = constant_layer(250);
        let mut out = Image::new(16, 8, PixelType::S16);
        let bbox = BBox::new(-90.0, -45.0, 90.0, 45.0).unwrap();
        layer
            .handle_get_map(&request(CrsHandle::WGS84, bbox), &mut out)
            .unwrap();
        assert!(out.as_s16().unwrap().iter().all(|&v| v == 250));
    }

    #[test]
    fn test_get_map_outside_is_sentinel() {
        let layer = constant_layer(250);
        let mut out = Image::new(16, 8, PixelType::S16);
        let bbox = BBox::new(400.0, 0.0, 500.0, 50.0).unwrap();
        layer
            .handle_get_map(&request(CrsHandle::WGS84, bbox), &mut out)
            .unwrap();
        assert!(out.as_s16().unwrap().iter().all(|&v| v == INVALID as i16));
    }

    #[test]
    fn test_get_map_far_outside_is_sentinel() {
        let layer = constant_layer(250);
        let mut out = Image::new(4, 4, PixelType::S16);
        let bbox = BBox::new(1e20, 0.0, 1e20 + 1e6, 10.0).unwrap();
        let mut request = request(CrsHandle::WGS84, bbox);
        request.width = 4;
        request.height = 4;
        layer.handle_get_map(&request, &mut out).unwrap();
        assert!(out.as_s16().unwrap().iter().all(|&v| v == INVALID as i16));
    }

    #[test]
    fn test_get_map_window_too_large() {
        let layer = constant_layer(250);
        let mut out = Image::new(16, 8, PixelType::S16);
        let bbox = BBox::new(-1e20, -1e20, 1e20, 1e20).unwrap();
        assert!(matches!(
            layer.handle_get_map(&request(CrsHandle::WGS84, bbox), &mut out),
            Err(LayerError::InvalidBBox(_))
        ));
    }

    #[test]
    fn test_read_window_far_offset() {
        let source = RawFileSource::from_image(Image::filled(4, 4, PixelType::S16, 7.0));
        let window = source.read_window(i64::MAX, i64::MIN, 2, 2, -1.0);
        assert_eq!(window.as_s16().unwrap(), &[-1, -1, -1, -1]);
    }

    #[test]
    fn test_get_map_reprojected() {
        let layer = constant_layer(40);
        let mut out = Image::new(16, 8, PixelType::S16);
        let bbox = BBox::new(-2_000_000.0, -1_000_000.0, 2_000_000.0, 1_000_000.0).unwrap();
        layer
            .handle_get_map(&request(CrsHandle::WEB_MERCATOR, bbox), &mut out)
            .unwrap();
        assert!(out.as_s16().unwrap().iter().all(|&v| v == 40));
    }

    #[test]
    fn test_get_map_preview() {
        let layer = constant_layer(500);
        let mut out = Image::new(16, 8, PixelType::U8);
        let bbox = BBox::new(-90.0, -45.0, 90.0, 45.0).unwrap();
        layer
            .handle_get_map(&request(CrsHandle::WGS84, bbox), &mut out)
            .unwrap();
        assert!(matches!(out.data(), PixelData::U8(v) if v.iter().all(|&g| g == 128)));
    }

    #[test]
    fn test_get_map_rejections() {
        let layer = constant_layer(1);
        let bbox = BBox::new(-10.0, -10.0, 10.0, 10.0).unwrap();

        let mut styled = request(CrsHandle::WGS84, bbox);
        styled.styles = "shaded".into();
        let mut out = Image::new(16, 8, PixelType::S16);
        assert_eq!(
            layer.handle_get_map(&styled, &mut out),
            Err(LayerError::InvalidStyle("shaded".into()))
        );

        let other = request(CrsHandle::from_epsg(32633), bbox);
        assert!(matches!(
            layer.handle_get_map(&other, &mut out),
            Err(LayerError::InvalidSrs(_))
        ));

        let mut floats = Image::new(16, 8, PixelType::F32);
        assert_eq!(
            layer.handle_get_map(&request(CrsHandle::WGS84, bbox), &mut floats),
            Err(LayerError::InvalidFormat(PixelType::F32))
        );
    }

    #[test]
    fn test_get_tile_not_supported() {
        let layer = constant_layer(1);
        assert_eq!(layer.tile_dimensions(), None);
        let request = crate::layer::GetTileRequest {
            layer: "dem".into(),
            styles: String::new(),
            tile_matrix_set: "EPSG:4326".into(),
            tile_matrix: 0,
            tile_row: 0,
            tile_col: 0,
        };
        let mut out = Image::new(4, 4, PixelType::S16);
        assert_eq!(
            layer.handle_get_tile(&request, &mut out),
            Err(LayerError::OperationNotSupported)
        );
    }
}
