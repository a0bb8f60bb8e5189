//! Request routing for the WMS/WMTS endpoint.

use super::encode::encode;
use super::exception::{ExceptionCode, ServiceException};
use super::format::ContentType;
use super::params::QueryParams;
use crate::crs::CrsHandle;
use crate::layer::{GetMapRequest, GetTileRequest, Layer, LayerRegistry};
use crate::raster::{Image, PixelType};
use std::sync::Arc;
use tracing::{debug, error};

/// Largest width or height a GetMap may ask for.
pub const MAX_IMAGE_EDGE: u32 = 8192;

const XML_MIME: &str = "application/xml";
const EXCEPTION_MIME: &str = "text/plain";

/// A complete HTTP answer: status, MIME type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl ServiceResponse {
    fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body,
        }
    }

    fn exception(ex: &ServiceException) -> Self {
        Self {
            status: ex.code.status(),
            content_type: EXCEPTION_MIME.to_string(),
            body: ex.body(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Routes parsed query arguments to the registered layers.
///
/// Holds nothing mutable; one instance serves every request concurrently.
pub struct Dispatcher {
    registry: Arc<LayerRegistry>,
    capabilities: Vec<u8>,
}

impl Dispatcher {
    /// Create a dispatcher. Without a static capabilities document a minimal
    /// one listing the registered layers is generated.
    pub fn new(registry: Arc<LayerRegistry>, capabilities: Option<Vec<u8>>) -> Self {
        let capabilities = capabilities.unwrap_or_else(|| default_capabilities(&registry));
        Self {
            registry,
            capabilities,
        }
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Answer one request. Never panics on bad input; every failure becomes
    /// an exception response.
    pub fn handle_request(&self, args: &[(String, String)]) -> ServiceResponse {
        let params = QueryParams::from_pairs(args);
        match self.dispatch(&params) {
            Ok(response) => response,
            Err(ex) => {
                if ex.code == ExceptionCode::InternalError {
                    error!(code = %ex.code, locator = %ex.locator, "Request failed");
                } else {
                    debug!(code = %ex.code, locator = %ex.locator, "Request rejected");
                }
                ServiceResponse::exception(&ex)
            }
        }
    }

    fn dispatch(&self, params: &QueryParams) -> Result<ServiceResponse, ServiceException> {
        if let Some(service) = params.get("service").map(str::trim) {
            if !service.is_empty()
                && !service.eq_ignore_ascii_case("WMS")
                && !service.eq_ignore_ascii_case("WMTS")
            {
                return Err(ServiceException::invalid_value("service", service));
            }
        }

        let request = params.get("request").map(str::trim).unwrap_or_default();
        match request.to_ascii_lowercase().as_str() {
            "getcapabilities" => Ok(ServiceResponse::ok(XML_MIME, self.capabilities.clone())),
            "getmap" => self.get_map(params),
            "gettile" => self.get_tile(params),
            _ => Err(ServiceException::new(
                ExceptionCode::OperationNotSupported,
                format!("request={}", request),
            )),
        }
    }

    fn get_map(&self, params: &QueryParams) -> Result<ServiceResponse, ServiceException> {
        let layer_name = params.require("layers")?;
        let crs_value = params.require_any(&["crs", "srs"])?;
        params.require("bbox")?;
        params.require("width")?;
        params.require("height")?;
        let format = params.require("format")?;

        let layer = self.layer(layer_name)?;
        let content_type = content_type(format)?;

        let width = params.require_u32("width")?;
        let height = params.require_u32("height")?;
        if width == 0 || height == 0 || width > MAX_IMAGE_EDGE || height > MAX_IMAGE_EDGE {
            return Err(ServiceException::new(
                ExceptionCode::InvalidSize,
                format!("{}x{}", width, height),
            ));
        }

        let crs: CrsHandle = crs_value
            .parse()
            .map_err(|_| ServiceException::new(ExceptionCode::InvalidSrs, crs_value))?;
        let bbox = params.require_bbox("bbox")?;
        let pixel_type = negotiate(layer.as_ref(), content_type)?;

        let request = GetMapRequest {
            layer: layer_name.to_string(),
            styles: params.get("styles").unwrap_or_default().to_string(),
            crs,
            bbox,
            width,
            height,
        };
        let mut image = Image::new(width, height, pixel_type);
        layer.handle_get_map(&request, &mut image)?;
        respond(layer.as_ref(), &mut image, content_type)
    }

    fn get_tile(&self, params: &QueryParams) -> Result<ServiceResponse, ServiceException> {
        let layer_name = params.require("layers")?;
        let tile_matrix_set = params.require("tilematrixset")?;
        params.require("tilematrix")?;
        params.require("tilerow")?;
        params.require("tilecol")?;
        let format = params.require("format")?;

        let layer = self.layer(layer_name)?;
        let content_type = content_type(format)?;

        let tile_matrix = params.require_u32("tilematrix")?;
        let tile_row = params.require_u32("tilerow")?;
        let tile_col = params.require_u32("tilecol")?;

        let (width, height) = layer.tile_dimensions().ok_or_else(|| {
            ServiceException::new(ExceptionCode::OperationNotSupported, "request=GetTile")
        })?;
        let pixel_type = negotiate(layer.as_ref(), content_type)?;

        let styles = params
            .get("style")
            .or_else(|| params.get("styles"))
            .unwrap_or_default();
        let request = GetTileRequest {
            layer: layer_name.to_string(),
            styles: styles.to_string(),
            tile_matrix_set: tile_matrix_set.to_string(),
            tile_matrix,
            tile_row,
            tile_col,
        };
        let mut image = Image::new(width, height, pixel_type);
        layer.handle_get_tile(&request, &mut image)?;
        respond(layer.as_ref(), &mut image, content_type)
    }

    fn layer(&self, name: &str) -> Result<&Arc<dyn Layer>, ServiceException> {
        self.registry
            .get(name)
            .ok_or_else(|| ServiceException::new(ExceptionCode::LayerNotDefined, name))
    }
}

fn content_type(format: &str) -> Result<ContentType, ServiceException> {
    ContentType::from_mime(format)
        .ok_or_else(|| ServiceException::new(ExceptionCode::InvalidFormat, format))
}

fn negotiate(
    layer: &dyn Layer,
    content_type: ContentType,
) -> Result<PixelType, ServiceException> {
    content_type
        .negotiate(layer.supported_pixel_types())
        .ok_or_else(|| {
            ServiceException::new(
                ExceptionCode::InvalidFormat,
                format!("{} not available for layer {}", content_type, layer.name()),
            )
        })
}

fn respond(
    layer: &dyn Layer,
    image: &mut Image,
    content_type: ContentType,
) -> Result<ServiceResponse, ServiceException> {
    let body = encode(image, content_type, layer.invalid_value()).map_err(|e| {
        error!(layer = %layer.name(), format = %content_type, error = %e, "Encoding failed");
        ServiceException::new(ExceptionCode::InternalError, e.to_string())
    })?;
    Ok(ServiceResponse::ok(content_type.mime(), body))
}

fn default_capabilities(registry: &LayerRegistry) -> Vec<u8> {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <WMS_Capabilities version=\"1.3.0\">\n  \
         <Service><Name>WMS</Name><Title>demlayer</Title></Service>\n  \
         <Capability>\n",
    );
    for name in registry.names() {
        xml.push_str("    <Layer><Name>");
        xml.push_str(&escape_xml(name));
        xml.push_str("</Name></Layer>\n");
    }
    xml.push_str("  </Capability>\n</WMS_Capabilities>\n");
    xml.into_bytes()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fills GetMap output with a constant and counts calls.
    struct ConstantLayer {
        value: f64,
        pixel_types: Vec<PixelType>,
        crs: [CrsHandle; 1],
        calls: AtomicUsize,
        fail: bool,
    }

    impl ConstantLayer {
        fn new(value: f64, pixel_types: Vec<PixelType>) -> Self {
            Self {
                value,
                pixel_types,
                crs: [CrsHandle::WGS84],
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    impl Layer for ConstantLayer {
        fn name(&self) -> &str {
            "const"
        }

        fn supported_pixel_types(&self) -> &[PixelType] {
            &self.pixel_types
        }

        fn supported_crs(&self) -> &[CrsHandle] {
            &self.crs
        }

        fn handle_get_map(&self, _request: &GetMapRequest, out: &mut Image) -> Result<(), LayerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LayerError::Internal("boom".into()));
            }
            out.fill(self.value);
            Ok(())
        }
    }

    fn args(query: &str) -> Vec<(String, String)> {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn dispatcher(layer: ConstantLayer) -> (Dispatcher, Arc<ConstantLayer>) {
        let layer = Arc::new(layer);
        let registry = LayerRegistry::from_layers(vec![layer.clone() as Arc<dyn Layer>]);
        (Dispatcher::new(Arc::new(registry), None), layer)
    }

    fn exception_code(response: &ServiceResponse) -> String {
        let body = String::from_utf8_lossy(&response.body);
        body.lines().next().unwrap_or_default().to_string()
    }

    const MAP: &str = "service=WMS&request=GetMap&layers=const&crs=EPSG:4326&bbox=-10,-10,10,10&width=8&height=4";

    #[test]
    fn test_static_capabilities() {
        let layer = Arc::new(ConstantLayer::new(1.0, vec![PixelType::U8]));
        let registry = LayerRegistry::from_layers(vec![layer as Arc<dyn Layer>]);
        let doc = b"<Capabilities/>".to_vec();
        let dispatcher = Dispatcher::new(Arc::new(registry), Some(doc.clone()));

        let response = dispatcher.handle_request(&args("SERVICE=WMS&REQUEST=GetCapabilities"));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/xml");
        assert_eq!(response.body, doc);
    }

    #[test]
    fn test_builtin_capabilities_list_layers() {
        let (dispatcher, _) = dispatcher(ConstantLayer::new(1.0, vec![PixelType::U8]));
        let response = dispatcher.handle_request(&args("request=GetCapabilities"));
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("<Name>const</Name>"));
    }

    #[test]
    fn test_get_map_png() {
        let (dispatcher, layer) = dispatcher(ConstantLayer::new(9.0, vec![PixelType::U8]));
        let response = dispatcher.handle_request(&args(&format!("{}&format=image/png", MAP)));
        assert!(response.is_success());
        assert_eq!(response.content_type, "image/png");
        let decoded = ::image::load_from_memory(&response.body).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(layer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_map_raw_s16() {
        let (dispatcher, _) = dispatcher(ConstantLayer::new(-2.0, vec![PixelType::S16]));
        let response = dispatcher.handle_request(&args(&format!(
            "{}&format=application/raw-s16",
            MAP
        )));
        assert!(response.is_success());
        assert_eq!(response.body.len(), 8 * 4 * 2);
        assert_eq!(&response.body[..2], &(-2i16).to_le_bytes());
    }

    #[test]
    fn test_srs_alias() {
        let (dispatcher, _) = dispatcher(ConstantLayer::new(1.0, vec![PixelType::U8]));
        let query = MAP.replace("crs=", "srs=");
        let response = dispatcher.handle_request(&args(&format!("{}&format=image/png", query)));
        assert!(response.is_success());
    }

    #[test]
    fn test_parameter_errors() {
        let (dispatcher, layer) = dispatcher(ConstantLayer::new(1.0, vec![PixelType::U8]));
        let cases = [
            (MAP.to_string(), "MissingParameterValue"),
            (
                format!("{}&format=image/png", MAP.replace("layers=const", "layers=nope")),
                "LayerNotDefined",
            ),
            (format!("{}&format=image/tiff", MAP), "InvalidFormat"),
            (
                format!("{}&format=image/png", MAP.replace("width=8", "width=0")),
                "InvalidSize",
            ),
            (
                format!("{}&format=image/png", MAP.replace("width=8", "width=eight")),
                "InvalidParameterValue",
            ),
            (
                format!("{}&format=image/png", MAP.replace("EPSG:4326", "EPSG:999999")),
                "InvalidSRS",
            ),
            (
                format!("{}&format=image/png", MAP.replace("-10,-10,10,10", "10,10,-10,-10")),
                "InvalidBBOX",
            ),
            (
                format!("{}&format=image/png", MAP.replace("service=WMS", "service=WFS")),
                "InvalidParameterValue",
            ),
            ("request=GetFeatureInfo".to_string(), "OperationNotSupported"),
            ("service=WMS".to_string(), "OperationNotSupported"),
            // U8-only layer cannot produce signed raw samples
            (format!("{}&format=application/raw-s16", MAP), "InvalidFormat"),
        ];
        for (query, code) in cases {
            let response = dispatcher.handle_request(&args(&query));
            assert_eq!(response.status, 400, "{}", query);
            assert_eq!(response.content_type, "text/plain");
            assert_eq!(exception_code(&response), code, "{}", query);
        }
        assert_eq!(layer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_internal_error_is_500() {
        let mut layer = ConstantLayer::new(1.0, vec![PixelType::U8]);
        layer.fail = true;
        let (dispatcher, _) = dispatcher(layer);
        let response = dispatcher.handle_request(&args(&format!("{}&format=image/png", MAP)));
        assert_eq!(response.status, 500);
        assert_eq!(exception_code(&response), "InternalError");
    }

    #[test]
    fn test_get_tile_on_map_only_layer() {
        let (dispatcher, _) = dispatcher(ConstantLayer::new(1.0, vec![PixelType::U8]));
        let response = dispatcher.handle_request(&args(
            "request=GetTile&layers=const&tilematrixset=EPSG:4326&tilematrix=0&tilerow=0&tilecol=0&format=image/png",
        ));
        assert_eq!(response.status, 400);
        assert_eq!(exception_code(&response), "OperationNotSupported");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
