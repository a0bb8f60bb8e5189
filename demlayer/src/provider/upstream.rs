//! Upstream GetMap source used by the cache builder.

use super::http::UpstreamClient;
use super::types::ProviderError;
use crate::coord::BBox;
use crate::crs::CrsHandle;
use crate::raster::{Image, PixelType};
use reqwest::Url;
use std::time::Duration;

/// A WMS endpoint that returns raw little-endian rasters.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSource {
    pub host: String,
    pub port: u16,
    pub layer: String,
    pub crs: CrsHandle,
    /// MIME type requested in `FORMAT`, e.g. `application/raw-s16`
    pub format: String,
    /// Pixel type the format delivers
    pub pixel_type: PixelType,
}

impl UpstreamSource {
    /// Builds the GetMap URL for `bbox` at `width × height` pixels.
    pub fn get_map_url(&self, bbox: &BBox, width: u32, height: u32) -> Result<Url, ProviderError> {
        let base = format!("http://{}:{}/", self.host, self.port);
        let crs = self.crs.to_string();
        let bbox = bbox.to_string();
        let (width, height) = (width.to_string(), height.to_string());
        Url::parse_with_params(
            &base,
            &[
                ("SERVICE", "WMS"),
                ("VERSION", "1.3.0"),
                ("REQUEST", "GetMap"),
                ("LAYERS", self.layer.as_str()),
                ("STYLES", ""),
                ("CRS", crs.as_str()),
                ("BBOX", bbox.as_str()),
                ("WIDTH", width.as_str()),
                ("HEIGHT", height.as_str()),
                ("FORMAT", self.format.as_str()),
            ],
        )
        .map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", base, e)))
    }

    /// Fetches one raster and checks its length against the request.
    ///
    /// A body of the wrong size is reported as [`ProviderError::ShortRead`].
    pub async fn fetch<C: UpstreamClient>(
        &self,
        client: &C,
        bbox: &BBox,
        width: u32,
        height: u32,
        timeout: Duration,
    ) -> Result<Image, ProviderError> {
        let url = self.get_map_url(bbox, width, height)?;
        let body = tokio::time::timeout(timeout, client.get(url.as_str()))
            .await
            .map_err(|_| ProviderError::Timeout)??;

        let expected = width as usize * height as usize * self.pixel_type.size_of();
        if body.len() != expected {
            return Err(ProviderError::ShortRead {
                expected,
                actual: body.len(),
            });
        }
        Image::from_le_bytes(width, height, self.pixel_type, &body).map_err(|_| {
            ProviderError::ShortRead {
                expected,
                actual: body.len(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::http::tests::MockUpstreamClient;

    fn source() -> UpstreamSource {
        UpstreamSource {
            host: "dem.example.com".to_string(),
            port: 8081,
            layer: "srtm".to_string(),
            crs: CrsHandle::WGS84,
            format: "application/raw-s16".to_string(),
            pixel_type: PixelType::S16,
        }
    }

    #[test]
    fn test_get_map_url() {
        let bbox = BBox::new(-1.5, 2.0, 3.0, 4.25).unwrap();
        let url = source().get_map_url(&bbox, 260, 260).unwrap();

        assert_eq!(url.host_str(), Some("dem.example.com"));
        assert_eq!(url.port(), Some(8081));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("LAYERS".into(), "srtm".into())));
        assert!(pairs.contains(&("CRS".into(), "EPSG:4326".into())));
        assert!(pairs.contains(&("BBOX".into(), "-1.5,2,3,4.25".into())));
        assert!(pairs.contains(&("WIDTH".into(), "260".into())));
        assert!(pairs.contains(&("FORMAT".into(), "application/raw-s16".into())));
    }

    #[tokio::test]
    async fn test_fetch_decodes_body() {
        let body: Vec<u8> = [5i16, -5, 7, 300]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let client = MockUpstreamClient::new(Ok(body));
        let bbox = BBox::new(0.0, 0.0, 1.0, 1.0).unwrap();

        let image = source()
            .fetch(&client, &bbox, 2, 2, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(image.as_s16().unwrap(), &[5, -5, 7, 300]);
    }

    #[tokio::test]
    async fn test_fetch_short_read() {
        let client = MockUpstreamClient::new(Ok(vec![0; 6]));
        let bbox = BBox::new(0.0, 0.0, 1.0, 1.0).unwrap();

        let result = source()
            .fetch(&client, &bbox, 2, 2, Duration::from_secs(1))
            .await;
        assert_eq!(
            result,
            Err(ProviderError::ShortRead {
                expected: 8,
                actual: 6
            })
        );
    }
}
