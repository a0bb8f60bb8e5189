//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::*;
use super::file::ConfigFileError;
use super::settings::*;
use crate::cache::Compression;
use crate::coord::BBox;
use crate::crs::CrsHandle;
use crate::raster::PixelType;
use crate::service::raw_pixel_type;

/// Prefix of per-layer section names.
pub(super) const LAYER_SECTION_PREFIX: &str = "layer.";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(props) = ini.section(Some("server")) {
        let section = Section::new("server", props);
        if let Some(listen) = section.parse("listen", "expected host:port")? {
            config.server.listen = listen;
        }
        if let Some(v) = section.get("capabilities") {
            config.server.capabilities = Some(expand_tilde(v));
        }
    }

    // [logging] section
    if let Some(props) = ini.section(Some("logging")) {
        let section = Section::new("logging", props);
        if let Some(v) = section.get("directory") {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("file") {
            config.logging.file = v.to_string();
        }
    }

    // [layer.<name>] sections
    for (name, props) in ini.iter() {
        let Some(section_name) = name else { continue };
        let Some(layer_name) = section_name.strip_prefix(LAYER_SECTION_PREFIX) else {
            continue;
        };
        let section = Section::new(section_name, props);
        if layer_name.trim().is_empty() {
            return Err(section.invalid("name", section_name, "layer name must not be empty"));
        }
        if config.layers.iter().any(|l| l.name == layer_name) {
            return Err(section.invalid("name", layer_name, "duplicate layer name"));
        }

        let kind = section.required("kind")?;
        let kind = match kind.to_lowercase().as_str() {
            "grid" => LayerKindSettings::Grid(parse_grid(&section)?),
            "cache" => LayerKindSettings::Cache(parse_cache(&section)?),
            _ => return Err(section.invalid("kind", kind, "must be one of: grid, cache")),
        };
        config.layers.push(LayerSettings {
            name: layer_name.to_string(),
            kind,
        });
    }

    Ok(config)
}

fn parse_grid(section: &Section) -> Result<GridSettings, ConfigFileError> {
    let crs = section.parse_crs("crs")?.unwrap_or(CrsHandle::WGS84);
    let pixel_type: PixelType = section
        .parse("pixel_type", "expected u8, s16, u32, f32 or f64")?
        .unwrap_or(PixelType::S16);
    if pixel_type == PixelType::Rgba8 {
        return Err(section.invalid(
            "pixel_type",
            "rgba8",
            "grid layers hold single-channel data",
        ));
    }

    let mut supported_crs = match section.get("supported_crs") {
        Some(list) => list
            .split(',')
            .map(|item| {
                item.trim()
                    .parse::<CrsHandle>()
                    .map_err(|e| section.invalid("supported_crs", item, &e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => vec![CrsHandle::WGS84, CrsHandle::WEB_MERCATOR],
    };
    if !supported_crs.contains(&crs) {
        supported_crs.insert(0, crs);
    }
    supported_crs.dedup();

    let visual_min = section
        .parse("visual_min", "expected a number")?
        .unwrap_or(DEFAULT_VISUAL_MIN);
    let visual_max = section
        .parse("visual_max", "expected a number")?
        .unwrap_or(DEFAULT_VISUAL_MAX);
    if visual_min >= visual_max {
        return Err(section.invalid(
            "visual_max",
            &visual_max.to_string(),
            "must exceed visual_min",
        ));
    }

    Ok(GridSettings {
        path: expand_tilde(section.required("path")?),
        width: section.required_positive("width")?,
        height: section.required_positive("height")?,
        pixel_type,
        crs,
        bbox: section.required_bbox("bbox")?,
        invalid_value: section
            .parse("invalid_value", "expected a number")?
            .unwrap_or(DEFAULT_INVALID_VALUE),
        supported_crs,
        visual_min,
        visual_max,
    })
}

fn parse_cache(section: &Section) -> Result<CacheSettings, ConfigFileError> {
    let crs = section.parse_crs("crs")?.unwrap_or(CrsHandle::WGS84);

    let tile_size = section
        .parse("tile_size", "expected a positive integer")?
        .unwrap_or(DEFAULT_TILE_SIZE);
    if tile_size == 0 {
        return Err(section.invalid("tile_size", "0", "must be positive"));
    }
    let padding: u32 = section
        .parse("padding", "expected a non-negative integer")?
        .unwrap_or(DEFAULT_PADDING);
    if padding >= tile_size {
        return Err(section.invalid(
            "padding",
            &padding.to_string(),
            "must be smaller than tile_size",
        ));
    }

    let source_format = section
        .get("source_format")
        .unwrap_or(DEFAULT_SOURCE_FORMAT)
        .to_string();
    if raw_pixel_type(&source_format).is_none() {
        return Err(section.invalid(
            "source_format",
            &source_format,
            "must be one of: application/raw-s16, application/raw-u8, application/raw-u32",
        ));
    }

    let workers: usize = section
        .parse("workers", "expected a positive integer")?
        .unwrap_or_else(default_workers);
    if workers == 0 {
        return Err(section.invalid("workers", "0", "must be positive"));
    }
    let request_timeout_secs: u64 = section
        .parse("request_timeout_secs", "expected a positive integer")?
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if request_timeout_secs == 0 {
        return Err(section.invalid("request_timeout_secs", "0", "must be positive"));
    }

    Ok(CacheSettings {
        storage: expand_tilde(section.required("storage")?),
        tile_size,
        padding,
        tiles_x: section.required_positive("tiles_x")?,
        tiles_y: section.required_positive("tiles_y")?,
        bbox: section.required_bbox("bbox")?,
        crs,
        compression: section
            .parse::<Compression>("compression", "must be one of: raw, elevation")?
            .unwrap_or(Compression::Elevation),
        invalid_value: section
            .parse("invalid_value", "expected a number")?
            .unwrap_or(DEFAULT_INVALID_VALUE),
        source_host: section.required("source_host")?.to_string(),
        source_port: section
            .parse("source_port", "expected a port number")?
            .unwrap_or(DEFAULT_SOURCE_PORT),
        source_layer: section.required("source_layer")?.to_string(),
        source_format,
        tile_matrix_set: section
            .get("tile_matrix_set")
            .map(str::to_string)
            .unwrap_or_else(|| crs.to_string()),
        workers,
        max_retries: section
            .parse("max_retries", "expected a non-negative integer")?
            .unwrap_or(DEFAULT_MAX_RETRIES),
        retry_base_delay_ms: section
            .parse("retry_base_delay_ms", "expected milliseconds")?
            .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
        request_timeout_secs,
    })
}

/// Typed access to one INI section with error context.
struct Section<'a> {
    name: &'a str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'a str, props: &'a Properties) -> Self {
        Self { name, props }
    }

    /// Trimmed value; empty values count as absent.
    fn get(&self, key: &str) -> Option<&'a str> {
        self.props
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<&'a str, ConfigFileError> {
        self.get(key).ok_or_else(|| ConfigFileError::MissingKey {
            section: self.name.to_string(),
            key: key.to_string(),
        })
    }

    fn parse<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigFileError> {
        self.get(key)
            .map(|v| v.parse::<T>().map_err(|_| self.invalid(key, v, reason)))
            .transpose()
    }

    fn required_positive(&self, key: &str) -> Result<u32, ConfigFileError> {
        let value = self.required(key)?;
        match value.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(self.invalid(key, value, "expected a positive integer")),
        }
    }

    fn required_bbox(&self, key: &str) -> Result<BBox, ConfigFileError> {
        let value = self.required(key)?;
        BBox::parse(value).map_err(|e| self.invalid(key, value, &e.to_string()))
    }

    fn parse_crs(&self, key: &str) -> Result<Option<CrsHandle>, ConfigFileError> {
        self.get(key)
            .map(|v| {
                v.parse::<CrsHandle>()
                    .map_err(|e| self.invalid(key, v, &e.to_string()))
            })
            .transpose()
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigFileError {
        ConfigFileError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
