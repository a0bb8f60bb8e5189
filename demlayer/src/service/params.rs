//! Case-insensitive query parameters.

use super::exception::{ExceptionCode, ServiceException};
use crate::coord::BBox;
use std::collections::HashMap;

/// Request parameters keyed by lower-cased name. The first occurrence of a
/// repeated key wins.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    values: HashMap<String, String>,
}

impl QueryParams {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut values = HashMap::with_capacity(pairs.len());
        for (key, value) in pairs {
            values
                .entry(key.trim().to_ascii_lowercase())
                .or_insert_with(|| value.clone());
        }
        Self { values }
    }

    /// Raw value; present even when empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Non-empty trimmed value, or `MissingParameterValue`.
    pub fn require(&self, key: &str) -> Result<&str, ServiceException> {
        self.get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceException::missing(key))
    }

    /// Like [`require`](Self::require), accepting any of several aliases.
    pub fn require_any(&self, keys: &[&str]) -> Result<&str, ServiceException> {
        keys.iter()
            .find_map(|key| self.require(key).ok())
            .ok_or_else(|| ServiceException::missing(keys.first().copied().unwrap_or_default()))
    }

    /// Required unsigned integer. Non-numeric values are
    /// `InvalidParameterValue`.
    pub fn require_u32(&self, key: &str) -> Result<u32, ServiceException> {
        let value = self.require(key)?;
        value
            .parse()
            .map_err(|_| ServiceException::invalid_value(key, value))
    }

    /// Required `minx,miny,maxx,maxy`. Any malformed box is `InvalidBBOX`.
    pub fn require_bbox(&self, key: &str) -> Result<BBox, ServiceException> {
        let value = self.require(key)?;
        BBox::parse(value).map_err(|e| ServiceException::new(ExceptionCode::InvalidBBox, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        let owned: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        QueryParams::from_pairs(&owned)
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let p = params(&[("REQUEST", "GetMap"), ("Layers", "dem"), ("layers", "other")]);
        assert_eq!(p.get("request"), Some("GetMap"));
        assert_eq!(p.require("layers").unwrap(), "dem");
    }

    #[test]
    fn test_empty_required_is_missing() {
        let p = params(&[("format", " ")]);
        assert_eq!(
            p.require("format").unwrap_err().code,
            ExceptionCode::MissingParameterValue
        );
        assert_eq!(p.require("width").unwrap_err().locator, "width");
    }

    #[test]
    fn test_require_any_alias() {
        let p = params(&[("SRS", "EPSG:3857")]);
        assert_eq!(p.require_any(&["crs", "srs"]).unwrap(), "EPSG:3857");
        assert_eq!(
            params(&[]).require_any(&["crs", "srs"]).unwrap_err().locator,
            "crs"
        );
    }

    #[test]
    fn test_numeric_and_bbox_errors() {
        let p = params(&[("width", "abc"), ("bbox", "1,2,3")]);
        assert_eq!(
            p.require_u32("width").unwrap_err().code,
            ExceptionCode::InvalidParameterValue
        );
        assert_eq!(
            p.require_bbox("bbox").unwrap_err().code,
            ExceptionCode::InvalidBBox
        );
    }
}
