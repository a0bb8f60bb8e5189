//! Transform construction and the per-layer transform cache.

use super::handle::{CrsError, CrsHandle};
use crate::coord::BBox;
use proj4rs::proj::Proj;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Ordered `(source, destination)` pair.
pub type TransformKey = (CrsHandle, CrsHandle);

/// A ready-to-use reprojection between two distinct CRSs.
pub struct CrsTransform {
    src: CrsHandle,
    dst: CrsHandle,
    src_proj: Proj,
    dst_proj: Proj,
    src_geographic: bool,
    dst_geographic: bool,
}

impl CrsTransform {
    /// Builds the projection objects for `src -> dst`.
    pub fn new(src: CrsHandle, dst: CrsHandle) -> Result<Self, CrsError> {
        Ok(Self {
            src,
            dst,
            src_proj: build_proj(src)?,
            dst_proj: build_proj(dst)?,
            src_geographic: src.is_geographic(),
            dst_geographic: dst.is_geographic(),
        })
    }

    pub fn source(&self) -> CrsHandle {
        self.src
    }

    pub fn destination(&self) -> CrsHandle {
        self.dst
    }

    /// Transforms one point. Returns `None` if the point lies outside the
    /// projection's valid domain or the result is not finite.
    pub fn transform_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        // proj4rs works in radians for geographic systems
        let mut point = if self.src_geographic {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        proj4rs::transform::transform(&self.src_proj, &self.dst_proj, &mut point).ok()?;

        let (out_x, out_y) = if self.dst_geographic {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        (out_x.is_finite() && out_y.is_finite()).then_some((out_x, out_y))
    }

    /// Transforms a batch of points; fails if any point fails.
    pub fn transform_points(&self, points: &[(f64, f64)]) -> Option<Vec<(f64, f64)>> {
        points
            .iter()
            .map(|&(x, y)| self.transform_point(x, y))
            .collect()
    }
}

impl fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrsTransform")
            .field("src", &self.src)
            .field("dst", &self.dst)
            .finish()
    }
}

fn build_proj(crs: CrsHandle) -> Result<Proj, CrsError> {
    let definition = crs.proj4().ok_or(CrsError::Unsupported(crs.code()))?;
    Proj::from_proj_string(definition).map_err(|e| CrsError::Projection {
        code: crs.code(),
        reason: format!("{:?}", e),
    })
}

/// Memoized transforms for every ordered pair of a fixed CRS set.
///
/// Built once at layer init and read-only afterwards, so it can be shared
/// across request threads without locking.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: HashMap<TransformKey, Option<Arc<CrsTransform>>>,
}

impl TransformCache {
    /// Builds transforms for all ordered pairs of `crs_set`.
    ///
    /// Fails if any CRS cannot be projected; callers treat that as a layer
    /// init failure.
    pub fn new(crs_set: &[CrsHandle]) -> Result<Self, CrsError> {
        let mut cache = Self::default();
        for &src in crs_set {
            for &dst in crs_set {
                cache.create_transform(src, dst)?;
            }
        }
        debug!(
            crs_count = crs_set.len(),
            entries = cache.entries.len(),
            "Transform cache built"
        );
        Ok(cache)
    }

    /// Inserts the transform for `(src, dst)` unless it already exists.
    pub fn create_transform(&mut self, src: CrsHandle, dst: CrsHandle) -> Result<(), CrsError> {
        if self.entries.contains_key(&(src, dst)) {
            return Ok(());
        }
        let entry = if src == dst {
            None
        } else {
            Some(Arc::new(CrsTransform::new(src, dst)?))
        };
        self.entries.insert((src, dst), entry);
        Ok(())
    }

    /// The transform for `(src, dst)`; `None` for identity or an unknown pair.
    pub fn get_transform(&self, src: CrsHandle, dst: CrsHandle) -> Option<&CrsTransform> {
        self.entries.get(&(src, dst)).and_then(|t| t.as_deref())
    }

    pub fn contains(&self, src: CrsHandle, dst: CrsHandle) -> bool {
        self.entries.contains_key(&(src, dst))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reprojects a bounding box by its two corners.
    ///
    /// Identity returns the input unchanged. `None` means the pair is not
    /// cached or a corner fell outside the projection's domain.
    pub fn transform_bbox(&self, bbox: &BBox, src: CrsHandle, dst: CrsHandle) -> Option<BBox> {
        if src == dst {
            return Some(*bbox);
        }
        let transform = self.get_transform(src, dst)?;
        let corners =
            transform.transform_points(&[(bbox.min_x, bbox.min_y), (bbox.max_x, bbox.max_y)])?;
        BBox::from_corners(corners[0], corners[1]).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_identity_pairs_have_no_transform() {
        let set = [CrsHandle::WGS84, CrsHandle::WEB_MERCATOR];
        let cache = TransformCache::new(&set).unwrap();
        assert_eq!(cache.len(), 4);
        for crs in set {
            assert!(cache.contains(crs, crs));
            assert!(cache.get_transform(crs, crs).is_none());
        }
        assert!(cache
            .get_transform(CrsHandle::WGS84, CrsHandle::WEB_MERCATOR)
            .is_some());
    }

    #[test]
    fn test_identity_bbox_unchanged() {
        let cache = TransformCache::new(&[CrsHandle::WGS84]).unwrap();
        let bbox = BBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
        assert_eq!(
            cache.transform_bbox(&bbox, CrsHandle::WGS84, CrsHandle::WGS84),
            Some(bbox)
        );
    }

    #[test]
    fn test_create_transform_is_idempotent() {
        let mut cache = TransformCache::new(&[CrsHandle::WGS84]).unwrap();
        cache
            .create_transform(CrsHandle::WGS84, CrsHandle::WEB_MERCATOR)
            .unwrap();
        cache
            .create_transform(CrsHandle::WGS84, CrsHandle::WEB_MERCATOR)
            .unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_bbox_to_mercator_and_back() {
        let set = [CrsHandle::WGS84, CrsHandle::WEB_MERCATOR];
        let cache = TransformCache::new(&set).unwrap();
        let bbox = BBox::new(-10.0, -10.0, 10.0, 10.0).unwrap();

        let merc = cache
            .transform_bbox(&bbox, CrsHandle::WGS84, CrsHandle::WEB_MERCATOR)
            .unwrap();
        assert!(approx(merc.max_x, 1_113_194.9, 1.0));
        assert!(approx(merc.min_x, -merc.max_x, 1e-6));

        let back = cache
            .transform_bbox(&merc, CrsHandle::WEB_MERCATOR, CrsHandle::WGS84)
            .unwrap();
        assert!(approx(back.min_x, -10.0, 1e-6));
        assert!(approx(back.max_y, 10.0, 1e-6));
    }

    #[test]
    fn test_uncached_pair_fails() {
        let cache = TransformCache::new(&[CrsHandle::WGS84]).unwrap();
        let bbox = BBox::new(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(cache
            .transform_bbox(&bbox, CrsHandle::WGS84, CrsHandle::WEB_MERCATOR)
            .is_none());
    }

    #[test]
    fn test_unknown_epsg_fails_construction() {
        let result = TransformCache::new(&[CrsHandle::WGS84, CrsHandle::from_epsg(1)]);
        assert!(matches!(result, Err(CrsError::Unsupported(1))));
    }
}
