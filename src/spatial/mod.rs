//! # Spatial Queries
//!
//! "Within D km of P" in two phases, the way an index-backed geo search is
//! usually run:
//!
//! 1. [`BoundingBox::around`] turns center + radius into a lat/lon range the
//!    index service can scan cheaply. It may include false positives.
//! 2. [`SpatialPredicate::evaluate`] applies the exact haversine test to
//!    every candidate the scan returns.
//!
//! Ordering and distance projection are handled by [`sort`], and
//! [`SpatialSearch`] drives all three against an [`IndexService`](crate::index::IndexService).

pub mod bbox;
pub mod search;
pub mod sort;

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::model::{distance_km_with_radius, DocumentId, GeoPoint};
use crate::{Error, Result};

pub use bbox::BoundingBox;
pub use search::{SpatialOptions, SpatialSearch};
pub use sort::{DistanceEngine, SpatialHit};

/// Center, radius and the indexed field holding each document's location.
///
/// Deserialization goes through the same radius check as [`SpatialQuerySpec::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawQuery", into = "RawQuery")]
pub struct SpatialQuerySpec {
    center: GeoPoint,
    radius_km: f64,
    field: String,
}

#[derive(Serialize, Deserialize)]
struct RawQuery {
    center: GeoPoint,
    radius_km: f64,
    field: String,
}

impl SpatialQuerySpec {
    pub fn new(center: GeoPoint, radius_km: f64, field: impl Into<String>) -> Result<Self> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(Error::InvalidQuery(format!(
                "radius must be a non-negative number of km, got {radius_km}"
            )));
        }
        Ok(Self { center, radius_km, field: field.into() })
    }

    /// Convenience constructor from raw degrees.
    pub fn within(lat: f64, lon: f64, radius_km: f64, field: impl Into<String>) -> Result<Self> {
        Self::new(GeoPoint::new(lat, lon)?, radius_km, field)
    }

    pub fn center(&self) -> GeoPoint { self.center }
    pub fn radius_km(&self) -> f64 { self.radius_km }
    pub fn field(&self) -> &str { &self.field }
}

impl TryFrom<RawQuery> for SpatialQuerySpec {
    type Error = Error;

    fn try_from(raw: RawQuery) -> Result<Self> {
        SpatialQuerySpec::new(raw.center, raw.radius_km, raw.field)
    }
}

impl From<SpatialQuerySpec> for RawQuery {
    fn from(q: SpatialQuerySpec) -> Self {
        RawQuery { center: q.center, radius_km: q.radius_km, field: q.field }
    }
}

/// Bounding-box prefilter plus exact membership test for one query.
#[derive(Debug, Clone)]
pub struct SpatialPredicate {
    spec: SpatialQuerySpec,
    earth_radius_km: f64,
    tolerance_km: f64,
}

impl SpatialPredicate {
    pub fn new(spec: SpatialQuerySpec, config: &SyncConfig) -> Self {
        Self {
            spec,
            earth_radius_km: config.earth_radius_km,
            tolerance_km: config.distance_tolerance_km,
        }
    }

    pub fn spec(&self) -> &SpatialQuerySpec {
        &self.spec
    }

    /// Prefilter box. Always a superset of the exact match set.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::around(
            self.spec.center,
            self.spec.radius_km + self.tolerance_km,
            self.earth_radius_km,
        )
    }

    pub fn distance_to(&self, point: GeoPoint) -> f64 {
        distance_km_with_radius(self.spec.center, point, self.earth_radius_km)
    }

    /// Exact test: the distance to `point` when it lies within the radius.
    pub fn matches(&self, point: GeoPoint) -> Option<f64> {
        let d = self.distance_to(point);
        (d <= self.spec.radius_km + self.tolerance_km).then_some(d)
    }

    /// Keep the candidates that pass the exact test, in their input order.
    pub fn evaluate<'a, I>(&self, candidates: I) -> Vec<(DocumentId, f64)>
    where
        I: IntoIterator<Item = &'a (DocumentId, GeoPoint)>,
    {
        candidates
            .into_iter()
            .filter_map(|(id, point)| self.matches(*point).map(|d| (id.clone(), d)))
            .collect()
    }
}
