//! Distance ordering and projection.
//!
//! Sorting and projection both read from one distance map produced by
//! [`DistanceEngine::compute_distances`], so the value a result was sorted
//! by is exactly the value attached to it.

use std::cmp::Ordering;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{distance_km_with_radius, DocumentId, GeoPoint, EARTH_RADIUS_KM};

/// One spatial query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialHit {
    pub document_id: DocumentId,
    pub point: GeoPoint,
    /// Set only when distance projection was requested.
    pub distance_km: Option<f64>,
}

impl SpatialHit {
    pub fn new(document_id: DocumentId, point: GeoPoint) -> Self {
        Self { document_id, point, distance_km: None }
    }
}

/// Computes per-result distances from a fixed center.
#[derive(Debug, Clone, Copy)]
pub struct DistanceEngine {
    center: GeoPoint,
    earth_radius_km: f64,
}

impl DistanceEngine {
    pub fn new(center: GeoPoint) -> Self {
        Self::with_radius(center, EARTH_RADIUS_KM)
    }

    pub fn with_radius(center: GeoPoint, earth_radius_km: f64) -> Self {
        Self { center, earth_radius_km }
    }

    pub fn center(&self) -> GeoPoint { self.center }

    pub fn compute_distances<'a, I>(&self, results: I) -> HashMap<DocumentId, f64>
    where
        I: IntoIterator<Item = (&'a DocumentId, &'a GeoPoint)>,
    {
        results
            .into_iter()
            .map(|(id, point)| (id.clone(), distance_km_with_radius(self.center, *point, self.earth_radius_km)))
            .collect()
    }

    /// Stable ascending sort; ties keep their relevance order. Hits without a
    /// computed distance go last.
    pub fn sort(&self, hits: &mut [SpatialHit], distances: &HashMap<DocumentId, f64>) {
        let key = |hit: &SpatialHit| distances.get(&hit.document_id).copied().unwrap_or(f64::INFINITY);
        hits.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal));
    }

    /// Attach each hit's distance as an output field.
    pub fn project(&self, hits: &mut [SpatialHit], distances: &HashMap<DocumentId, f64>) {
        for hit in hits {
            hit.distance_km = distances.get(&hit.document_id).copied();
        }
    }
}
