//! Runs a spatial query end to end against an index service.

use tracing::debug;

use crate::config::SyncConfig;
use crate::index::IndexService;
use crate::Result;
use super::{DistanceEngine, SpatialHit, SpatialPredicate, SpatialQuerySpec};

/// What the caller wants back besides the matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialOptions {
    /// Order hits by ascending distance instead of index relevance.
    pub sort_by_distance: bool,
    /// Fill in [`SpatialHit::distance_km`].
    pub project_distance: bool,
}

impl SpatialOptions {
    pub fn sorted() -> Self {
        Self { sort_by_distance: true, project_distance: false }
    }

    pub fn projected() -> Self {
        Self { sort_by_distance: false, project_distance: true }
    }

    pub fn sorted_and_projected() -> Self {
        Self { sort_by_distance: true, project_distance: true }
    }
}

/// Spatial query driver: prefilter, exact filter, order, project.
#[derive(Debug, Clone, Default)]
pub struct SpatialSearch {
    config: SyncConfig,
}

impl SpatialSearch {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub async fn search<I>(
        &self,
        index: &I,
        spec: &SpatialQuerySpec,
        options: SpatialOptions,
    ) -> Result<Vec<SpatialHit>>
    where
        I: IndexService + ?Sized,
    {
        let predicate = SpatialPredicate::new(spec.clone(), &self.config);
        let bbox = predicate.bounding_box();
        let candidates = index.range_query(spec.field(), &bbox).await?;
        let scanned = candidates.len();

        let matched = predicate.evaluate(&candidates);
        let mut hits = Vec::with_capacity(matched.len());
        // evaluate keeps input order, so every match lies ahead of the cursor
        let mut rest = candidates.into_iter();
        for (id, _) in matched {
            if let Some((_, point)) = rest.by_ref().find(|(candidate, _)| *candidate == id) {
                hits.push(SpatialHit::new(id, point));
            }
        }
        debug!(field = spec.field(), scanned, matched = hits.len(), "spatial query");

        if options.sort_by_distance || options.project_distance {
            let engine = DistanceEngine::with_radius(spec.center(), self.config.earth_radius_km);
            let distances = engine.compute_distances(hits.iter().map(|h| (&h.document_id, &h.point)));
            if options.sort_by_distance {
                engine.sort(&mut hits, &distances);
            }
            if options.project_distance {
                engine.project(&mut hits, &distances);
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use crate::model::{EntityKey, EntityType, FieldMap, GeoPoint, Value};
    use pretty_assertions::assert_eq;

    async fn index_with(points: &[(u64, f64, f64)]) -> MemoryIndex {
        let index = MemoryIndex::new();
        for &(id, lat, lon) in points {
            let mut fields = FieldMap::new();
            fields.insert("location".into(), Value::from(GeoPoint::new(lat, lon).unwrap()));
            index.add_or_update(&EntityKey::new("Poi", id), &EntityType::new("Poi"), fields).await.unwrap();
        }
        index
    }

    #[tokio::test]
    async fn test_hits_keep_their_points_and_relevance_order() {
        // #4 at (23.9, 32.1) is inside the box but 15.06 km out
        let index = index_with(&[(1, 24.0, 32.0), (2, 24.0, 31.9), (3, 23.9, 32.0), (4, 23.9, 32.1)]).await;
        let spec = SpatialQuerySpec::within(24.0, 32.0, 15.0, "location").unwrap();
        let hits = SpatialSearch::default().search(&index, &spec, SpatialOptions::default()).await.unwrap();

        let found: Vec<(u64, GeoPoint)> = hits.iter().map(|h| (h.document_id.id.0, h.point)).collect();
        assert_eq!(
            found,
            vec![
                (1, GeoPoint::new(24.0, 32.0).unwrap()),
                (2, GeoPoint::new(24.0, 31.9).unwrap()),
                (3, GeoPoint::new(23.9, 32.0).unwrap()),
            ],
        );
        assert!(hits.iter().all(|h| h.distance_km.is_none()));
    }

    #[tokio::test]
    async fn test_projected_distance_matches_exact_filter() {
        let index = index_with(&[(1, 24.0, 31.9), (2, 23.9, 32.0)]).await;
        let spec = SpatialQuerySpec::within(24.0, 32.0, 12.0, "location").unwrap();
        let search = SpatialSearch::default();
        let hits = search.search(&index, &spec, SpatialOptions::projected()).await.unwrap();

        let predicate = SpatialPredicate::new(spec.clone(), &SyncConfig::default());
        for hit in &hits {
            assert_eq!(hit.distance_km, predicate.matches(hit.point));
        }
        assert_eq!(hits.len(), 2);
    }
}
