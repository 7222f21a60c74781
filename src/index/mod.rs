//! # Index Service Contract
//!
//! The external full-text/spatial index, seen from the engine: per-document
//! add/update and delete, plus a bounding-box range scan over a point field.
//! Text analysis and storage are the service's business.
//!
//! Implementations must be idempotent per document id: applying the same
//! operation twice leaves the same observable state as applying it once.
//!
//! ## Implementations
//!
//! | Service | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryIndex` | `memory` | In-memory documents for testing/embedding |

pub mod memory;

use async_trait::async_trait;

use crate::model::{DocumentId, EntityType, FieldMap, GeoPoint};
use crate::spatial::BoundingBox;
use crate::storage::Entity;
use crate::Result;

pub use memory::MemoryIndex;

#[async_trait]
pub trait IndexService: Send + Sync {
    /// Insert or replace the document for `id`.
    async fn add_or_update(
        &self,
        id: &DocumentId,
        entity_type: &EntityType,
        fields: FieldMap,
    ) -> Result<()>;

    /// Remove the document for `id`. Returns true if it existed.
    async fn delete(&self, id: &DocumentId, entity_type: &EntityType) -> Result<bool>;

    /// Documents whose `field` holds a point inside `bbox`, in relevance order.
    async fn range_query(&self, field: &str, bbox: &BoundingBox) -> Result<Vec<(DocumentId, GeoPoint)>>;
}

/// Turns a live entity into the field values of its index document.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, entity: &dyn Entity) -> Result<FieldMap>;
}

impl<F> FieldExtractor for F
where
    F: Fn(&dyn Entity) -> Result<FieldMap> + Send + Sync,
{
    fn extract(&self, entity: &dyn Entity) -> Result<FieldMap> {
        self(entity)
    }
}
