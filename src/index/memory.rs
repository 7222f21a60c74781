//! In-memory index service.
//!
//! The reference implementation of `IndexService`: one map of documents
//! behind a `RwLock`, scanned linearly for range queries. Range results are
//! returned in document-id order, which stands in for relevance.
//!
//! It also counts the operations it receives, so tests can assert on what
//! was dispatched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{DocumentId, EntityType, FieldMap, GeoPoint, Value};
use crate::spatial::BoundingBox;
use crate::{Error, Result};
use super::IndexService;

/// A stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub entity_type: EntityType,
    pub fields: FieldMap,
}

/// Operation counters, for assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub upserts: u64,
    pub deletes: u64,
    pub range_queries: u64,
}

/// In-memory document index.
#[derive(Default)]
pub struct MemoryIndex {
    documents: RwLock<BTreeMap<DocumentId, IndexedDocument>>,
    upserts: AtomicU64,
    deletes: AtomicU64,
    range_queries: AtomicU64,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &DocumentId) -> Option<IndexedDocument> {
        self.documents.read().get(id).cloned()
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Copy of every stored document, in id order.
    pub fn snapshot(&self) -> Vec<(DocumentId, IndexedDocument)> {
        self.documents.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            upserts: self.upserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            range_queries: self.range_queries.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl IndexService for MemoryIndex {
    async fn add_or_update(
        &self,
        id: &DocumentId,
        entity_type: &EntityType,
        fields: FieldMap,
    ) -> Result<()> {
        if id.entity_type != *entity_type {
            return Err(Error::Index(format!(
                "document {id} cannot be stored as {entity_type}"
            )));
        }
        self.upserts.fetch_add(1, Ordering::Relaxed);
        self.documents.write().insert(id.clone(), IndexedDocument {
            entity_type: entity_type.clone(),
            fields,
        });
        Ok(())
    }

    async fn delete(&self, id: &DocumentId, _entity_type: &EntityType) -> Result<bool> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(self.documents.write().remove(id).is_some())
    }

    async fn range_query(&self, field: &str, bbox: &BoundingBox) -> Result<Vec<(DocumentId, GeoPoint)>> {
        self.range_queries.fetch_add(1, Ordering::Relaxed);
        let docs = self.documents.read();
        Ok(docs
            .iter()
            .filter_map(|(id, doc)| {
                let point = doc.fields.get(field).and_then(Value::as_point)?;
                bbox.contains(point).then(|| (id.clone(), point))
            })
            .collect())
    }
}
