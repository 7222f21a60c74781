//! # search-sync-rs — Index Synchronization and Geo-Distance Search
//!
//! Keeps a full-text/spatial search index consistent with an object graph
//! whose entities embed one another, and answers "within D km of P" queries
//! with exact great-circle distances.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `IndexService` and `EntityLoader` are the contracts
//!    with the index and the persistence layer; the core owns neither.
//! 2. **Build once, read forever**: `ContainmentModel` is assembled at startup
//!    and shared by `Arc`; nothing mutates it afterwards.
//! 3. **One batch, one work set**: every committed transaction yields exactly
//!    one deduplicated set of index operations.
//! 4. **One distance function**: filtering, sorting and projection all go
//!    through the same haversine computation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use search_sync::{
//!     SearchSync, SyncConfig, SpatialQuerySpec, SpatialOptions, MemoryStore,
//!     FieldMap, Value, GeoPoint, EntityType, EntityId,
//! };
//! use search_sync::metadata::{MetadataBuilder, TypeDeclaration};
//! use search_sync::storage::Entity;
//!
//! struct Poi { id: u64, location: GeoPoint }
//!
//! impl Entity for Poi {
//!     fn entity_type(&self) -> EntityType { EntityType::new("Poi") }
//!     fn entity_id(&self) -> EntityId { EntityId(self.id) }
//! }
//!
//! # async fn example() -> search_sync::Result<()> {
//! let model = MetadataBuilder::new()
//!     .with_type(TypeDeclaration::indexed("Poi"))
//!     .build()?;
//! let sync = SearchSync::open_memory(Arc::new(model), SyncConfig::default());
//!
//! let store = MemoryStore::new();
//! store.create(Poi { id: 1, location: GeoPoint::new(24.0, 31.9)? });
//!
//! let extract = |e: &dyn Entity| -> search_sync::Result<FieldMap> {
//!     let mut fields = FieldMap::new();
//!     if let Some(poi) = (e as &dyn std::any::Any).downcast_ref::<Poi>() {
//!         fields.insert("location".into(), Value::from(poi.location));
//!     }
//!     Ok(fields)
//! };
//! sync.commit(&store.commit(), &store, &extract).await?;
//!
//! let spec = SpatialQuerySpec::within(24.0, 32.0, 100.0, "location")?;
//! for hit in sync.search(&spec, SpatialOptions::sorted_and_projected()).await? {
//!     println!("{} at {:?} km", hit.document_id, hit.distance_km);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! | Contract | Reference impl | Description |
//! |----------|----------------|-------------|
//! | `IndexService` | `MemoryIndex` | Document add/update/delete and bbox range scans |
//! | `EntityLoader` | `MemoryStore` | Live instances for propagation and extraction |
//! | `FieldExtractor` | any `Fn(&dyn Entity)` | Entity → indexable fields |

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod index;
pub mod metadata;
pub mod model;
pub mod spatial;
pub mod storage;
pub mod sync;
pub mod tx;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    GeoPoint, EntityType, EntityId, EntityKey, DocumentId, Value, FieldMap,
    distance_km, EARTH_RADIUS_KM,
};

// ============================================================================
// Re-exports: Metadata, Sync, Spatial
// ============================================================================

pub use config::{DepthMode, SyncConfig};
pub use metadata::{AccessError, ContainmentEdge, ContainmentModel, MetadataBuildError};
pub use sync::{DispatchReport, ReindexWorkUnit, SyncEngine, SyncPlan, WorkOp};
pub use spatial::{BoundingBox, SpatialHit, SpatialOptions, SpatialQuerySpec, SpatialSearch};

// ============================================================================
// Re-exports: Collaborators
// ============================================================================

pub use index::{FieldExtractor, IndexService, MemoryIndex};
pub use storage::{Entity, EntityLoader, MemoryStore};
pub use tx::{ChangeBatch, ChangeKind, EntityChangeEvent, TxId};

use std::sync::Arc;

// ============================================================================
// Top-level handle
// ============================================================================

/// The primary entry point. Wraps an index service with the engine that
/// keeps it in sync and the driver that queries it.
pub struct SearchSync<I: IndexService> {
    index: I,
    engine: SyncEngine,
    search: SpatialSearch,
}

impl<I: IndexService> SearchSync<I> {
    pub fn with_index(index: I, model: Arc<ContainmentModel>, config: SyncConfig) -> Self {
        Self {
            index,
            search: SpatialSearch::new(config.clone()),
            engine: SyncEngine::new(model, config),
        }
    }

    /// Propagate and apply one committed transaction.
    pub async fn commit(
        &self,
        batch: &ChangeBatch,
        loader: &dyn EntityLoader,
        extractor: &dyn FieldExtractor,
    ) -> Result<DispatchReport> {
        self.engine.process(batch, loader, extractor, &self.index).await
    }

    /// Run a spatial query against the index.
    pub async fn search(&self, spec: &SpatialQuerySpec, options: SpatialOptions) -> Result<Vec<SpatialHit>> {
        self.search.search(&self.index, spec, options).await
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Access the underlying index (for advanced use).
    pub fn index(&self) -> &I {
        &self.index
    }
}

/// In-memory index for testing and embedding.
impl SearchSync<MemoryIndex> {
    pub fn open_memory(model: Arc<ContainmentModel>, config: SyncConfig) -> Self {
        Self::with_index(MemoryIndex::new(), model, config)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid coordinate: latitude {lat}, longitude {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Metadata build error: {0}")]
    MetadataBuild(#[from] MetadataBuildError),

    #[error("Index service error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
