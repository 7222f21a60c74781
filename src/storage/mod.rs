//! # Persistence Collaborator
//!
//! The contract between the synchronization engine and whatever owns the
//! live object graph. The engine never writes entities; it only reads them
//! to follow containment references and to extract index fields.
//!
//! ## Implementations
//!
//! | Loader | Module | Description |
//! |--------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory entity map for testing/embedding |

pub mod memory;

use std::any::Any;
use std::sync::Arc;

use crate::model::{EntityId, EntityKey, EntityType};

pub use memory::MemoryStore;

/// A live, readable instance of some entity type.
///
/// Field accessors downcast through `Any` to the concrete type they were
/// declared for.
pub trait Entity: Any + Send + Sync {
    fn entity_type(&self) -> EntityType;
    fn entity_id(&self) -> EntityId;

    fn key(&self) -> EntityKey {
        EntityKey { entity_type: self.entity_type(), id: self.entity_id() }
    }
}

/// Loads live instances by key.
///
/// `None` means the instance is gone or detached: a stale reference.
pub trait EntityLoader: Send + Sync {
    fn load(&self, key: &EntityKey) -> Option<Arc<dyn Entity>>;
}

impl<L: EntityLoader + ?Sized> EntityLoader for Arc<L> {
    fn load(&self, key: &EntityKey) -> Option<Arc<dyn Entity>> {
        (**self).load(key)
    }
}

impl<L: EntityLoader + ?Sized> EntityLoader for &L {
    fn load(&self, key: &EntityKey) -> Option<Arc<dyn Entity>> {
        (**self).load(key)
    }
}
