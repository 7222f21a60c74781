//! In-memory entity store.
//!
//! The reference implementation of `EntityLoader`, backed by a single map
//! behind a `RwLock`. It also records the change events its mutations
//! imply, so a test can commit them as one batch.
//!
//! ## Limitations
//!
//! - **No isolation**: writes are visible immediately, before `commit`.
//! - **Coarse change sets**: `update` records the field names the caller
//!   names; nothing is diffed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::model::EntityKey;
use crate::tx::{ChangeBatch, ChangeKind, EntityChangeEvent, TxId};
use super::{Entity, EntityLoader};

/// In-memory entity storage.
pub struct MemoryStore {
    entities: RwLock<HashMap<EntityKey, Arc<dyn Entity>>>,
    pending: Mutex<Vec<EntityChangeEvent>>,
    next_tx_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            next_tx_id: AtomicU64::new(1),
        }
    }

    /// Insert a new entity and record a CREATE event.
    pub fn create<E: Entity>(&self, entity: E) -> EntityKey {
        let entity: Arc<dyn Entity> = Arc::new(entity);
        let key = entity.key();
        self.entities.write().insert(key.clone(), entity);
        self.pending.lock().push(EntityChangeEvent::new(key.clone(), ChangeKind::Create));
        key
    }

    /// Replace an entity and record an UPDATE event for `changed_fields`.
    ///
    /// An empty `changed_fields` means "unknown": every field may have changed.
    pub fn update<E: Entity>(&self, entity: E, changed_fields: &[&str]) -> EntityKey {
        let entity: Arc<dyn Entity> = Arc::new(entity);
        let key = entity.key();
        self.entities.write().insert(key.clone(), entity);

        let mut event = EntityChangeEvent::new(key.clone(), ChangeKind::Update);
        if !changed_fields.is_empty() {
            event = event.with_changed_fields(
                changed_fields.iter().map(|f| f.to_string()).collect::<BTreeSet<_>>(),
            );
        }
        self.pending.lock().push(event);
        key
    }

    /// Remove an entity and record a DELETE event carrying its last state.
    ///
    /// Returns false if the entity was not present.
    pub fn delete(&self, key: &EntityKey) -> bool {
        let removed = self.entities.write().remove(key);
        match removed {
            Some(instance) => {
                self.pending.lock().push(
                    EntityChangeEvent::new(key.clone(), ChangeKind::Delete).with_instance(instance),
                );
                true
            }
            None => false,
        }
    }

    /// Remove an entity without recording any event, leaving dangling
    /// references behind. Models a concurrent deletion.
    pub fn evict(&self, key: &EntityKey) -> bool {
        self.entities.write().remove(key).is_some()
    }

    /// Drain the recorded events into one batch.
    pub fn commit(&self) -> ChangeBatch {
        let id = TxId(self.next_tx_id.fetch_add(1, Ordering::Relaxed));
        let events = std::mem::take(&mut *self.pending.lock());
        ChangeBatch::new(id, events)
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl EntityLoader for MemoryStore {
    fn load(&self, key: &EntityKey) -> Option<Arc<dyn Entity>> {
        self.entities.read().get(key).cloned()
    }
}
