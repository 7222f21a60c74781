//! Transaction-boundary change events.
//!
//! The persistence layer emits one [`ChangeBatch`] per committed
//! transaction. Each batch is planned as a unit, so repeated changes to the
//! same entity inside one transaction collapse into one index operation.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{EntityId, EntityKey, EntityType};
use crate::storage::Entity;

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// One entity lifecycle event.
#[derive(Clone)]
pub struct EntityChangeEvent {
    pub key: EntityKey,
    pub kind: ChangeKind,
    /// Fields touched by the change. `None` means unknown.
    pub changed_fields: Option<BTreeSet<String>>,
    /// Snapshot of the instance at event time. Required to propagate from a
    /// deleted entity once the loader no longer sees it.
    pub instance: Option<Arc<dyn Entity>>,
}

impl EntityChangeEvent {
    pub fn new(key: EntityKey, kind: ChangeKind) -> Self {
        Self { key, kind, changed_fields: None, instance: None }
    }

    pub fn created(entity_type: impl Into<EntityType>, id: u64) -> Self {
        Self::new(EntityKey::new(entity_type, id), ChangeKind::Create)
    }

    pub fn updated(entity_type: impl Into<EntityType>, id: u64) -> Self {
        Self::new(EntityKey::new(entity_type, id), ChangeKind::Update)
    }

    pub fn deleted(entity_type: impl Into<EntityType>, id: u64) -> Self {
        Self::new(EntityKey::new(entity_type, id), ChangeKind::Delete)
    }

    pub fn with_changed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_instance(mut self, instance: Arc<dyn Entity>) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn entity_type(&self) -> &EntityType { &self.key.entity_type }
    pub fn entity_id(&self) -> EntityId { self.key.id }
}

impl fmt::Debug for EntityChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityChangeEvent")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("changed_fields", &self.changed_fields)
            .field("has_instance", &self.instance.is_some())
            .finish()
    }
}

/// All events of one committed transaction.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    pub id: TxId,
    pub committed_at: DateTime<Utc>,
    pub events: Vec<EntityChangeEvent>,
}

impl ChangeBatch {
    pub fn new(id: TxId, events: Vec<EntityChangeEvent>) -> Self {
        Self { id, committed_at: Utc::now(), events }
    }

    pub fn len(&self) -> usize { self.events.len() }
    pub fn is_empty(&self) -> bool { self.events.is_empty() }
}
