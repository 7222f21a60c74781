//! Entity identity: type names, ids, and the `(type, id)` key.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of an entity type. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityType(Arc<str>);

impl EntityType {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(s: &str) -> Self { Self::new(s) }
}

impl From<String> for EntityType {
    fn from(s: String) -> Self { Self(Arc::from(s)) }
}

impl PartialEq<str> for EntityType {
    fn eq(&self, other: &str) -> bool { &*self.0 == other }
}

impl PartialEq<&str> for EntityType {
    fn eq(&self, other: &&str) -> bool { &*self.0 == *other }
}

/// Opaque entity identifier, unique within one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl From<u64> for EntityId {
    fn from(v: u64) -> Self { EntityId(v) }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `(entity type, entity id)` pair.
///
/// Also names the index document of that entity, see [`DocumentId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(entity_type: impl Into<EntityType>, id: u64) -> Self {
        Self { entity_type: entity_type.into(), id: EntityId(id) }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

/// Index documents are keyed one-to-one by the entity they mirror.
pub type DocumentId = EntityKey;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_eq() {
        let key = EntityKey::new("Book", 7);
        assert_eq!(key.to_string(), "Book#7");
        assert_eq!(key, EntityKey::new(String::from("Book"), 7));
        assert!(key.entity_type == "Book");
    }

    #[test]
    fn test_key_serializes_type_as_plain_string() {
        let key = EntityKey::new("Book", 7);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"entity_type":"Book","id":7}"#);
        assert_eq!(serde_json::from_str::<EntityKey>(&json).unwrap(), key);
    }
}
