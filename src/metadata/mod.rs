//! # Containment Metadata Model
//!
//! For every entity type, which fields reference the entities whose index
//! documents embed it. A change to an entity must reindex those containers,
//! and their containers in turn, up to each edge's `max_depth`.
//!
//! The model is built once by [`MetadataBuilder`] and never mutated after
//! that. Share it as `Arc<ContainmentModel>`; reads need no locking.
//!
//! ```rust
//! use search_sync::metadata::{
//!     ContainmentDeclaration, FieldAccessor, MetadataBuilder, TypeDeclaration,
//! };
//! use search_sync::model::{EntityId, EntityType};
//! use search_sync::storage::Entity;
//!
//! struct Address { id: u64, owner: Option<u64> }
//!
//! impl Entity for Address {
//!     fn entity_type(&self) -> EntityType { EntityType::new("Address") }
//!     fn entity_id(&self) -> EntityId { EntityId(self.id) }
//! }
//!
//! let model = MetadataBuilder::new()
//!     .with_type(TypeDeclaration::indexed("Person"))
//!     .with_type(TypeDeclaration::embedded("Address"))
//!     .with_containment(ContainmentDeclaration::new(
//!         "Address",
//!         FieldAccessor::single("owner", |a: &Address| a.owner.map(EntityId)),
//!         "Person",
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(model.edges_from(&"Address".into()).count(), 1);
//! ```

pub mod accessor;
pub mod builder;
pub mod depth;

use std::collections::BTreeSet;
use std::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::model::{EntityKey, EntityType};
use crate::storage::Entity;

pub use accessor::{AccessorKind, FieldAccessor};
pub use builder::{ContainmentDeclaration, MetadataBuilder, TypeDeclaration};

// ============================================================================
// Errors
// ============================================================================

/// A containment reference that could not be followed.
///
/// Recoverable: the propagation branch is skipped, the batch continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("edge {owner}.{field} cannot read an instance of {got}")]
    TypeMismatch { owner: EntityType, field: String, got: EntityType },

    #[error("field {field} of {instance} is not readable as {rust_type}")]
    Unreadable { instance: EntityKey, field: String, rust_type: &'static str },

    #[error("{0} is detached or no longer exists")]
    Detached(EntityKey),
}

/// Malformed declarations. Fatal: no usable model can be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataBuildError {
    #[error("entity type {0} declared twice")]
    DuplicateType(EntityType),

    #[error("entity type {entity_type} referenced by {referenced_by} is not declared")]
    UnknownType { entity_type: EntityType, referenced_by: String },

    #[error("containment field {owner}.{field} declared twice")]
    DuplicateEdge { owner: EntityType, field: String },

    #[error("containment field {owner}.{field} has max_depth 0 and can never propagate")]
    ZeroDepth { owner: EntityType, field: String },

    #[error("containment declared on {owner} with an empty field name")]
    EmptyFieldName { owner: EntityType },
}

// ============================================================================
// Edges
// ============================================================================

/// Index of an edge in the model's edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// `owner.field` references `target` entities that embed `owner`.
#[derive(Clone)]
pub struct ContainmentEdge {
    pub id: EdgeId,
    pub owner: EntityType,
    pub target: EntityType,
    pub accessor: FieldAccessor,
    /// `None` is unbounded.
    pub max_depth: Option<u32>,
}

impl ContainmentEdge {
    pub fn field(&self) -> &str {
        self.accessor.field()
    }
}

impl fmt::Debug for ContainmentEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainmentEdge")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("field", &self.field())
            .field("target", &self.target)
            .field("kind", &self.accessor.kind())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug)]
struct TypeMetadata {
    indexed: bool,
    indexed_fields: Option<BTreeSet<String>>,
    edges: SmallVec<[EdgeId; 4]>,
}

/// Immutable containment graph over all declared entity types.
#[derive(Debug)]
pub struct ContainmentModel {
    types: HashMap<EntityType, TypeMetadata>,
    edges: Vec<ContainmentEdge>,
}

impl ContainmentModel {
    /// All outgoing containment edges of `entity_type`, in declaration order.
    pub fn edges_from<'a>(&'a self, entity_type: &EntityType) -> impl Iterator<Item = &'a ContainmentEdge> + use<'a> {
        self.types
            .get(entity_type)
            .map(|meta| meta.edges.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|id| &self.edges[id.0])
    }

    pub fn edge(&self, id: EdgeId) -> Option<&ContainmentEdge> {
        self.edges.get(id.0)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Invoke the edge's accessor on a live instance of its owner type.
    pub fn resolve_targets(
        &self,
        instance: &dyn Entity,
        edge: &ContainmentEdge,
    ) -> Result<Vec<EntityKey>, AccessError> {
        let got = instance.entity_type();
        if got != edge.owner {
            return Err(AccessError::TypeMismatch {
                owner: edge.owner.clone(),
                field: edge.field().to_string(),
                got,
            });
        }
        let ids = edge.accessor.read(instance).ok_or_else(|| AccessError::Unreadable {
            instance: instance.key(),
            field: edge.field().to_string(),
            rust_type: edge.accessor.rust_type(),
        })?;
        Ok(ids
            .into_iter()
            .map(|id| EntityKey { entity_type: edge.target.clone(), id })
            .collect())
    }

    pub fn is_declared(&self, entity_type: &EntityType) -> bool {
        self.types.contains_key(entity_type)
    }

    /// Whether `entity_type` has an index document of its own.
    pub fn is_indexed(&self, entity_type: &EntityType) -> bool {
        self.types.get(entity_type).is_some_and(|m| m.indexed)
    }

    pub fn indexed_types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.iter().filter(|(_, m)| m.indexed).map(|(t, _)| t)
    }

    /// Whether a change to `changed_fields` of `entity_type` can alter any
    /// index document. Only answers `false` when that is provable.
    pub fn affects_indexing(&self, entity_type: &EntityType, changed_fields: &BTreeSet<String>) -> bool {
        let Some(meta) = self.types.get(entity_type) else {
            return false;
        };
        let moves_containment = meta
            .edges
            .iter()
            .any(|id| changed_fields.contains(self.edges[id.0].field()));
        if moves_containment {
            return true;
        }
        match &meta.indexed_fields {
            Some(indexed) => !indexed.is_disjoint(changed_fields),
            None => true,
        }
    }
}
