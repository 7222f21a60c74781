//! Assembles raw declarations into a [`ContainmentModel`].

use std::collections::BTreeSet;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::model::EntityType;
use super::{
    ContainmentEdge, ContainmentModel, EdgeId, FieldAccessor, MetadataBuildError, TypeMetadata,
};

/// Declares one entity type known to the model.
#[derive(Debug, Clone)]
pub struct TypeDeclaration {
    pub entity_type: EntityType,
    /// Whether the type has an index document of its own.
    pub indexed: bool,
    /// Fields that feed any index document, this type's own or a container's.
    /// `None` means unknown: every change is assumed to matter.
    pub indexed_fields: Option<BTreeSet<String>>,
}

impl TypeDeclaration {
    /// A type with its own index document.
    pub fn indexed(entity_type: impl Into<EntityType>) -> Self {
        Self { entity_type: entity_type.into(), indexed: true, indexed_fields: None }
    }

    /// A type that is only ever embedded in other documents.
    pub fn embedded(entity_type: impl Into<EntityType>) -> Self {
        Self { entity_type: entity_type.into(), indexed: false, indexed_fields: None }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}

/// Declares that `owner`'s field (read by `accessor`) points at the
/// `target` entities whose index documents embed `owner`.
#[derive(Debug, Clone)]
pub struct ContainmentDeclaration {
    pub owner: EntityType,
    pub target: EntityType,
    pub accessor: FieldAccessor,
    pub max_depth: Option<u32>,
}

impl ContainmentDeclaration {
    pub fn new(owner: impl Into<EntityType>, accessor: FieldAccessor, target: impl Into<EntityType>) -> Self {
        Self { owner: owner.into(), target: target.into(), accessor, max_depth: None }
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Collects declarations; all validation happens in [`MetadataBuilder::build`].
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    types: Vec<TypeDeclaration>,
    containments: Vec<ContainmentDeclaration>,
}

impl MetadataBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn with_type(mut self, decl: TypeDeclaration) -> Self {
        self.types.push(decl);
        self
    }

    pub fn with_containment(mut self, decl: ContainmentDeclaration) -> Self {
        self.containments.push(decl);
        self
    }

    pub fn build(self) -> Result<ContainmentModel, MetadataBuildError> {
        let mut types: HashMap<EntityType, TypeMetadata> = HashMap::with_capacity(self.types.len());
        for decl in self.types {
            if types.contains_key(&decl.entity_type) {
                return Err(MetadataBuildError::DuplicateType(decl.entity_type));
            }
            types.insert(decl.entity_type, TypeMetadata {
                indexed: decl.indexed,
                indexed_fields: decl.indexed_fields,
                edges: SmallVec::new(),
            });
        }

        let mut edges: Vec<ContainmentEdge> = Vec::with_capacity(self.containments.len());
        let mut seen: HashSet<(EntityType, String)> = HashSet::new();
        for decl in self.containments {
            let field = decl.accessor.field().to_string();
            if field.is_empty() {
                return Err(MetadataBuildError::EmptyFieldName { owner: decl.owner });
            }
            if !types.contains_key(&decl.target) {
                return Err(MetadataBuildError::UnknownType {
                    entity_type: decl.target,
                    referenced_by: format!("{}.{field}", decl.owner),
                });
            }
            if decl.max_depth == Some(0) {
                return Err(MetadataBuildError::ZeroDepth { owner: decl.owner, field });
            }
            if !seen.insert((decl.owner.clone(), field.clone())) {
                return Err(MetadataBuildError::DuplicateEdge { owner: decl.owner, field });
            }
            let Some(owner_meta) = types.get_mut(&decl.owner) else {
                return Err(MetadataBuildError::UnknownType {
                    referenced_by: format!("{}.{field}", decl.owner),
                    entity_type: decl.owner,
                });
            };

            let id = EdgeId(edges.len());
            owner_meta.edges.push(id);
            edges.push(ContainmentEdge {
                id,
                owner: decl.owner,
                target: decl.target,
                accessor: decl.accessor,
                max_depth: decl.max_depth,
            });
        }

        debug!(types = types.len(), edges = edges.len(), "containment model built");
        Ok(ContainmentModel { types, edges })
    }
}
