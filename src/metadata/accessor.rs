//! Typed field accessors, erased to a closed set of kinds.
//!
//! An accessor is bound once, when metadata is built, to a concrete Rust
//! type and a field name. At propagation time it is handed a `&dyn Entity`
//! and downcasts it back; nothing is looked up by name at runtime.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::model::EntityId;
use crate::storage::Entity;

type ReadFn<R> = Arc<dyn Fn(&dyn Any) -> Option<R> + Send + Sync>;

/// The shape of the referenced value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    /// A single, possibly absent, reference.
    Single,
    /// A collection of references.
    Collection,
    /// A map whose values are references.
    Map,
}

#[derive(Clone)]
enum Reader {
    Single(ReadFn<Option<EntityId>>),
    Collection(ReadFn<Vec<EntityId>>),
    Map(ReadFn<Vec<(String, EntityId)>>),
}

/// Reads the ids referenced by one field of one entity type.
#[derive(Clone)]
pub struct FieldAccessor {
    field: Arc<str>,
    rust_type: &'static str,
    reader: Reader,
}

fn erase<T: Entity, R: 'static>(read: impl Fn(&T) -> R + Send + Sync + 'static) -> ReadFn<R> {
    Arc::new(move |any: &dyn Any| any.downcast_ref::<T>().map(|t| read(t)))
}

impl FieldAccessor {
    /// Accessor for a single optional reference, e.g. `book.publisher`.
    pub fn single<T: Entity>(
        field: impl AsRef<str>,
        read: impl Fn(&T) -> Option<EntityId> + Send + Sync + 'static,
    ) -> Self {
        Self::with_reader::<T>(field, Reader::Single(erase(read)))
    }

    /// Accessor for a collection of references, e.g. `author.books`.
    pub fn collection<T: Entity>(
        field: impl AsRef<str>,
        read: impl Fn(&T) -> Vec<EntityId> + Send + Sync + 'static,
    ) -> Self {
        Self::with_reader::<T>(field, Reader::Collection(erase(read)))
    }

    /// Accessor for a keyed map of references; the map values are followed.
    pub fn map<T: Entity>(
        field: impl AsRef<str>,
        read: impl Fn(&T) -> Vec<(String, EntityId)> + Send + Sync + 'static,
    ) -> Self {
        Self::with_reader::<T>(field, Reader::Map(erase(read)))
    }

    fn with_reader<T: Entity>(field: impl AsRef<str>, reader: Reader) -> Self {
        Self {
            field: Arc::from(field.as_ref()),
            rust_type: std::any::type_name::<T>(),
            reader,
        }
    }

    pub fn field(&self) -> &str { &self.field }

    /// Name of the Rust type this accessor was bound to.
    pub fn rust_type(&self) -> &'static str { self.rust_type }

    pub fn kind(&self) -> AccessorKind {
        match self.reader {
            Reader::Single(_) => AccessorKind::Single,
            Reader::Collection(_) => AccessorKind::Collection,
            Reader::Map(_) => AccessorKind::Map,
        }
    }

    /// Read the referenced ids off `instance`.
    ///
    /// Returns `None` when `instance` is not of the bound Rust type.
    pub fn read(&self, instance: &dyn Entity) -> Option<Vec<EntityId>> {
        let any: &dyn Any = instance;
        match &self.reader {
            Reader::Single(f) => f(any).map(|id| id.into_iter().collect()),
            Reader::Collection(f) => f(any),
            Reader::Map(f) => f(any).map(|entries| entries.into_iter().map(|(_, id)| id).collect()),
        }
    }
}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("field", &self.field)
            .field("rust_type", &self.rust_type)
            .field("kind", &self.kind())
            .finish()
    }
}
