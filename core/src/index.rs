//! `FieldIndex` — which fields of a type need attention, and how.
//!
//! Computed once per type by the [`GraphWalker`](crate::GraphWalker) and then
//! only read. A field is indexed when it carries at least one enabled rule, or
//! when it is marked for nested checking and its declared type leads to a
//! checkable type.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::schema::TypeKey;

/// How the validator treats an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Judged by the field's registered matchers.
    Rules,
    /// A nested checkable object, walked with its own rules.
    Nested,
    /// A container whose elements are walked.
    Container,
}

/// One indexed field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedField {
    /// Field name.
    pub name: String,
    /// How to treat it.
    pub kind: FieldKind,
}

/// The indexed fields of one type, in declaration order.
#[derive(Debug)]
pub struct ClassIndex {
    key: TypeKey,
    fields: Vec<IndexedField>,
}

impl ClassIndex {
    pub(crate) fn new(key: TypeKey, fields: Vec<IndexedField>) -> Self {
        Self { key, fields }
    }

    /// The indexed type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Indexed fields.
    #[must_use]
    pub fn fields(&self) -> &[IndexedField] {
        &self.fields
    }

    /// Look up an indexed field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the indexed fields.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Cache of [`ClassIndex`] per type.
#[derive(Debug, Default)]
pub struct FieldIndex {
    classes: DashMap<TypeKey, Arc<ClassIndex>>,
}

impl FieldIndex {
    /// Empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexed fields of `key`, if the type has been indexed.
    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<Arc<ClassIndex>> {
        self.classes.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `key` has been indexed.
    #[must_use]
    pub fn contains(&self, key: TypeKey) -> bool {
        self.classes.contains_key(&key)
    }

    /// Number of indexed types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if no type has been indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Another indexed type with the same [`TypeKey::short_name`] as `key`.
    ///
    /// Rule documents address types by short name, so namesakes share them.
    #[must_use]
    pub fn namesake(&self, key: TypeKey) -> Option<TypeKey> {
        self.classes
            .iter()
            .map(|entry| *entry.key())
            .find(|other| *other != key && other.short_name() == key.short_name())
    }

    /// Publish `key`'s index unless another thread got there first.
    ///
    /// `install` runs only for the winner, while the entry is held, so whatever
    /// it registers is registered exactly once per type. A loser gets the
    /// winner's index and its own build is discarded.
    pub(crate) fn publish<F>(&self, key: TypeKey, install: F) -> Arc<ClassIndex>
    where
        F: FnOnce() -> ClassIndex,
    {
        match self.classes.entry(key) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                let index = Arc::new(install());
                slot.insert(Arc::clone(&index));
                index
            }
        }
    }
}
