//! This module contains the elements from which dictionary paths are built.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::word::Word;

/// The role a path element plays in addressing storage.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PathElementKind {
    /// A top-level slot, keyed by its slot index.
    StorageIndex,

    /// An entry in a mapping, keyed by a rendering of the mapping key.
    MapKey,

    /// An element of a dynamic array, keyed by its slot offset from the start
    /// of the array data.
    ArrayIndex,

    /// A slot at an offset from a hashed base, such as a struct field stored
    /// in a mapping.
    Offset,
}

impl Display for PathElementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StorageIndex => "storageIndex",
            Self::MapKey => "mapKey",
            Self::ArrayIndex => "arrayIndex",
            Self::Offset => "offset",
        };
        write!(f, "{name}")
    }
}

/// A single step in a path through the dictionary.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathElement {
    /// The segment that names this element among its siblings.
    pub key: String,

    pub kind: PathElementKind,

    /// The storage key addressed by this element, if it addresses one
    /// directly.
    pub storage_key: Option<Word>,
}

impl PathElement {
    /// Constructs a new path element.
    #[must_use]
    pub fn new(key: impl Into<String>, kind: PathElementKind, storage_key: Option<Word>) -> Self {
        let key = key.into();
        Self {
            key,
            kind,
            storage_key,
        }
    }

    /// Constructs an element for the top-level slot labelled `key`.
    #[must_use]
    pub fn storage_index(key: impl Into<String>, storage_key: Word) -> Self {
        Self::new(key, PathElementKind::StorageIndex, Some(storage_key))
    }

    /// Constructs an element for the mapping entry labelled `key`.
    #[must_use]
    pub fn map_key(key: impl Into<String>, storage_key: Word) -> Self {
        Self::new(key, PathElementKind::MapKey, Some(storage_key))
    }

    /// Constructs an element for the array slot at `index`.
    #[must_use]
    pub fn array_index(index: u64, storage_key: Word) -> Self {
        Self::new(index.to_string(), PathElementKind::ArrayIndex, Some(storage_key))
    }

    /// Constructs an element for the slot at `offset` from a hashed base.
    #[must_use]
    pub fn offset(offset: u64, storage_key: Word) -> Self {
        Self::new(offset.to_string(), PathElementKind::Offset, Some(storage_key))
    }
}
