//! This module contains the physical locations of typed elements, and their
//! translation into dictionary paths.
//!
//! A location is a slot offset from a base. Top-level members and everything
//! laid out statically within them are offsets from the root of storage. The
//! value of a mapping entry and the data of a dynamic array live at hashed
//! bases, which the dictionary addresses by the path of the entry or the array
//! itself. Every slot at a hashed base, including the first, is a child of
//! that path keyed by its offset.

use crate::error::layout;

/// The base from which a location's offset is measured.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum LocationBase {
    /// The start of the contract's storage.
    Root,

    /// The value of the mapping entry at the given dictionary path.
    MapValue(Vec<String>),

    /// The data of the dynamic array at the given dictionary path.
    ArrayData(Vec<String>),
}

/// The location of an element's first slot.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Location {
    pub base:   LocationBase,
    pub offset: u64,
}

impl Location {
    /// Constructs the location of a top-level slot.
    #[must_use]
    pub fn root(offset: u64) -> Self {
        Self {
            base: LocationBase::Root,
            offset,
        }
    }

    /// Constructs the location of the value of the mapping entry at `path`.
    #[must_use]
    pub fn map_value(path: Vec<String>) -> Self {
        Self {
            base:   LocationBase::MapValue(path),
            offset: 0,
        }
    }

    /// Constructs the location at `offset` in the data of the dynamic array at
    /// `path`.
    #[must_use]
    pub fn array_data(path: Vec<String>, offset: u64) -> Self {
        Self {
            base: LocationBase::ArrayData(path),
            offset,
        }
    }

    /// Gets the location `by` slots further on from the same base.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the offset overflows.
    pub fn shifted(&self, by: u64, name: &str) -> layout::Result<Self> {
        let offset = self
            .offset
            .checked_add(by)
            .ok_or_else(|| layout::Error::SlotOverflow {
                name: name.to_string(),
            })?;

        Ok(Self {
            base: self.base.clone(),
            offset,
        })
    }

    /// Checks if the location is measured from a hashed base.
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        !matches!(self.base, LocationBase::Root)
    }

    /// Gets the dictionary path of the node under which the slots of this
    /// location's base are recorded, which is empty for the root.
    #[must_use]
    pub fn base_path(&self) -> &[String] {
        match &self.base {
            LocationBase::Root => &[],
            LocationBase::MapValue(path) | LocationBase::ArrayData(path) => path,
        }
    }

    /// Gets the dictionary path of the node addressing this location.
    #[must_use]
    pub fn dictionary_path(&self) -> Vec<String> {
        let mut path = self.base_path().to_vec();
        path.push(self.offset.to_string());
        path
    }
}
