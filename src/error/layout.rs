//! This module contains errors pertaining to slot layout computations and the
//! typed storage view built on top of them.
//!
//! These indicate implementation defects or requests that do not fit the
//! schema, and are never expected when walking a valid schema.

use thiserror::Error;

/// Errors that occur during slot computations.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Slot computation for {name:?} overflowed")]
    SlotOverflow { name: String },

    #[error("No field at position {position} in {container:?}")]
    NoSuchField { container: String, position: usize },

    #[error("The element {path:?} of type {type_name:?} has no nested types")]
    NoNestedTypes { path: String, type_name: String },

    #[error("The segment {segment:?} does not name a child of {path:?}")]
    NoSuchChild { path: String, segment: String },
}

/// The result type for functions that may return layout errors.
pub type Result<T> = std::result::Result<T, Error>;
