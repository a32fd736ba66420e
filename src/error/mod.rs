//! This module contains the primary error type for the library's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.
//!
//! Note that a missing dictionary entry is never an error. Lookups that may
//! miss return [`Option`] instead, and the absence propagates as an empty
//! result.

pub mod decode;
pub mod layout;
pub mod path;
pub mod persistence;
pub mod schema;

use thiserror::Error;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// should return this result type. Subsystems should return the more-specific
/// child error types as appropriate.
pub type Result<T> = std::result::Result<T, Error>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by the
/// clients of the library) should be members of this enum.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// Errors that come from parsing and validating a type schema.
    #[error(transparent)]
    Schema(#[from] schema::Error),

    /// Errors from the slot layout computations.
    #[error(transparent)]
    Layout(#[from] layout::Error),

    /// Errors from the durable dictionary store.
    #[error(transparent)]
    Persistence(#[from] persistence::Error),

    /// Errors from parsing or rendering paths.
    #[error(transparent)]
    Path(#[from] path::Error),

    /// Errors from decoding data words.
    #[error(transparent)]
    Decode(#[from] decode::Error),

    /// An unknown error, represented as a string.
    #[error("Unknown Error: {_0:?}")]
    Other(String),
}

impl Error {
    /// Constructs an unknown error with the provided `message`.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}
