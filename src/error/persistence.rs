//! This module contains errors pertaining to the durable dictionary store.

use thiserror::Error;

/// Errors that occur while reading or writing dictionary records.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("The backing store failed: {message}")]
    Backend { message: String },

    #[error("The record stored under {id} is malformed: {message}")]
    MalformedRecord { id: String, message: String },

    #[error("Malformed hex {text:?} in an exported dictionary")]
    Hex { text: String },

    #[error("The exported dictionary has no root record")]
    MissingRoot,
}

impl Error {
    /// Constructs a backend error with the provided `message`.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// The result type for functions that may return persistence errors.
pub type Result<T> = std::result::Result<T, Error>;
