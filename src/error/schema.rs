//! This module contains errors pertaining to the parsing and validation of
//! the type schema that describes a contract's storage.

use thiserror::Error;

/// Errors that occur while building a [`crate::schema::TypeSchema`].
///
/// All of these are fatal at schema-build time, and none of them can occur
/// while traversing storage with a successfully built schema.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Invalid type expression {expression:?}: {reason}")]
    InvalidTypeExpression { expression: String, reason: String },

    #[error("The struct {name:?} is referenced but never declared")]
    UnknownStruct { name: String },

    #[error("The enum {name:?} is referenced but never declared")]
    UnknownEnum { name: String },

    #[error("The enum {name:?} declares no values")]
    EmptyEnum { name: String },

    #[error("The struct {name:?} contains itself without indirection")]
    RecursiveStruct { name: String },

    #[error("Malformed schema document: {message}")]
    Json { message: String },
}

impl Error {
    /// Constructs an invalid type expression error for `expression`.
    pub fn invalid_expression(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTypeExpression {
            expression: expression.into(),
            reason:     reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json {
            message: value.to_string(),
        }
    }
}

/// The result type for functions that may return schema errors.
pub type Result<T> = std::result::Result<T, Error>;
