//! This module contains errors pertaining to the decoding of individual data
//! words.
//!
//! These never fail a page. The view degrades the affected leaf to an empty
//! value instead.

use thiserror::Error;

/// Errors that occur while decoding a single scalar value.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Ordinal {ordinal} is out of range for the enum {name:?} with {count} values")]
    EnumOrdinalOutOfRange {
        name:    String,
        ordinal: usize,
        count:   usize,
    },

    #[error("Malformed hex data word {text:?}")]
    MalformedHex { text: String },
}

/// The result type for functions that may return decode errors.
pub type Result<T> = std::result::Result<T, Error>;
