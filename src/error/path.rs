//! This module contains errors pertaining to path addressing.

use thiserror::Error;

use crate::constant::PATH_SEPARATOR;

/// Errors that occur while constructing or interpreting paths.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("The segment {segment:?} contains the reserved separator {PATH_SEPARATOR:?}")]
    SeparatorInSegment { segment: String },

    #[error("The segment {segment:?} is not a valid index")]
    InvalidIndex { segment: String },
}

/// The result type for functions that may return path errors.
pub type Result<T> = std::result::Result<T, Error>;
