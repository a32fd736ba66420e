//! This module contains the persisted form of dictionary nodes.
//!
//! Each node is stored as its own record under an id derived from its path, so
//! that a record can be found from its path alone and a subtree can be
//! transplanted between namespaces without rewriting any ids.

use serde::{Deserialize, Serialize};

use crate::{
    dictionary::element::PathElementKind,
    error::persistence::{Error, Result},
    utility::keccak256,
    word::Word,
};

/// The persisted form of a single dictionary node.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// The segment naming the node, which is empty for the root.
    pub key: String,

    /// The kind of the node, which is absent for the root.
    pub kind: Option<PathElementKind>,

    pub storage_key: Option<Word>,

    /// The segments naming the node's children, in insertion order.
    pub children: Vec<String>,
}

impl NodeRecord {
    /// Serializes the record.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the record cannot be serialized.
    pub fn to_bytes(&self, id: &Word) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::MalformedRecord {
            id:      id.to_hex(),
            message: e.to_string(),
        })
    }

    /// Deserializes the record stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `bytes` are not a valid record.
    pub fn from_bytes(id: &Word, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::MalformedRecord {
            id:      id.to_hex(),
            message: e.to_string(),
        })
    }
}

/// Computes the record id for the node at the path made of `segments`.
///
/// Each segment is prefixed with its big-endian `u32` length before hashing so
/// that distinct paths never concatenate to the same input.
#[must_use]
pub fn record_id<S: AsRef<str>>(segments: &[S]) -> Word {
    let mut input = Vec::new();
    for segment in segments {
        let bytes = segment.as_ref().as_bytes();
        let length = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
        input.extend_from_slice(&length.to_be_bytes());
        input.extend_from_slice(bytes);
    }

    keccak256(input)
}
