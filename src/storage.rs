//! This module contains the interface to raw contract storage, along with an
//! in-memory implementation of it.
//!
//! Storage is keyed by an owner, which is a contract address for the state of
//! a contract, or a transaction hash for the slots touched by a single
//! transaction. Slots that were never written read as absent.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::word::Word;

/// A read-only view of raw storage.
///
/// Implementations must support concurrent reads, as queries over the same
/// storage may run concurrently.
pub trait StorageReader: Send + Sync {
    /// Gets the number of slots stored for `owner`.
    fn size(&self, owner: &[u8]) -> usize;

    /// Gets the keys of all slots stored for `owner`.
    fn keys(&self, owner: &[u8]) -> BTreeSet<Word>;

    /// Gets the value of the slot at `key` for `owner`, if it exists.
    fn get(&self, owner: &[u8], key: &Word) -> Option<Word>;

    /// Gets the values of those `keys` that exist for `owner`.
    fn entries(&self, owner: &[u8], keys: &[Word]) -> BTreeMap<Word, Word> {
        keys.iter()
            .filter_map(|k| self.get(owner, k).map(|v| (*k, v)))
            .collect()
    }
}

impl<T: StorageReader + ?Sized> StorageReader for Arc<T> {
    fn size(&self, owner: &[u8]) -> usize {
        self.as_ref().size(owner)
    }

    fn keys(&self, owner: &[u8]) -> BTreeSet<Word> {
        self.as_ref().keys(owner)
    }

    fn get(&self, owner: &[u8], key: &Word) -> Option<Word> {
        self.as_ref().get(owner, key)
    }

    fn entries(&self, owner: &[u8], keys: &[Word]) -> BTreeMap<Word, Word> {
        self.as_ref().entries(owner, keys)
    }
}

/// Raw storage held in memory, for any number of owners.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    slots: RwLock<HashMap<Vec<u8>, BTreeMap<Word, Word>>>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the slot at `key` for `owner` to `value`.
    pub fn set(&self, owner: &[u8], key: Word, value: Word) {
        self.slots
            .write()
            .entry(owner.to_vec())
            .or_default()
            .insert(key, value);
    }

    /// Renders every slot stored for `owner` for diagnostics, one per line.
    #[must_use]
    pub fn dump(&self, owner: &[u8]) -> String {
        dump_storage(self, owner)
    }
}

impl StorageReader for InMemoryStorage {
    fn size(&self, owner: &[u8]) -> usize {
        self.slots.read().get(owner).map_or(0, BTreeMap::len)
    }

    fn keys(&self, owner: &[u8]) -> BTreeSet<Word> {
        self.slots
            .read()
            .get(owner)
            .map(|slots| slots.keys().copied().collect())
            .unwrap_or_default()
    }

    fn get(&self, owner: &[u8], key: &Word) -> Option<Word> {
        self.slots
            .read()
            .get(owner)
            .and_then(|slots| slots.get(key).copied())
    }
}

/// Renders every slot stored for `owner` in `storage`, one per line.
pub fn dump_storage<S: StorageReader + ?Sized>(storage: &S, owner: &[u8]) -> String {
    let keys = storage.keys(owner).into_iter().collect::<Vec<_>>();
    storage
        .entries(owner, &keys)
        .iter()
        .map(|(k, v)| format!("{k} = {v}\n"))
        .collect()
}
