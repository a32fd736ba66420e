//! This module contains the durable store of dictionaries, keyed by layout
//! convention and owner.
//!
//! All dictionaries share a single [`KeyValueStore`]. Each is given its own
//! namespace by XOR-ing the record ids with a word derived from the layout's
//! fingerprint and the owner, so dictionaries for distinct layouts or owners
//! never collide.

use std::{
    collections::HashMap,
    fmt::{Debug, Display, Formatter},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{
    constant::{SERPENT_LAYOUT_NAME, SOLIDITY_LAYOUT_NAME},
    dictionary::StorageDictionary,
    error::persistence::Result,
    utility::{keccak256, xor_align_right},
    word::Word,
};

/// The historical compiler conventions for deriving storage addresses.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Layout {
    /// Each hashing step hashes a sub-key followed by a single base word.
    Solidity,

    /// A single hash covers the whole multi-word path.
    Serpent,
}

impl Layout {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Solidity => SOLIDITY_LAYOUT_NAME,
            Self::Serpent => SERPENT_LAYOUT_NAME,
        }
    }

    /// Gets the word that identifies the layout in the store.
    #[must_use]
    pub fn fingerprint(&self) -> Word {
        keccak256(self.name())
    }

    /// Gets the namespace of the dictionary for `owner` under this layout.
    ///
    /// The owner is a contract address for contract-wide dictionaries, or a
    /// transaction hash for per-transaction ones.
    #[must_use]
    pub fn namespace(&self, owner: &[u8]) -> Word {
        xor_align_right(&self.fingerprint(), owner)
    }
}

impl Display for Layout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A durable key-value store in which dictionary records are kept.
///
/// Implementations must be safe to share between threads, as queries read from
/// the store concurrently.
pub trait KeyValueStore: Send + Sync {
    /// Gets the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails.
    fn get(&self, key: &Word) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails.
    fn put(&self, key: Word, value: Vec<u8>) -> Result<()>;

    /// Forces all previous writes to become durable.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails.
    fn flush(&self) -> Result<()>;
}

/// An in-memory store that distinguishes pending from durable writes.
///
/// Reads observe pending writes immediately, while [`KeyValueStore::flush`]
/// moves them into the durable set.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pending: RwLock<HashMap<Word, Vec<u8>>>,
    durable: RwLock<HashMap<Word, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the number of records that have been flushed.
    #[must_use]
    pub fn durable_len(&self) -> usize {
        self.durable.read().len()
    }

    /// Gets the number of records written but not yet flushed.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.read().len()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &Word) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.pending.read().get(key) {
            return Ok(Some(value.clone()));
        }

        Ok(self.durable.read().get(key).cloned())
    }

    fn put(&self, key: Word, value: Vec<u8>) -> Result<()> {
        self.pending.write().insert(key, value);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.write());
        self.durable.write().extend(pending);
        Ok(())
    }
}

/// A view of a shared store in which every key is XOR-ed with a namespace.
#[derive(Clone)]
pub struct NamespacedStore {
    inner:     Arc<dyn KeyValueStore>,
    namespace: Word,
}

impl NamespacedStore {
    #[must_use]
    pub fn new(inner: Arc<dyn KeyValueStore>, namespace: Word) -> Self {
        Self { inner, namespace }
    }

    fn key_for(&self, id: &Word) -> Word {
        xor_align_right(&self.namespace, id.as_bytes())
    }

    /// Gets the record stored under `id` in this namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails.
    pub fn get(&self, id: &Word) -> Result<Option<Vec<u8>>> {
        self.inner.get(&self.key_for(id))
    }

    /// Stores `value` under `id` in this namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails.
    pub fn put(&self, id: &Word, value: Vec<u8>) -> Result<()> {
        self.inner.put(self.key_for(id), value)
    }

    /// Flushes the underlying store.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }
}

impl Debug for NamespacedStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// The database of all dictionaries, over one shared store.
#[derive(Clone)]
pub struct DictionaryDb {
    store: Arc<dyn KeyValueStore>,
}

impl DictionaryDb {
    /// Constructs a database over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Constructs a database over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Opens the dictionary for `owner` under `layout`, loading everything that
    /// has previously been stored for it.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails or holds malformed records.
    pub fn dictionary(&self, layout: Layout, owner: &[u8]) -> Result<StorageDictionary> {
        let store = NamespacedStore::new(self.store.clone(), layout.namespace(owner));
        StorageDictionary::load(store)
    }

    /// Forces all stored dictionaries to become durable.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the backend fails.
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}

impl Debug for DictionaryDb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryDb").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use crate::{
        dictionary::db::{KeyValueStore, Layout, MemoryStore},
        word::Word,
    };

    #[test]
    fn namespaces_differ_by_layout_and_owner() {
        let owner = [0x11u8; 20];
        let other = [0x22u8; 20];

        assert_ne!(
            Layout::Solidity.namespace(&owner),
            Layout::Serpent.namespace(&owner)
        );
        assert_ne!(
            Layout::Solidity.namespace(&owner),
            Layout::Solidity.namespace(&other)
        );
    }

    #[test]
    fn memory_store_separates_pending_from_durable() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.put(Word::from(1u64), vec![1, 2, 3])?;

        assert_eq!(store.get(&Word::from(1u64))?, Some(vec![1, 2, 3]));
        assert_eq!(store.pending_len(), 1);
        assert_eq!(store.durable_len(), 0);

        store.flush()?;
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.durable_len(), 1);
        assert_eq!(store.get(&Word::from(1u64))?, Some(vec![1, 2, 3]));

        Ok(())
    }
}
