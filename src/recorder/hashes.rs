//! This module contains the tables of hash preimages consulted when resolving
//! storage keys.
//!
//! Hashes are indexed by the first [`HASH_LOOKUP_PREFIX_BYTES`] bytes of their
//! digest rather than the whole digest, so that a key formed by adding a small
//! offset to a digest still finds the hash it was derived from.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    sync::OnceLock,
};

use crate::{
    constant::{HASH_LOOKUP_PREFIX_BYTES, PRECOMPUTED_SLOT_HASH_COUNT},
    utility::keccak256,
    word::Word,
};

/// The portion of a digest by which hashes are looked up.
pub type HashPrefix = [u8; HASH_LOOKUP_PREFIX_BYTES];

/// Gets the lookup prefix of `word`.
#[must_use]
pub fn prefix_of(word: &Word) -> HashPrefix {
    let mut prefix = [0u8; HASH_LOOKUP_PREFIX_BYTES];
    prefix.copy_from_slice(&word.as_bytes()[..HASH_LOOKUP_PREFIX_BYTES]);
    prefix
}

/// An observed `keccak(preimage) = digest` relationship.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct HashEntry {
    pub digest:   Word,
    pub preimage: Vec<u8>,
}

impl HashEntry {
    #[must_use]
    pub fn new(digest: Word, preimage: Vec<u8>) -> Self {
        Self { digest, preimage }
    }
}

impl Display for HashEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "keccak({}) = {}", hex::encode(&self.preimage), self.digest)
    }
}

/// A table of hash entries, indexed by digest prefix.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HashTable {
    entries: HashMap<HashPrefix, HashEntry>,
}

impl HashTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `entry`, replacing any entry that shares its prefix.
    pub fn insert(&mut self, entry: HashEntry) {
        self.entries.insert(prefix_of(&entry.digest), entry);
    }

    /// Gets the entry whose digest shares its prefix with `key`.
    #[must_use]
    pub fn get(&self, key: &Word) -> Option<&HashEntry> {
        self.entries.get(&prefix_of(key))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HashEntry> {
        self.entries.values()
    }

    /// Generates the hashes of the first `count` slot indices, each encoded as
    /// a big-endian word.
    #[must_use]
    pub fn slot_hashes(count: u64) -> Self {
        let mut table = Self::new();
        for slot_ix in 0..count {
            let preimage = Word::from(slot_ix).as_bytes().to_vec();
            table.insert(HashEntry::new(keccak256(&preimage), preimage));
        }

        table
    }
}

/// Gets the process-wide table of hashes of the first
/// [`PRECOMPUTED_SLOT_HASH_COUNT`] slot indices.
///
/// The compiler folds these hashes into constants, so they are never observed
/// while executing and have to be recognised from this table instead.
pub fn precomputed() -> &'static HashTable {
    static TABLE: OnceLock<HashTable> = OnceLock::new();
    TABLE.get_or_init(|| HashTable::slot_hashes(PRECOMPUTED_SLOT_HASH_COUNT))
}

#[cfg(test)]
mod test {
    use ethnum::U256;

    use crate::{
        recorder::hashes::{precomputed, HashEntry, HashTable},
        utility::keccak256,
        word::Word,
    };

    #[test]
    fn precomputes_the_low_slot_hashes() -> anyhow::Result<()> {
        let table = precomputed();
        assert_eq!(table.len(), 5_000);

        let slot_one =
            Word::from_hex("b10e2d527612073b26eecdfd717e6a320cf44b4afac2b0732d9fcbe2b7fa0cf6")?;
        let entry = table.get(&slot_one).expect("slot 1 is precomputed");
        assert_eq!(Word::from_slice(&entry.preimage), Word::from(1u64));

        Ok(())
    }

    #[test]
    fn looks_up_offsets_by_prefix() {
        let mut table = HashTable::new();
        let digest = keccak256(b"some preimage");
        table.insert(HashEntry::new(digest, b"some preimage".to_vec()));

        let offset_key = Word::from(digest.to_u256().wrapping_add(U256::new(3)));
        assert_eq!(table.get(&offset_key).map(|e| e.digest), Some(digest));
        assert!(table.get(&Word::from(3u64)).is_none());
    }
}
