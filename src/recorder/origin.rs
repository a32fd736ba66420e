//! This module contains the resolution of written storage keys back into the
//! logical paths that produced them.
//!
//! # Solidity
//!
//! A hashed location is `keccak(sub_key ++ base) + offset`, where `base` is
//! the word addressing the container and `sub_key` is the mapping key, or is
//! empty for the data of a dynamic array. Resolution looks up the hash from
//! which the key was derived, recurses into `base`, and then appends the step
//! that this hash represents.
//!
//! A mapping step is always followed by the offset of the key within the
//! value, even when that offset is zero. The entry node thereby only ever has
//! offsets as children, so the slots of a struct value never collide with the
//! keys of a mapping or the elements of an array held in its first field.
//!
//! # Serpent
//!
//! A hashed location is the hash of the whole multi-word path, so resolution
//! only succeeds for keys that are exactly a recorded digest, and produces one
//! map key per word of the preimage.

use ethnum::U256;

use crate::{
    constant::{
        DECIMAL_LABEL_MAXIMUM_BITS,
        MAXIMUM_RESOLUTION_DEPTH,
        NUMERIC_LABEL_LEADING_ZEROS,
        PATH_SEPARATOR,
        SLOT_SIZE_BYTES,
    },
    dictionary::element::PathElement,
    recorder::hashes::{HashEntry, HashTable},
    utility::keccak256,
    word::Word,
};

/// Guesses a human-readable label for the raw key `bytes`.
///
/// Values with many leading zero bytes are rendered as integers, values that
/// start with printable ASCII are rendered as that text, and anything else is
/// rendered as hex. Returns [`None`] for empty input.
#[must_use]
pub fn guess_label(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }

    let leading_zeros = bytes.iter().take_while(|b| **b == 0).count();
    if leading_zeros > NUMERIC_LABEL_LEADING_ZEROS {
        return Some(integer_label(&bytes[leading_zeros..]));
    }

    let text_len = bytes.iter().take_while(|b| **b != 0).count();
    let text = &bytes[..text_len];
    if text_len > 0 && text.iter().all(|b| (0x20..=0x7e).contains(b)) {
        let text = String::from_utf8_lossy(text);
        if !text.contains(PATH_SEPARATOR) {
            return Some(text.into_owned());
        }
    }

    Some(hex::encode(bytes))
}

/// Renders the big-endian `significant` bytes of an integer, which carry no
/// leading zeros.
fn integer_label(significant: &[u8]) -> String {
    if significant.len() <= SLOT_SIZE_BYTES {
        let value = Word::from_slice(significant).to_u256();
        if value < (U256::ONE << DECIMAL_LABEL_MAXIMUM_BITS) {
            return value.to_string();
        }
    }

    let digits = hex::encode(significant);
    format!("0x{}", digits.trim_start_matches('0'))
}

/// The label for a key that is used directly as a slot.
fn direct_label(key: &Word) -> String {
    guess_label(key.as_bytes()).unwrap_or_else(|| key.to_hex())
}

/// Resolves keys against the hashes observed during one invocation together
/// with the precomputed slot hashes.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    observed:    &'a HashTable,
    precomputed: &'a HashTable,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(observed: &'a HashTable, precomputed: &'a HashTable) -> Self {
        Self {
            observed,
            precomputed,
        }
    }

    /// Finds the hash from which `key` may have been derived.
    #[must_use]
    pub fn find(&self, key: &Word) -> Option<&'a HashEntry> {
        self.observed.get(key).or_else(|| self.precomputed.get(key))
    }

    /// Resolves `key` under the Solidity convention.
    ///
    /// Keys that were not derived from any known hash resolve to a single
    /// top-level slot.
    #[must_use]
    pub fn solidity(&self, key: &Word) -> Vec<PathElement> {
        self.solidity_at(key, 0)
    }

    fn solidity_at(&self, key: &Word, depth: usize) -> Vec<PathElement> {
        let direct = || vec![PathElement::storage_index(direct_label(key), *key)];

        let Some(entry) = self.find(key) else {
            return direct();
        };
        if depth >= MAXIMUM_RESOLUTION_DEPTH
            || entry.preimage.len() < SLOT_SIZE_BYTES
            || *key < entry.digest
        {
            return direct();
        }
        let offset = key.to_u256() - entry.digest.to_u256();
        if offset > U256::from(u64::MAX) {
            return direct();
        }
        let offset = offset.as_u64();

        let (sub_key, base) = entry.preimage.split_at(entry.preimage.len() - SLOT_SIZE_BYTES);
        let mut path = self.solidity_at(&Word::from_slice(base), depth + 1);

        match guess_label(sub_key) {
            None => path.push(PathElement::array_index(offset, *key)),
            Some(label) => {
                path.push(PathElement::map_key(label, entry.digest));
                path.push(PathElement::offset(offset, *key));
            }
        }

        path
    }

    /// Resolves `key` under the Serpent convention.
    ///
    /// Keys that are not exactly the digest of a multi-word preimage resolve to
    /// a single top-level slot.
    #[must_use]
    pub fn serpent(&self, key: &Word) -> Vec<PathElement> {
        if let Some(entry) = self.find(key) {
            let length = entry.preimage.len();
            if entry.digest == *key && length > SLOT_SIZE_BYTES && length % SLOT_SIZE_BYTES == 0 {
                return entry
                    .preimage
                    .chunks(SLOT_SIZE_BYTES)
                    .enumerate()
                    .map(|(ix, chunk)| {
                        let storage_key =
                            keccak256(&entry.preimage[..(ix + 1) * SLOT_SIZE_BYTES]);
                        let label = guess_label(chunk).unwrap_or_default();
                        PathElement::map_key(label, storage_key)
                    })
                    .collect();
            }
        }

        vec![PathElement::storage_index(direct_label(key), *key)]
    }
}

#[cfg(test)]
mod test {
    use ethnum::U256;

    use crate::{
        dictionary::element::{PathElement, PathElementKind},
        recorder::{
            hashes::{precomputed, HashEntry, HashTable},
            origin::{guess_label, Resolver},
        },
        utility::keccak256,
        word::Word,
    };

    fn observe(table: &mut HashTable, preimage: Vec<u8>) -> Word {
        let digest = keccak256(&preimage);
        table.insert(HashEntry::new(digest, preimage));
        digest
    }

    fn keys(path: &[PathElement]) -> Vec<&str> {
        path.iter().map(|e| e.key.as_str()).collect()
    }

    #[test]
    fn guesses_integer_labels() {
        assert_eq!(guess_label(Word::from(5u64).as_bytes()).as_deref(), Some("5"));
        assert_eq!(guess_label(Word::ZERO.as_bytes()).as_deref(), Some("0"));
        assert_eq!(
            guess_label(Word::from(0x8000_0000u64).as_bytes()).as_deref(),
            Some("0x80000000")
        );
        assert_eq!(guess_label(&[]), None);
    }

    #[test]
    fn guesses_text_and_hex_labels() {
        assert_eq!(guess_label(b"owner\0\0\0").as_deref(), Some("owner"));
        assert_eq!(guess_label(b"a|b").as_deref(), Some("617c62"));

        let mut address = [0u8; 32];
        address[12..].copy_from_slice(&[0xab; 20]);
        assert_eq!(guess_label(&address), Some(hex::encode(address)));
    }

    #[test]
    fn unknown_keys_are_direct_slots() {
        let observed = HashTable::new();
        let resolver = Resolver::new(&observed, precomputed());

        let path = resolver.solidity(&Word::from(7u64));
        assert_eq!(path, vec![PathElement::storage_index("7", Word::from(7u64))]);
    }

    #[test]
    fn resolves_dynamic_array_elements_from_precomputed_hashes() {
        let observed = HashTable::new();
        let resolver = Resolver::new(&observed, precomputed());
        let start = keccak256(Word::from(2u64).as_bytes());
        let key = Word::from(start.to_u256() + U256::from(4u64));

        let path = resolver.solidity(&key);
        assert_eq!(keys(&path), vec!["2", "4"]);
        assert_eq!(path[1].kind, PathElementKind::ArrayIndex);
        assert_eq!(path[1].storage_key, Some(key));
    }

    #[test]
    fn resolves_nested_mapping_keys() {
        let mut observed = HashTable::new();
        let mut preimage = Word::from(10u64).as_bytes().to_vec();
        preimage.extend_from_slice(Word::from(3u64).as_bytes());
        let inner = observe(&mut observed, preimage);
        let mut preimage = b"name".to_vec();
        preimage.extend_from_slice(inner.as_bytes());
        let outer = observe(&mut observed, preimage);
        let field = Word::from(outer.to_u256() + U256::from(2u64));

        let resolver = Resolver::new(&observed, precomputed());
        let path = resolver.solidity(&field);

        assert_eq!(keys(&path), vec!["3", "10", "0", "name", "2"]);
        assert_eq!(path[1].storage_key, Some(inner));
        assert_eq!(path[2].kind, PathElementKind::Offset);
        assert_eq!(path[2].storage_key, Some(inner));
        assert_eq!(path[3].kind, PathElementKind::MapKey);
        assert_eq!(path[3].storage_key, Some(outer));
        assert_eq!(path[4].kind, PathElementKind::Offset);
        assert_eq!(path[4].storage_key, Some(field));
    }

    #[test]
    fn values_at_a_mapping_key_end_in_offset_zero() {
        let mut observed = HashTable::new();
        let mut preimage = Word::from(5u64).as_bytes().to_vec();
        preimage.extend_from_slice(Word::from(1u64).as_bytes());
        let entry = observe(&mut observed, preimage);
        let data = observe(&mut observed, entry.as_bytes().to_vec());
        let resolver = Resolver::new(&observed, precomputed());

        let value = resolver.solidity(&entry);
        assert_eq!(keys(&value), vec!["1", "5", "0"]);
        assert_eq!(value[2].kind, PathElementKind::Offset);
        assert_eq!(value[2].storage_key, Some(entry));

        // The data of an array held at the start of the value hangs off the
        // offset node rather than the entry itself.
        let element = Word::from(data.to_u256() + U256::from(1u64));
        let path = resolver.solidity(&element);
        assert_eq!(keys(&path), vec!["1", "5", "0", "1"]);
        assert_eq!(path[3].kind, PathElementKind::ArrayIndex);
    }

    #[test]
    fn serpent_splits_the_whole_preimage() {
        let mut observed = HashTable::new();
        let mut preimage = Word::from(1u64).as_bytes().to_vec();
        preimage.extend_from_slice(Word::from(9u64).as_bytes());
        let digest = observe(&mut observed, preimage.clone());
        let resolver = Resolver::new(&observed, precomputed());

        let path = resolver.serpent(&digest);
        assert_eq!(keys(&path), vec!["1", "9"]);
        assert_eq!(path[0].storage_key, Some(keccak256(&preimage[..32])));
        assert_eq!(path[1].storage_key, Some(digest));

        let offset = Word::from(digest.to_u256() + U256::from(1u64));
        assert_eq!(resolver.serpent(&offset)[0].kind, PathElementKind::StorageIndex);
    }
}
