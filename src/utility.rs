//! Utility functions useful throughout the codebase.

use std::ops::Range;

use sha3::{Digest, Keccak256};

use crate::{constant::SLOT_SIZE_BYTES, word::Word};

/// Computes the Keccak-256 hash of `data`, as performed by the `SHA3` opcode.
#[must_use]
pub fn keccak256(data: impl AsRef<[u8]>) -> Word {
    let hash: [u8; SLOT_SIZE_BYTES] = Keccak256::digest(data.as_ref()).into();
    Word::from_be_bytes(hash)
}

/// Removes the `0x` prefix from `text` if it is present.
#[must_use]
pub fn strip_hex_prefix(text: &str) -> &str {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
}

/// Decodes hex `text` that may or may not carry the `0x` prefix.
///
/// # Errors
///
/// Returns [`Err`] if `text` is not valid hex.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(strip_hex_prefix(text))
}

/// XORs `value` into the right-aligned bytes of `base`.
///
/// This is how a namespace is formed from a layout fingerprint and an owner
/// id. Only the trailing 32 bytes of `value` are used if it is longer.
#[must_use]
pub fn xor_align_right(base: &Word, value: &[u8]) -> Word {
    let mut bytes = *base.as_bytes();
    let value = &value[value.len().saturating_sub(SLOT_SIZE_BYTES)..];
    let start = SLOT_SIZE_BYTES - value.len();
    for (target, source) in bytes[start..].iter_mut().zip(value) {
        *target ^= source;
    }

    Word::from_be_bytes(bytes)
}

/// Computes the range of item indices covered by the zero-based `page` of
/// `size` items, for a collection of `total` items.
///
/// The returned range is empty if the page lies past the end of the
/// collection.
#[must_use]
pub fn page_range(page: usize, size: usize, total: usize) -> Range<usize> {
    let from = page.saturating_mul(size).min(total);
    let to = from.saturating_add(size).min(total);

    from..to
}

#[cfg(test)]
mod test {
    use crate::{
        utility::{keccak256, page_range, xor_align_right},
        word::Word,
    };

    #[test]
    fn computes_keccak_of_slot_zero() -> anyhow::Result<()> {
        let expected =
            Word::from_hex("290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563")?;
        assert_eq!(keccak256(Word::ZERO.as_bytes()), expected);

        Ok(())
    }

    #[test]
    fn xor_aligns_to_the_right() {
        let base = Word::from_slice(&[0xff; 32]);
        let result = xor_align_right(&base, &[0x0f, 0xf0]);
        assert_eq!(result.as_bytes()[29], 0xff);
        assert_eq!(result.as_bytes()[30], 0xf0);
        assert_eq!(result.as_bytes()[31], 0x0f);
    }

    #[test]
    fn xor_with_distinct_values_gives_distinct_namespaces() {
        let base = keccak256(b"solidity");
        assert_ne!(xor_align_right(&base, &[1; 20]), xor_align_right(&base, &[2; 20]));
    }

    #[test]
    fn pages_cover_the_collection() {
        assert_eq!(page_range(0, 3, 7), 0..3);
        assert_eq!(page_range(2, 3, 7), 6..7);
        assert_eq!(page_range(3, 3, 7), 7..7);
        assert_eq!(page_range(usize::MAX, 3, 7), 7..7);
    }
}
