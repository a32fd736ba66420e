//! This module contains the representation of the 256-bit words that make up
//! both the keys and the values of contract storage.
//!
//! # Byte Ordering
//!
//! A [`Word`] always holds its bytes in network (big-endian) order, which is
//! the order in which they appear in storage dumps and hash preimages. This
//! means that the derived ordering on words is also their numeric ordering.

use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use ethnum::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    constant::{ADDRESS_SIZE_BYTES, SLOT_SIZE_BYTES},
    error::decode,
    utility::strip_hex_prefix,
};

/// A contract address.
pub type Address = [u8; ADDRESS_SIZE_BYTES];

/// A 256-bit storage word, used both for slot keys and for slot values.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Word([u8; SLOT_SIZE_BYTES]);

impl Word {
    /// The word with all bits unset.
    pub const ZERO: Self = Self([0; SLOT_SIZE_BYTES]);

    /// Constructs a word from its big-endian `bytes`.
    #[must_use]
    pub fn from_be_bytes(bytes: [u8; SLOT_SIZE_BYTES]) -> Self {
        Self(bytes)
    }

    /// Constructs a word from up to 32 big-endian `bytes`, aligning them to the
    /// low-order (right) end of the word.
    ///
    /// If more than 32 bytes are provided, only the trailing 32 are kept.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; SLOT_SIZE_BYTES];
        let bytes = &bytes[bytes.len().saturating_sub(SLOT_SIZE_BYTES)..];
        data[SLOT_SIZE_BYTES - bytes.len()..].copy_from_slice(bytes);
        Self(data)
    }

    /// Parses a word from a hex string, with or without the `0x` prefix.
    ///
    /// Strings shorter than 64 digits are right-aligned, so `"0x2a"` parses to
    /// the word with numeric value 42.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `text` is not valid hex or encodes more than 32
    /// bytes.
    pub fn from_hex(text: &str) -> Result<Self, decode::Error> {
        let digits = strip_hex_prefix(text);
        let padded = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits.to_string()
        };
        let bytes = hex::decode(&padded).map_err(|_| decode::Error::MalformedHex {
            text: text.to_string(),
        })?;
        if bytes.len() > SLOT_SIZE_BYTES {
            return Err(decode::Error::MalformedHex {
                text: text.to_string(),
            });
        }

        Ok(Self::from_slice(&bytes))
    }

    /// Gets the big-endian bytes of the word.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SLOT_SIZE_BYTES] {
        &self.0
    }

    /// Gets the numeric value of the word, treating it as unsigned.
    #[must_use]
    pub fn to_u256(&self) -> U256 {
        U256::from_be_bytes(self.0)
    }

    /// Checks if every bit of the word is unset.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Gets the low-order 20 bytes of the word, which is where addresses live.
    #[must_use]
    pub fn last_20_bytes(&self) -> &[u8] {
        &self.0[SLOT_SIZE_BYTES - ADDRESS_SIZE_BYTES..]
    }

    /// Encodes the word as 64 lowercase hex digits without a prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Interprets the low-order bits of the word as an ordinal, saturating if
    /// the value does not fit.
    #[must_use]
    pub fn to_ordinal(&self) -> usize {
        let value = self.to_u256();
        if value > U256::from(u64::MAX) {
            usize::MAX
        } else {
            usize::try_from(value.as_u64()).unwrap_or(usize::MAX)
        }
    }
}

impl Debug for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Displays the word as unprefixed hex, matching the format of storage dumps.
impl Display for Word {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Word {
    type Err = decode::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<U256> for Word {
    fn from(value: U256) -> Self {
        Self(value.to_be_bytes())
    }
}

impl From<Word> for U256 {
    fn from(value: Word) -> Self {
        value.to_u256()
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Self::from(U256::from(value))
    }
}

impl From<[u8; SLOT_SIZE_BYTES]> for Word {
    fn from(value: [u8; SLOT_SIZE_BYTES]) -> Self {
        Self(value)
    }
}

impl Serialize for Word {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = String::from("0x");
        value.push_str(&self.to_hex());

        serializer.serialize_str(&value)
    }
}

impl<'de> Deserialize<'de> for Word {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Word::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
