//! This module contains the decoding of individual storage words into
//! human-readable values.
//!
//! Decoding never fails a page. Where a single value cannot be decoded it is
//! logged and rendered as the empty string.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    constant::{
        ADDRESS_LEADING_ZERO_NIBBLES,
        NUMBER_LEADING_ZERO_NIBBLES,
        SLOT_SIZE_BYTES,
        STRING_TRAILING_ZERO_NIBBLES,
    },
    layout::ContractLayout,
    schema::{Elementary, Type},
    word::Word,
};

/// Decodes the scalar value of type `ty` held in the `raw` slot word.
///
/// The `bytes` of dynamically-sized values are only assembled when `ty` needs
/// them. Returns [`None`] for container types, which have no value of their
/// own.
pub fn decode_scalar(
    layout: &ContractLayout,
    ty: &Type,
    raw: Option<Word>,
    bytes: impl FnOnce() -> Vec<u8>,
) -> Option<String> {
    let value = match ty {
        Type::Struct(_) | Type::Array { .. } | Type::Mapping { .. } => return None,
        Type::Enum(name) => {
            let ordinal = raw.map_or(0, |w| w.to_ordinal());
            match layout.enum_value(name, ordinal) {
                Ok(value) => value.to_string(),
                Err(err) => {
                    warn!(%err, "Cannot decode enum value");
                    String::new()
                }
            }
        }
        Type::Contract(_) | Type::Elementary(Elementary::Address) => raw
            .map(|w| hex::encode(w.last_20_bytes()))
            .unwrap_or_default(),
        Type::Elementary(Elementary::Bool) => raw.map_or(false, |w| !w.is_zero()).to_string(),
        Type::Elementary(Elementary::String) => decode_text(bytes()),
        Type::Elementary(Elementary::Bytes) => hex::encode(bytes()),
        Type::Elementary(Elementary::Int(_) | Elementary::UInt(_)) => {
            raw.unwrap_or_default().to_u256().to_string()
        }
        Type::Elementary(Elementary::Other(_)) => raw.map(|w| w.to_hex()).unwrap_or_default(),
    };

    Some(value)
}

/// Decodes string `bytes`, which end at the first zero byte.
///
/// A full slot with no terminator is a short string whose final byte holds its
/// encoded length, so that byte is dropped.
#[must_use]
pub fn decode_text(mut bytes: Vec<u8>) -> String {
    match bytes.iter().position(|b| *b == 0) {
        Some(end) => bytes.truncate(end),
        None if bytes.len() == SLOT_SIZE_BYTES => bytes.truncate(SLOT_SIZE_BYTES - 1),
        None => (),
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Checks if `id` is the hex rendering of a full data word.
#[must_use]
pub fn is_data_word(id: &str) -> bool {
    id.len() == SLOT_SIZE_BYTES * 2 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Renders the mapping key `id` according to the mapping's declared `key_ty`.
///
/// Only keys recorded as full data words are re-rendered, as anything else was
/// already given a readable label when it was recorded.
#[must_use]
pub fn render_map_key(layout: &ContractLayout, key_ty: &Type, id: &str) -> String {
    if !is_data_word(id) {
        return id.to_string();
    }
    let Ok(word) = Word::from_hex(id) else {
        return id.to_string();
    };

    decode_scalar(layout, key_ty, Some(word), || word.as_bytes().to_vec())
        .unwrap_or_else(|| id.to_string())
}

/// The kinds a raw storage value can be guessed to be when no schema is
/// available.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RawValueKind {
    Address,
    String,
    Number,
    Data,
    Map,
    Array,
    Struct,
}

impl RawValueKind {
    /// Guesses the kind of the leaf value `word` from the runs of zero nibbles
    /// at its ends.
    #[must_use]
    pub fn classify(word: &Word) -> Self {
        let hex = word.to_hex();
        let leading = hex.chars().take_while(|c| *c == '0').count();
        let trailing = hex.chars().rev().take_while(|c| *c == '0').count();

        let (min_address, max_address) = ADDRESS_LEADING_ZERO_NIBBLES;
        let (min_string, max_string) = STRING_TRAILING_ZERO_NIBBLES;
        if (min_address..=max_address).contains(&leading) {
            Self::Address
        } else if (min_string..=max_string).contains(&trailing) {
            Self::String
        } else if leading >= NUMBER_LEADING_ZERO_NIBBLES {
            Self::Number
        } else {
            Self::Data
        }
    }

    /// Checks if the kind describes a container rather than a leaf.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Map | Self::Array | Self::Struct)
    }

    /// Formats `word` as a value of this kind.
    #[must_use]
    pub fn format(&self, word: &Word) -> String {
        match self {
            Self::Address => hex::encode(word.last_20_bytes()),
            Self::String => {
                let bytes = word.as_bytes();
                let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
                String::from_utf8_lossy(&bytes[..end]).into_owned()
            }
            Self::Number => word.to_u256().to_string(),
            Self::Data => word.to_hex(),
            Self::Map | Self::Array | Self::Struct => String::new(),
        }
    }
}

impl Display for RawValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Address => "address",
            Self::String => "string",
            Self::Number => "number",
            Self::Data => "data",
            Self::Map => "map",
            Self::Array => "array",
            Self::Struct => "struct",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::{
        layout::ContractLayout,
        schema::Type,
        view::decode::{decode_scalar, decode_text, render_map_key, RawValueKind},
        word::Word,
    };

    fn layout() -> ContractLayout {
        let document = json!({
            "enums": [{ "name": "State", "values": ["Open", "Closed"] }]
        });
        ContractLayout::from_json(&document.to_string()).expect("valid test schema")
    }

    fn decode(ty: &str, raw: Option<Word>) -> Option<String> {
        let ty = Type::parse(ty).expect("valid test type");
        let bytes = raw.map(|w| w.as_bytes().to_vec()).unwrap_or_default();
        decode_scalar(&layout(), &ty, raw, || bytes)
    }

    #[test]
    fn decodes_scalars() {
        assert_eq!(decode("bool", None).as_deref(), Some("false"));
        assert_eq!(decode("bool", Some(Word::from(1u64))).as_deref(), Some("true"));
        assert_eq!(decode("uint256", None).as_deref(), Some("0"));
        assert_eq!(decode("uint8", Some(Word::from(42u64))).as_deref(), Some("42"));
        assert_eq!(decode("address", None).as_deref(), Some(""));
        assert_eq!(
            decode("contract", Some(Word::from_slice(&[0xcd; 20]))).as_deref(),
            Some("cd".repeat(20).as_str())
        );
        assert_eq!(decode("enum:State", None).as_deref(), Some("Open"));
        assert_eq!(decode("enum:State", Some(Word::from(1u64))).as_deref(), Some("Closed"));
        assert_eq!(decode("mapping<uint256,uint256>", None), None);
    }

    #[test]
    fn out_of_range_enums_degrade_to_empty() {
        assert_eq!(decode("enum:State", Some(Word::from(7u64))).as_deref(), Some(""));
    }

    #[test]
    fn decodes_short_and_full_strings() {
        let mut short = [0u8; 32];
        short[..3].copy_from_slice(b"abc");
        short[31] = 6;
        assert_eq!(decode_text(short.to_vec()), "abc");

        let mut full = [b'x'; 32];
        full[31] = 62;
        assert_eq!(decode_text(full.to_vec()), "x".repeat(31));
        assert_eq!(decode_text(b"y".repeat(40)), "y".repeat(40));
        assert_eq!(decode_text(Vec::new()), "");
    }

    #[test]
    fn renders_data_word_map_keys_by_key_type() {
        let key = Word::from_slice(&[0xab; 20]).to_hex();
        let address = Type::parse("address").expect("valid test type");
        let uint = Type::parse("uint256").expect("valid test type");

        assert_eq!(render_map_key(&layout(), &address, &key), "ab".repeat(20));
        assert_eq!(
            render_map_key(&layout(), &uint, &Word::from(9u64).to_hex()),
            "9"
        );
        assert_eq!(render_map_key(&layout(), &uint, "9"), "9");
    }

    #[test]
    fn classifies_raw_values() -> anyhow::Result<()> {
        let address = Word::from_slice(&[0x11; 20]);
        assert_eq!(RawValueKind::classify(&address), RawValueKind::Address);
        assert_eq!(RawValueKind::format(&RawValueKind::Address, &address), "11".repeat(20));

        let mut text = [0u8; 32];
        text[..5].copy_from_slice(b"hello");
        let text = Word::from_be_bytes(text);
        assert_eq!(RawValueKind::classify(&text), RawValueKind::String);
        assert_eq!(RawValueKind::String.format(&text), "hello");

        assert_eq!(RawValueKind::classify(&Word::from(5u64)), RawValueKind::Number);
        assert_eq!(RawValueKind::classify(&Word::ZERO), RawValueKind::Number);
        assert_eq!(
            RawValueKind::classify(&Word::from_hex(&"f1".repeat(32))?),
            RawValueKind::Data
        );

        Ok(())
    }
}
