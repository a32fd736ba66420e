//! This module contains the shapes of the results returned by queries.
//!
//! Every query returns a [`StoragePage`], whose entries are either raw slots,
//! dictionary nodes with guessed values, or schema-decoded elements.

use serde::{Deserialize, Serialize};

use crate::{
    constant::PATH_SEPARATOR,
    dictionary::{element::PathElementKind, NodeRef},
    view::decode::RawValueKind,
    word::Word,
};

/// A single page of query results.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePage<T> {
    /// The entries on this page, in order.
    pub entries: Vec<T>,

    /// The zero-based index of this page.
    pub page: usize,

    /// The maximum number of entries on a page.
    pub page_size: usize,

    /// The total number of entries across all pages.
    pub total: usize,
}

impl<T> StoragePage<T> {
    #[must_use]
    pub fn new(entries: Vec<T>, page: usize, page_size: usize, total: usize) -> Self {
        Self {
            entries,
            page,
            page_size,
            total,
        }
    }

    /// Constructs a page with no entries.
    #[must_use]
    pub fn empty(page: usize, page_size: usize) -> Self {
        Self::new(Vec::new(), page, page_size, 0)
    }

    /// Transforms each entry on the page with `f`.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> StoragePage<U> {
        StoragePage {
            entries:   self.entries.into_iter().map(f).collect(),
            page:      self.page,
            page_size: self.page_size,
            total:     self.total,
        }
    }
}

/// The key side of an entry.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryKey {
    /// The human-readable name of the entry.
    pub name: String,

    /// The path addressing the entry, in its textual form.
    pub path: String,

    /// The role of the entry within its container.
    #[serde(rename = "type")]
    pub kind: String,

    /// The raw form of the key, if it differs from the name.
    pub raw: Option<String>,

    /// Whether the key was interpreted using a schema.
    pub decoded: bool,
}

/// The value side of an entry.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryValue {
    /// The decoded or guessed value, which is absent for containers.
    pub value: Option<String>,

    /// The hex of the raw slot word, if the slot exists.
    pub raw: Option<String>,

    /// The declared or guessed type name.
    #[serde(rename = "type")]
    pub type_name: String,

    /// The short name of the kind of the declared type.
    pub kind: Option<String>,

    /// Whether the value has children rather than a value of its own.
    pub container: bool,

    /// The number of children of a container.
    pub size: usize,

    /// Whether the value was interpreted using a schema.
    pub decoded: bool,
}

/// A single entry in a page of query results.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEntry {
    pub key:   EntryKey,
    pub value: EntryValue,
}

impl StorageEntry {
    /// Constructs an entry for a raw slot.
    #[must_use]
    pub fn raw(key: &Word, value: &Word) -> Self {
        Self {
            key:   EntryKey {
                name:    key.to_hex(),
                path:    key.to_hex(),
                kind:    "slot".into(),
                raw:     Some(key.to_hex()),
                decoded: false,
            },
            value: EntryValue {
                value: Some(value.to_hex()),
                raw: Some(value.to_hex()),
                type_name: RawValueKind::Data.to_string(),
                ..EntryValue::default()
            },
        }
    }

    /// Constructs an entry for a dictionary node, guessing the type of its
    /// value.
    ///
    /// A node with children is typed by the kind of its first child, while a
    /// leaf is typed by the shape of its `value`. A mapping entry whose only
    /// child is the offset addressing its own slot counts as a leaf.
    #[must_use]
    pub fn structured(node: &NodeRef<'_>, value: Option<Word>) -> Self {
        let key = EntryKey {
            name:    node.key().to_string(),
            path:    node.full_path().join(&PATH_SEPARATOR.to_string()),
            kind:    node.kind().map(|k| k.to_string()).unwrap_or_default(),
            raw:     node.storage_key().map(|k| k.to_hex()),
            decoded: false,
        };

        let mut children = node.children_iter();
        let first = children.next();
        let own_slot_only = children.next().is_none()
            && first.map_or(false, |c| {
                c.kind() == Some(PathElementKind::Offset) && c.storage_key() == node.storage_key()
            });
        let first = if own_slot_only { None } else { first };

        let kind = match first.and_then(|c| c.kind()) {
            Some(PathElementKind::MapKey) => RawValueKind::Map,
            Some(PathElementKind::ArrayIndex) => RawValueKind::Array,
            Some(_) => RawValueKind::Struct,
            None => value.as_ref().map_or(RawValueKind::Data, RawValueKind::classify),
        };
        let formatted = if kind.is_container() {
            None
        } else {
            value.as_ref().map(|v| kind.format(v))
        };

        let value = EntryValue {
            value:     formatted,
            raw:       value.map(|v| v.to_hex()),
            type_name: kind.to_string(),
            kind:      None,
            container: kind.is_container(),
            size:      if own_slot_only { 0 } else { node.children_count() },
            decoded:   false,
        };

        Self { key, value }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::{
        dictionary::{element::PathElement, StorageDictionary},
        entry::{StorageEntry, StoragePage},
        word::Word,
    };

    #[test]
    fn structured_entries_type_containers_by_their_first_child() {
        let mut dictionary = StorageDictionary::new();
        dictionary.add_path(&[
            PathElement::storage_index("1", Word::from(1u64)),
            PathElement::map_key("alice", Word::from(100u64)),
        ]);
        dictionary.add_path(&[PathElement::storage_index("2", Word::from(2u64))]);

        let mapping = dictionary.get_by_path(&["1"]).expect("node exists");
        let entry = StorageEntry::structured(&mapping, None);
        assert_eq!(entry.value.type_name, "map");
        assert!(entry.value.container);
        assert_eq!(entry.value.size, 1);

        let leaf = dictionary.get_by_path(&["1", "alice"]).expect("node exists");
        let entry = StorageEntry::structured(&leaf, Some(Word::from(7u64)));
        assert_eq!(entry.key.path, "1|alice");
        assert_eq!(entry.key.kind, "mapKey");
        assert_eq!(entry.value.type_name, "number");
        assert_eq!(entry.value.value.as_deref(), Some("7"));
    }

    #[test]
    fn mapping_entries_holding_a_single_slot_are_leaves() {
        let mut dictionary = StorageDictionary::new();
        let entry = [
            PathElement::storage_index("1", Word::from(1u64)),
            PathElement::map_key("bob", Word::from(100u64)),
        ];
        let mut value = entry.to_vec();
        value.push(PathElement::offset(0, Word::from(100u64)));
        dictionary.add_path(&value);

        let node = dictionary.get_by_path(&["1", "bob"]).expect("node exists");
        let leaf = StorageEntry::structured(&node, Some(Word::from(9u64)));
        assert_eq!(leaf.value.type_name, "number");
        assert_eq!(leaf.value.size, 0);
        assert!(!leaf.value.container);

        let mut field = entry.to_vec();
        field.push(PathElement::offset(1, Word::from(101u64)));
        dictionary.add_path(&field);

        let node = dictionary.get_by_path(&["1", "bob"]).expect("node exists");
        let container = StorageEntry::structured(&node, Some(Word::from(9u64)));
        assert_eq!(container.value.type_name, "struct");
        assert_eq!(container.value.size, 2);
        assert_eq!(container.value.value, None);
    }

    #[test]
    fn pages_serialize_in_camel_case() {
        let page = StoragePage::new(vec![StorageEntry::raw(&Word::ZERO, &Word::ZERO)], 0, 10, 1);
        let value = json!(page);

        assert_eq!(value["pageSize"], json!(10));
        assert_eq!(value["entries"][0]["key"]["type"], json!("slot"));
        assert_eq!(value["entries"][0]["value"]["type"], json!("data"));
    }
}
