//! This module contains the provenance dictionary: a path-indexed tree of the
//! storage locations that have been resolved for one owner under one layout
//! convention.
//!
//! # Best Effort
//!
//! The dictionary only contains the locations that were written while
//! recording was active, so it may well be incomplete. Absence of a node is a
//! normal outcome and is reported as [`None`] rather than as an error.
//!
//! # Representation
//!
//! Nodes live in an arena, with each node holding the index of its parent and
//! the indices of its children in insertion order. Children are always
//! allocated after their parents, which the filtering pass relies on.

pub mod db;
pub mod element;
pub mod path;
pub mod record;

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    fmt::Write,
};

use tracing::{debug, warn};

use crate::{
    dictionary::{
        db::NamespacedStore,
        element::{PathElement, PathElementKind},
        record::{record_id, NodeRecord},
    },
    error::persistence::{Error, Result},
    utility::decode_hex,
    word::Word,
};

/// The index of the root node in the arena.
const ROOT: usize = 0;

#[derive(Clone, Debug, Eq, PartialEq)]
struct Node {
    key:         String,
    kind:        Option<PathElementKind>,
    storage_key: Option<Word>,
    parent:      Option<usize>,
    children:    Vec<usize>,
    by_key:      HashMap<String, usize>,
}

impl Node {
    fn root() -> Self {
        Self::new(String::new(), None, None, None)
    }

    fn new(
        key: String,
        kind: Option<PathElementKind>,
        storage_key: Option<Word>,
        parent: Option<usize>,
    ) -> Self {
        Self {
            key,
            kind,
            storage_key,
            parent,
            children: Vec::new(),
            by_key: HashMap::new(),
        }
    }
}

/// A tree of resolved storage locations, optionally backed by a durable
/// store.
#[derive(Clone, Debug)]
pub struct StorageDictionary {
    nodes: Vec<Node>,
    dirty: BTreeSet<usize>,
    store: Option<NamespacedStore>,
}

impl StorageDictionary {
    /// Constructs an empty dictionary that is not backed by any store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::root()],
            dirty: BTreeSet::new(),
            store: None,
        }
    }

    /// Loads the dictionary held in `store`, which is empty if nothing has been
    /// stored there yet.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the store fails or holds a malformed record.
    pub fn load(store: NamespacedStore) -> Result<Self> {
        let mut dictionary = Self::new();
        let root_id = record_id::<String>(&[]);

        if let Some(bytes) = store.get(&root_id)? {
            let root = NodeRecord::from_bytes(&root_id, &bytes)?;
            let mut stack = vec![(ROOT, Vec::<String>::new(), root)];

            while let Some((parent, path, record)) = stack.pop() {
                for child_key in record.children {
                    let mut child_path = path.clone();
                    child_path.push(child_key.clone());
                    let id = record_id(&child_path);
                    let Some(bytes) = store.get(&id)? else {
                        warn!(path = ?child_path, "Dictionary record is missing");
                        continue;
                    };
                    let child = NodeRecord::from_bytes(&id, &bytes)?;
                    let index = dictionary.push_node(
                        parent,
                        Node::new(child_key, child.kind, child.storage_key, Some(parent)),
                    );
                    stack.push((index, child_path, child));
                }
            }
        }

        debug!(nodes = dictionary.nodes.len(), "Loaded dictionary");
        dictionary.store = Some(store);

        Ok(dictionary)
    }

    fn push_node(&mut self, parent: usize, node: Node) -> usize {
        let index = self.nodes.len();
        let key = node.key.clone();
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        self.nodes[parent].by_key.insert(key, index);

        index
    }

    /// Merges the chain of `elements` into the tree, starting at the root.
    ///
    /// Elements that already exist with the same key and kind are reused, so
    /// re-adding a path is a no-op. New elements are appended after their
    /// existing siblings. A sibling with the same key but a different kind is
    /// never merged with, and the rest of the path is dropped instead. Returns
    /// `true` if the tree changed.
    pub fn add_path(&mut self, elements: &[PathElement]) -> bool {
        let mut current = ROOT;
        let mut changed = false;

        for element in elements {
            let existing = self.nodes[current].by_key.get(&element.key).copied();
            current = match existing {
                Some(index) if self.nodes[index].kind != Some(element.kind) => {
                    warn!(
                        path = ?self.path_of(index),
                        existing = ?self.nodes[index].kind,
                        added = %element.kind,
                        "Dictionary path conflicts with a sibling of another kind"
                    );
                    return changed;
                }
                Some(index) => {
                    let node = &mut self.nodes[index];
                    if node.storage_key.is_none() && element.storage_key.is_some() {
                        node.storage_key = element.storage_key;
                        self.dirty.insert(index);
                        changed = true;
                    }
                    index
                }
                None => {
                    let node = Node::new(
                        element.key.clone(),
                        Some(element.kind),
                        element.storage_key,
                        Some(current),
                    );
                    let index = self.push_node(current, node);
                    self.dirty.insert(current);
                    self.dirty.insert(index);
                    changed = true;
                    index
                }
            };
        }

        changed
    }

    /// Gets the root node.
    #[must_use]
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            dictionary: self,
            index:      ROOT,
        }
    }

    /// Descends from the root along `segments`, returning [`None`] if any
    /// segment is missing.
    #[must_use]
    pub fn get_by_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<NodeRef<'_>> {
        segments
            .iter()
            .try_fold(self.root(), |node, segment| node.child(segment.as_ref()))
    }

    /// Constructs a new dictionary containing only the nodes whose storage key
    /// is in `keys`, along with their ancestors.
    ///
    /// The result is not backed by any store, and sibling order is preserved.
    #[must_use]
    pub fn get_filtered(&self, keys: &HashSet<Word>) -> Self {
        let mut keep = vec![false; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate().rev() {
            let kept = node.storage_key.map_or(false, |k| keys.contains(&k))
                || node.children.iter().any(|c| keep[*c]);
            keep[index] = kept;
        }

        let mut filtered = Self::new();
        let mut stack = vec![(ROOT, ROOT)];
        while let Some((source, target)) = stack.pop() {
            for child in &self.nodes[source].children {
                if !keep[*child] {
                    continue;
                }
                let node = &self.nodes[*child];
                let index = filtered.push_node(
                    target,
                    Node::new(node.key.clone(), node.kind, node.storage_key, Some(target)),
                );
                stack.push((*child, index));
            }
        }
        filtered
    }

    /// Gets the number of nodes in the tree, including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Checks if the tree holds nothing but the root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Checks if there are changes that have not yet been stored.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Writes every new or changed node to the backing store.
    ///
    /// This is a no-op for dictionaries that are not backed by a store.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the store fails.
    pub fn store(&mut self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };

        for index in &self.dirty {
            let path = self.path_of(*index);
            let id = record_id(&path);
            let record = self.record_of(*index, None);
            store.put(&id, record.to_bytes(&id)?)?;
        }
        debug!(records = self.dirty.len(), "Stored dictionary changes");
        self.dirty.clear();

        Ok(())
    }

    /// Forces the backing store to make all stored records durable.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the store fails.
    pub fn flush(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.flush(),
            None => Ok(()),
        }
    }

    fn path_of(&self, index: usize) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent {
            path.push(self.nodes[current].key.clone());
            current = parent;
        }
        path.reverse();

        path
    }

    /// Builds the record for the node at `index`, restricting its children to
    /// `only_child` if provided.
    fn record_of(&self, index: usize, only_child: Option<usize>) -> NodeRecord {
        let node = &self.nodes[index];
        let children = node
            .children
            .iter()
            .filter(|c| only_child.map_or(true, |o| o == **c))
            .map(|c| self.nodes[*c].key.clone())
            .collect();

        NodeRecord {
            key: node.key.clone(),
            kind: node.kind,
            storage_key: node.storage_key,
            children,
        }
    }

    /// Serializes the subtree at `segments` as a flat map from hex record id
    /// to hex record.
    ///
    /// The ancestors of the subtree are included with their children pruned
    /// to the single child on the path, so the export can be imported into a
    /// dictionary of its own. The result is empty if the path does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if a record cannot be serialized.
    pub fn export<S: AsRef<str>>(&self, segments: &[S]) -> Result<BTreeMap<String, String>> {
        let mut result = BTreeMap::new();
        let Some(target) = self.get_by_path(segments) else {
            return Ok(result);
        };

        let mut insert = |index: usize, only_child: Option<usize>| -> Result<()> {
            let id = record_id(&self.path_of(index));
            let record = self.record_of(index, only_child);
            result.insert(id.to_hex(), hex::encode(record.to_bytes(&id)?));
            Ok(())
        };

        let mut child = target.index;
        let mut ancestor = self.nodes[target.index].parent;
        while let Some(index) = ancestor {
            insert(index, Some(child))?;
            child = index;
            ancestor = self.nodes[index].parent;
        }

        let mut stack = vec![target.index];
        while let Some(index) = stack.pop() {
            insert(index, None)?;
            stack.extend(self.nodes[index].children.iter().copied());
        }

        Ok(result)
    }

    /// Merges the records in an exported map into this dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the map is malformed or has no root record.
    pub fn import(&mut self, entries: &BTreeMap<String, String>) -> Result<()> {
        let mut records = HashMap::new();
        for (id, record) in entries {
            let id = Word::from_hex(id).map_err(|_| Error::Hex { text: id.clone() })?;
            let bytes = decode_hex(record).map_err(|_| Error::Hex {
                text: record.clone(),
            })?;
            records.insert(id, NodeRecord::from_bytes(&id, &bytes)?);
        }

        let root_id = record_id::<String>(&[]);
        let root = records.get(&root_id).ok_or(Error::MissingRoot)?;
        let mut stack: Vec<(Vec<String>, Vec<PathElement>, &NodeRecord)> =
            vec![(Vec::new(), Vec::new(), root)];

        while let Some((path, elements, record)) = stack.pop() {
            for child_key in &record.children {
                let mut child_path = path.clone();
                child_path.push(child_key.clone());
                let id = record_id(&child_path);
                let Some(child) = records.get(&id) else {
                    continue;
                };
                let kind = child.kind.ok_or_else(|| Error::MalformedRecord {
                    id:      id.to_hex(),
                    message: "non-root record has no kind".into(),
                })?;

                let mut child_elements = elements.clone();
                child_elements.push(PathElement::new(child_key.clone(), kind, child.storage_key));
                self.add_path(&child_elements);
                stack.push((child_path, child_elements, child));
            }
        }

        Ok(())
    }

    /// Renders the tree for diagnostics, one node per line.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(ROOT, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            if index == ROOT {
                out.push_str("<root>\n");
            } else {
                let kind = node.kind.map(|k| k.to_string()).unwrap_or_default();
                let storage_key = node.storage_key.map(|k| k.to_hex()).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "{}{} [{kind}] {storage_key}",
                    "  ".repeat(depth),
                    node.key
                );
            }
            stack.extend(node.children.iter().rev().map(|c| (*c, depth + 1)));
        }

        out
    }
}

impl Default for StorageDictionary {
    fn default() -> Self {
        Self::new()
    }
}

/// A borrowed handle to a single node in a [`StorageDictionary`].
#[derive(Clone, Copy, Debug)]
pub struct NodeRef<'a> {
    dictionary: &'a StorageDictionary,
    index:      usize,
}

impl<'a> NodeRef<'a> {
    fn node(&self) -> &'a Node {
        &self.dictionary.nodes[self.index]
    }

    /// Gets the segment naming this node, which is empty for the root.
    #[must_use]
    pub fn key(&self) -> &'a str {
        &self.node().key
    }

    /// Gets the kind of this node, which is [`None`] for the root.
    #[must_use]
    pub fn kind(&self) -> Option<PathElementKind> {
        self.node().kind
    }

    #[must_use]
    pub fn storage_key(&self) -> Option<Word> {
        self.node().storage_key
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.index == ROOT
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.node().children.is_empty()
    }

    #[must_use]
    pub fn children_count(&self) -> usize {
        self.node().children.len()
    }

    /// Gets the child named `key`.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<NodeRef<'a>> {
        self.node().by_key.get(key).map(|index| NodeRef {
            dictionary: self.dictionary,
            index:      *index,
        })
    }

    /// Iterates over all children in insertion order.
    pub fn children_iter(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let dictionary = self.dictionary;
        self.node()
            .children
            .iter()
            .map(move |index| NodeRef {
                dictionary,
                index: *index,
            })
    }

    /// Gets at most `limit` children, skipping the first `offset`.
    #[must_use]
    pub fn children(&self, offset: usize, limit: usize) -> Vec<NodeRef<'a>> {
        self.children_iter().skip(offset).take(limit).collect()
    }

    /// Gets the segments from the root to this node.
    #[must_use]
    pub fn full_path(&self) -> Vec<String> {
        self.dictionary.path_of(self.index)
    }

    /// Gets the storage keys of this node and all of its descendants.
    #[must_use]
    pub fn subtree_storage_keys(&self) -> Vec<Word> {
        let mut keys = Vec::new();
        let mut stack = vec![*self];
        while let Some(node) = stack.pop() {
            keys.extend(node.storage_key());
            stack.extend(node.children_iter());
        }

        keys
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::{
        dictionary::{
            element::{PathElement, PathElementKind},
            StorageDictionary,
        },
        word::Word,
    };

    fn mapping_entry(slot: u64, key: &str, storage_key: u64) -> Vec<PathElement> {
        vec![
            PathElement::storage_index(slot.to_string(), Word::from(slot)),
            PathElement::map_key(key, Word::from(storage_key)),
        ]
    }

    #[test]
    fn adding_a_path_twice_is_a_no_op() {
        let mut dictionary = StorageDictionary::new();
        assert!(dictionary.add_path(&mapping_entry(1, "a", 100)));
        let len = dictionary.len();
        assert!(!dictionary.add_path(&mapping_entry(1, "a", 100)));
        assert_eq!(dictionary.len(), len);
    }

    #[test]
    fn siblings_of_another_kind_are_never_merged() {
        let mut dictionary = StorageDictionary::new();
        dictionary.add_path(&[
            PathElement::storage_index("0", Word::ZERO),
            PathElement::map_key("7", Word::from(70u64)),
            PathElement::offset(1, Word::from(71u64)),
        ]);
        let len = dictionary.len();

        let changed = dictionary.add_path(&[
            PathElement::storage_index("0", Word::ZERO),
            PathElement::map_key("7", Word::from(70u64)),
            PathElement::map_key("1", Word::from(90u64)),
            PathElement::offset(0, Word::from(90u64)),
        ]);

        assert!(!changed);
        assert_eq!(dictionary.len(), len);
        let node = dictionary.get_by_path(&["0", "7", "1"]).expect("offset exists");
        assert_eq!(node.kind(), Some(PathElementKind::Offset));
        assert_eq!(node.storage_key(), Some(Word::from(71u64)));
        assert!(!node.has_children());
    }

    #[test]
    fn preserves_sibling_insertion_order() {
        let mut dictionary = StorageDictionary::new();
        for (key, storage_key) in [("c", 3), ("a", 1), ("b", 2)] {
            dictionary.add_path(&mapping_entry(1, key, storage_key));
        }

        let node = dictionary.get_by_path(&["1"]).expect("mapping node exists");
        let keys: Vec<_> = node.children(0, 10).iter().map(|c| c.key()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(node.children(1, 1)[0].key(), "a");
    }

    #[test]
    fn missing_paths_resolve_to_none() {
        let mut dictionary = StorageDictionary::new();
        dictionary.add_path(&mapping_entry(1, "a", 100));

        assert!(dictionary.get_by_path(&["1", "b"]).is_none());
        assert!(dictionary.get_by_path(&["2"]).is_none());
        assert!(dictionary.get_by_path::<&str>(&[]).is_some());
    }

    #[test]
    fn filtering_keeps_ancestors_and_is_idempotent() {
        let mut dictionary = StorageDictionary::new();
        dictionary.add_path(&mapping_entry(1, "a", 100));
        dictionary.add_path(&mapping_entry(1, "b", 200));
        dictionary.add_path(&mapping_entry(1, "c", 300));
        dictionary.add_path(&[PathElement::storage_index("2", Word::from(2u64))]);

        let keys: HashSet<_> = [Word::from(300u64), Word::from(100u64)].into();
        let once = dictionary.get_filtered(&keys);
        let twice = once.get_filtered(&keys);

        let node = once.get_by_path(&["1"]).expect("ancestor is kept");
        let children: Vec<_> = node.children(0, 10).iter().map(|c| c.key()).collect();
        assert_eq!(children, vec!["a", "c"]);
        assert!(once.get_by_path(&["2"]).is_none());
        assert_eq!(once.dump(), twice.dump());
    }

    #[test]
    fn export_and_import_transplant_a_subtree() -> anyhow::Result<()> {
        let mut source = StorageDictionary::new();
        source.add_path(&mapping_entry(1, "a", 100));
        source.add_path(&mapping_entry(1, "b", 200));
        source.add_path(&mapping_entry(3, "z", 900));

        let exported = source.export(&["1"])?;
        let mut target = StorageDictionary::new();
        target.import(&exported)?;

        let node = target.get_by_path(&["1", "b"]).expect("imported");
        assert_eq!(node.storage_key(), Some(Word::from(200u64)));
        assert!(target.get_by_path(&["3"]).is_none());
        assert!(source.export(&["9"])?.is_empty());

        Ok(())
    }

    #[test]
    fn dumps_one_node_per_line() {
        let mut dictionary = StorageDictionary::new();
        dictionary.add_path(&mapping_entry(1, "a", 100));

        let dump = dictionary.dump();
        assert_eq!(dump.lines().count(), 3);
        assert!(dump.contains("  a [mapKey]"));
    }
}
