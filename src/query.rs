//! This module contains the query entry points, which compose the schema, the
//! dictionaries and raw storage into pages of entries.
//!
//! # Scoping
//!
//! Every dictionary-backed query first filters the contract's dictionary down
//! to the keys present in raw storage for the owner being queried. For a
//! contract this is its whole storage, while for a transaction it is only the
//! slots that the transaction touched, which is what makes a diff.
//!
//! # Failures
//!
//! Failures while building a page indicate a defect in the layout or the
//! recorded dictionary. They are logged together with everything needed to
//! reproduce them, and then returned to the caller.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, error};

use crate::{
    constant::{DEFAULT_FILL_MISSING_KEYS, DEFAULT_MAXIMUM_PAGE_SIZE},
    dictionary::{
        db::{DictionaryDb, Layout},
        element::PathElement,
        path::Path,
        StorageDictionary,
    },
    entry::{StorageEntry, StoragePage},
    error::Result,
    layout::ContractLayout,
    storage::{dump_storage, StorageReader},
    utility::page_range,
    view::{location::Location, StorageView},
    word::Word,
};

/// The configuration for queries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// The layout convention whose dictionaries are queried.
    ///
    /// Defaults to [`Layout::Solidity`].
    pub layout: Layout,

    /// Whether typed queries synthesize entries for top-level members that
    /// were never written.
    ///
    /// Defaults to [`DEFAULT_FILL_MISSING_KEYS`].
    pub fill_missing_keys: bool,

    /// The upper bound on the number of entries in a single page. Larger
    /// requested page sizes are clamped to it.
    ///
    /// Defaults to [`DEFAULT_MAXIMUM_PAGE_SIZE`].
    pub maximum_page_size: usize,
}

impl Config {
    /// Sets the `layout` config parameter to `value`.
    #[must_use]
    pub fn with_layout(mut self, value: Layout) -> Self {
        self.layout = value;
        self
    }

    /// Sets the `fill_missing_keys` config parameter to `value`.
    #[must_use]
    pub fn with_fill_missing_keys(mut self, value: bool) -> Self {
        self.fill_missing_keys = value;
        self
    }

    /// Sets the `maximum_page_size` config parameter to `value`.
    #[must_use]
    pub fn with_maximum_page_size(mut self, value: usize) -> Self {
        self.maximum_page_size = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout:            Layout::Solidity,
            fill_missing_keys: DEFAULT_FILL_MISSING_KEYS,
            maximum_page_size: DEFAULT_MAXIMUM_PAGE_SIZE,
        }
    }
}

/// The context of a failed page, logged for diagnosis.
struct Diagnostic<'a> {
    title:   &'a str,
    address: &'a [u8],
    tx_hash: Option<&'a [u8]>,
    path:    &'a Path,
    schema:  Option<&'a str>,
}

/// The service answering storage queries over one dictionary database and one
/// raw storage.
///
/// All queries are read-only apart from [`Self::import_dictionary`], and can
/// be issued concurrently.
#[derive(Debug)]
pub struct QueryService<S> {
    db:      DictionaryDb,
    storage: S,
    config:  Config,
}

impl<S: StorageReader> QueryService<S> {
    #[must_use]
    pub fn new(db: DictionaryDb, storage: S, config: Config) -> Self {
        Self {
            db,
            storage,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Lists the raw slots of the contract at `address`, ordered by key.
    ///
    /// # Errors
    ///
    /// This never fails, but returns a [`Result`] for uniformity with the
    /// other queries.
    pub fn storage_entries(
        &self,
        address: &[u8],
        page: usize,
        size: usize,
    ) -> Result<StoragePage<StorageEntry>> {
        let size = self.clamp(size);
        let keys = self.storage.keys(address).into_iter().collect::<Vec<_>>();
        let total = keys.len();
        let keys = &keys[page_range(page, size, total)];
        let values = self.storage.entries(address, keys);

        let entries = keys
            .iter()
            .filter_map(|k| values.get(k).map(|v| StorageEntry::raw(k, v)))
            .collect();

        Ok(StoragePage::new(entries, page, size, total))
    }

    /// Lists the children of the dictionary node at `path` for the contract at
    /// `address`, guessing the types of their values.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the dictionary cannot be loaded.
    pub fn structured_storage_entries(
        &self,
        address: &[u8],
        path: &Path,
        page: usize,
        size: usize,
    ) -> Result<StoragePage<StorageEntry>> {
        self.structured_page(address, address, path, page, size)
    }

    /// Lists the children of the dictionary node at `path` for the contract at
    /// `address`, restricted to the slots touched by the transaction
    /// `tx_hash` and valued as that transaction left them.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the dictionary cannot be loaded.
    pub fn structured_storage_diff_entries(
        &self,
        tx_hash: &[u8],
        address: &[u8],
        path: &Path,
        page: usize,
        size: usize,
    ) -> Result<StoragePage<StorageEntry>> {
        self.structured_page(tx_hash, address, path, page, size)
    }

    /// Lists the decoded children of the element at `path` in the contract at
    /// `address`, whose storage is declared by the JSON `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the schema is invalid, if the dictionary cannot be
    /// loaded, or if the page cannot be built.
    pub fn contract_data(
        &self,
        address: &[u8],
        schema: &str,
        path: &Path,
        page: usize,
        size: usize,
    ) -> Result<StoragePage<StorageEntry>> {
        let layout = ContractLayout::from_json(schema)?;
        let mut dictionary = self.scoped_dictionary(address, address)?;
        if self.config.fill_missing_keys {
            fill_missing_keys(&layout, &mut dictionary);
        }

        let result = self.typed_page(&layout, &dictionary, address, path, page, size, false);
        self.report(result, &dictionary, Diagnostic {
            title: "Contract data",
            address,
            tx_hash: None,
            path,
            schema: Some(schema),
        })
    }

    /// Lists the decoded children of the element at `path` in the contract at
    /// `address` that were touched by the transaction `tx_hash`, valued as
    /// that transaction left them.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the schema is invalid, if the dictionary cannot be
    /// loaded, or if the page cannot be built.
    pub fn contract_data_diff(
        &self,
        tx_hash: &[u8],
        address: &[u8],
        schema: &str,
        path: &Path,
        page: usize,
        size: usize,
    ) -> Result<StoragePage<StorageEntry>> {
        let layout = ContractLayout::from_json(schema)?;
        let dictionary = self.scoped_dictionary(tx_hash, address)?;

        let result = self.typed_page(&layout, &dictionary, tx_hash, path, page, size, true);
        self.report(result, &dictionary, Diagnostic {
            title: "Contract data diff",
            address,
            tx_hash: Some(tx_hash),
            path,
            schema: Some(schema),
        })
    }

    /// Exports the subtree at `path` of the dictionary for the contract at
    /// `address`, as a flat map from hex record id to hex record.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the dictionary cannot be loaded or serialized.
    pub fn export_dictionary(&self, address: &[u8], path: &Path) -> Result<BTreeMap<String, String>> {
        let dictionary = self.db.dictionary(self.config.layout, address)?;
        Ok(dictionary.export(path.segments())?)
    }

    /// Merges an exported map into the dictionary for the contract at
    /// `address`, and makes it durable.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the map is malformed or the store fails.
    pub fn import_dictionary(&self, address: &[u8], entries: &BTreeMap<String, String>) -> Result<()> {
        let mut dictionary = self.db.dictionary(self.config.layout, address)?;
        dictionary.import(entries)?;
        dictionary.store()?;
        self.db.flush()?;

        debug!(
            address = %hex::encode(address),
            records = entries.len(),
            "Imported dictionary"
        );

        Ok(())
    }

    /// Loads the dictionary for the contract at `address`, filtered to the
    /// keys present in raw storage for `owner`.
    fn scoped_dictionary(&self, owner: &[u8], address: &[u8]) -> Result<StorageDictionary> {
        let dictionary = self.db.dictionary(self.config.layout, address)?;
        let keys = self.storage.keys(owner).into_iter().collect::<HashSet<_>>();

        Ok(dictionary.get_filtered(&keys))
    }

    fn structured_page(
        &self,
        owner: &[u8],
        address: &[u8],
        path: &Path,
        page: usize,
        size: usize,
    ) -> Result<StoragePage<StorageEntry>> {
        let size = self.clamp(size);
        let dictionary = self.scoped_dictionary(owner, address)?;
        let Some(node) = dictionary.get_by_path(path.segments()) else {
            return Ok(StoragePage::empty(page, size));
        };

        let entries = node
            .children(page.saturating_mul(size), size)
            .iter()
            .map(|child| {
                let value = child.storage_key().and_then(|k| self.storage.get(owner, &k));
                StorageEntry::structured(child, value)
            })
            .collect();

        Ok(StoragePage::new(entries, page, size, node.children_count()))
    }

    #[allow(clippy::too_many_arguments)]
    fn typed_page(
        &self,
        layout: &ContractLayout,
        dictionary: &StorageDictionary,
        owner: &[u8],
        path: &Path,
        page: usize,
        size: usize,
        ignore_empty: bool,
    ) -> Result<StoragePage<StorageEntry>> {
        let size = self.clamp(size);
        let view = StorageView::new(layout, dictionary, |key| self.storage.get(owner, key));

        let element = view.element_by_path(path)?;
        let (children, total) = view.children(&element, page, size, ignore_empty)?;
        let entries = children
            .iter()
            .map(|child| view.entry(child))
            .collect::<Result<Vec<_>>>()?;

        Ok(StoragePage::new(entries, page, size, total))
    }

    /// Logs everything needed to diagnose a failed page before passing the
    /// `result` on.
    fn report<T>(
        &self,
        result: Result<T>,
        dictionary: &StorageDictionary,
        context: Diagnostic<'_>,
    ) -> Result<T> {
        if let Err(err) = &result {
            let owner = context.tx_hash.unwrap_or(context.address);
            error!(
                %err,
                title = context.title,
                address = %hex::encode(context.address),
                tx_hash = %context.tx_hash.map(hex::encode).unwrap_or_default(),
                path = %context.path,
                schema = context.schema.unwrap_or_default(),
                dictionary = %dictionary.dump(),
                storage = %dump_storage(&self.storage, owner),
                "Failed to build storage page"
            );
        }

        result
    }

    fn clamp(&self, size: usize) -> usize {
        size.min(self.config.maximum_page_size)
    }
}

/// Adds a top-level slot to `dictionary` for every slot reserved by a member
/// of `layout` that the dictionary has never seen.
///
/// Members whose values were never written are otherwise invisible to the
/// dictionary, and would be missing from views that walk it. Every slot a
/// member spans is filled, so the elements of a static array and the fields
/// of a struct are all listed.
pub fn fill_missing_keys(layout: &ContractLayout, dictionary: &mut StorageDictionary) {
    let mut added = 0usize;
    for member in layout.members().all() {
        let start = member.storage_index;
        let end = start.saturating_add(member.reserved_slots);
        for slot in start..end {
            let path = Location::root(slot).dictionary_path();
            if dictionary.get_by_path(&path).is_none() {
                let element = PathElement::storage_index(slot.to_string(), Word::from(slot));
                dictionary.add_path(&[element]);
                added += 1;
            }
        }
    }

    if added > 0 {
        debug!(added, "Filled missing top-level keys");
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::{
        dictionary::{db::DictionaryDb, element::PathElement, path::Path, StorageDictionary},
        layout::ContractLayout,
        query::{fill_missing_keys, Config, QueryService},
        storage::InMemoryStorage,
        word::Word,
    };

    const ADDRESS: [u8; 20] = [0x11; 20];

    #[test]
    fn fills_one_key_per_unseen_start_slot() -> anyhow::Result<()> {
        let document = json!({ "variables": [
            { "name": "a", "type": "bool" },
            { "name": "b", "type": "bool" },
            { "name": "c", "type": "uint256" }
        ]});
        let layout = ContractLayout::from_json(&document.to_string())?;
        let mut dictionary = StorageDictionary::new();
        dictionary.add_path(&[PathElement::storage_index("1", Word::from(1u64))]);

        fill_missing_keys(&layout, &mut dictionary);
        assert!(dictionary.get_by_path(&["0"]).is_some());
        assert_eq!(dictionary.root().children_count(), 2);

        Ok(())
    }

    #[test]
    fn fills_every_slot_a_member_spans() -> anyhow::Result<()> {
        let document = json!({
            "variables": [
                { "name": "pair", "type": "struct:Pair" },
                { "name": "values", "type": "array<uint256>[3]" },
                { "name": "table", "type": "mapping<uint256,uint256>" }
            ],
            "structs": [{ "name": "Pair", "fields": [
                { "name": "left", "type": "uint256" },
                { "name": "right", "type": "uint256" }
            ]}]
        });
        let layout = ContractLayout::from_json(&document.to_string())?;
        let mut dictionary = StorageDictionary::new();

        fill_missing_keys(&layout, &mut dictionary);
        let slots: Vec<_> = dictionary.root().children_iter().map(|c| c.key()).collect();
        assert_eq!(slots, vec!["0", "1", "2", "3", "4", "5"]);

        Ok(())
    }

    #[test]
    fn clamps_page_sizes() -> anyhow::Result<()> {
        let storage = InMemoryStorage::new();
        for slot in 0..5u64 {
            storage.set(&ADDRESS, Word::from(slot), Word::from(slot + 1));
        }
        let config = Config::default().with_maximum_page_size(2);
        let service = QueryService::new(DictionaryDb::in_memory(), storage, config);

        let page = service.storage_entries(&ADDRESS, 2, 100)?;
        assert_eq!(page.page_size, 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].key.name, Word::from(4u64).to_hex());

        Ok(())
    }

    #[test]
    fn missing_dictionary_paths_are_empty_pages() -> anyhow::Result<()> {
        let service =
            QueryService::new(DictionaryDb::in_memory(), InMemoryStorage::new(), Config::default());

        let page = service.structured_storage_entries(&ADDRESS, &Path::parse("4|x"), 0, 10)?;
        assert!(page.entries.is_empty());
        assert_eq!(page.total, 0);

        Ok(())
    }

    #[test]
    fn invalid_paths_surface_as_errors() {
        let document = json!({ "variables": [{ "name": "a", "type": "uint256" }] });
        let service =
            QueryService::new(DictionaryDb::in_memory(), InMemoryStorage::new(), Config::default());

        let result = service.contract_data(&ADDRESS, &document.to_string(), &Path::parse("0|0"), 0, 10);
        assert!(result.is_err());
    }
}
