//! This module contains the recording of hash provenance during contract
//! execution, and its resolution into the dictionaries.
//!
//! # Usage
//!
//! The execution engine drives an [`ExecutionTracer`] through its hooks. A
//! [`Recorder`] is pushed for every (possibly nested) call and popped when the
//! call ends, at which point every key written during the call is resolved and
//! merged into the dictionaries of the called contract.
//!
//! ```
//! use storage_dictionary::{
//!     dictionary::db::DictionaryDb,
//!     recorder::{Config, ExecutionTracer},
//!     word::Word,
//! };
//!
//! let db = DictionaryDb::in_memory();
//! let mut tracer = ExecutionTracer::new(db, Config::default());
//! tracer.on_call_start([0x11; 20]);
//! tracer.on_storage_write(Word::from(0u64), Word::from(1u64));
//! tracer.on_call_end();
//! assert!(tracer.failures().is_empty());
//! ```
//!
//! # Failures
//!
//! None of the hooks ever fail. Instrumentation must not be able to halt the
//! execution it observes, so internal errors are logged and collected in
//! [`ExecutionTracer::failures`] instead.

pub mod hashes;
pub mod origin;

use std::{collections::BTreeMap, fmt::Write};

use tracing::{debug, error, trace};

use crate::{
    constant::{DEFAULT_RECORD_SERPENT, DEFAULT_RECORD_SOLIDITY},
    dictionary::{
        db::{DictionaryDb, Layout},
        element::PathElement,
    },
    error::{Error, Result},
    recorder::{
        hashes::{precomputed, HashEntry, HashTable},
        origin::Resolver,
    },
    utility::keccak256,
    word::{Address, Word},
};

/// The configuration for recording.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Whether keys are resolved and recorded under the Solidity convention.
    ///
    /// Defaults to [`DEFAULT_RECORD_SOLIDITY`].
    pub record_solidity: bool,

    /// Whether keys are resolved and recorded under the Serpent convention.
    ///
    /// Defaults to [`DEFAULT_RECORD_SERPENT`].
    pub record_serpent: bool,
}

impl Config {
    /// Sets the `record_solidity` config parameter to `value`.
    #[must_use]
    pub fn with_record_solidity(mut self, value: bool) -> Self {
        self.record_solidity = value;
        self
    }

    /// Sets the `record_serpent` config parameter to `value`.
    #[must_use]
    pub fn with_record_serpent(mut self, value: bool) -> Self {
        self.record_serpent = value;
        self
    }

    /// Gets the layouts that are recorded.
    #[must_use]
    pub fn layouts(&self) -> Vec<Layout> {
        let mut layouts = Vec::new();
        if self.record_solidity {
            layouts.push(Layout::Solidity);
        }
        if self.record_serpent {
            layouts.push(Layout::Serpent);
        }

        layouts
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            record_solidity: DEFAULT_RECORD_SOLIDITY,
            record_serpent:  DEFAULT_RECORD_SERPENT,
        }
    }
}

/// The provenance recorded for a single call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Recorder {
    owner:  Address,
    hashes: HashTable,
    writes: BTreeMap<Word, Word>,
}

impl Recorder {
    /// Constructs a recorder for a call into the contract at `owner`.
    #[must_use]
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            hashes: HashTable::new(),
            writes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> &Address {
        &self.owner
    }

    /// Records that `keccak(preimage) = digest`.
    pub fn on_hash(&mut self, preimage: &[u8], digest: Word) {
        self.hashes.insert(HashEntry::new(digest, preimage.to_vec()));
    }

    /// Records a write of `value` to the slot at `key`.
    pub fn on_storage_write(&mut self, key: Word, value: Word) {
        self.writes.insert(key, value);
    }

    /// Gets the keys written during the call, in ascending order.
    pub fn written_keys(&self) -> impl Iterator<Item = &Word> {
        self.writes.keys()
    }

    /// Gets a resolver over the hashes observed during the call.
    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.hashes, precomputed())
    }

    /// Resolves `key` under `layout`.
    #[must_use]
    pub fn resolve(&self, layout: Layout, key: &Word) -> Vec<PathElement> {
        match layout {
            Layout::Solidity => self.resolver().solidity(key),
            Layout::Serpent => self.resolver().serpent(key),
        }
    }

    /// Resolves every written key under each layout in `config`, merges the
    /// results into the owner's dictionaries, and persists them.
    ///
    /// Each layout is recorded independently, so a failure for one does not
    /// prevent the others from being recorded. Returns the failures, which
    /// are empty on success.
    #[must_use]
    pub fn commit(&self, db: &DictionaryDb, config: &Config) -> Vec<Error> {
        let mut failures = config
            .layouts()
            .into_iter()
            .filter_map(|layout| self.commit_layout(db, layout).err())
            .collect::<Vec<_>>();
        if let Err(err) = db.flush() {
            failures.push(err.into());
        }

        debug!(
            owner = %hex::encode(self.owner),
            writes = self.writes.len(),
            hashes = self.hashes.len(),
            failures = failures.len(),
            "Committed recorded provenance"
        );

        failures
    }

    fn commit_layout(&self, db: &DictionaryDb, layout: Layout) -> Result<()> {
        let mut dictionary = db.dictionary(layout, &self.owner)?;
        for key in self.writes.keys() {
            let path = self.resolve(layout, key);
            trace!(%layout, %key, ?path, "Resolved storage key");
            dictionary.add_path(&path);
        }
        dictionary.store()?;

        Ok(())
    }

    /// Renders the observed hashes and writes for diagnostics.
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = String::from("Hashes:\n");
        for entry in self.hashes.iter() {
            let _ = writeln!(out, "{entry}");
        }
        out.push_str("Writes:\n");
        for (key, value) in &self.writes {
            let _ = writeln!(out, "{key} = {value}");
        }

        out
    }
}

/// The instrumentation for a single execution, owning the stack of recorders
/// for its nested calls.
#[derive(Debug)]
pub struct ExecutionTracer {
    db:       DictionaryDb,
    config:   Config,
    stack:    Vec<Recorder>,
    failures: Vec<Error>,
}

impl ExecutionTracer {
    /// Constructs a tracer that records into `db`.
    #[must_use]
    pub fn new(db: DictionaryDb, config: Config) -> Self {
        Self {
            db,
            config,
            stack: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Notifies the tracer that a call into `owner` has started.
    pub fn on_call_start(&mut self, owner: Address) {
        trace!(owner = %hex::encode(owner), depth = self.stack.len(), "Call started");
        self.stack.push(Recorder::new(owner));
    }

    /// Notifies the tracer that `keccak(preimage) = digest` was computed by
    /// the innermost call.
    pub fn on_hash(&mut self, preimage: &[u8], digest: Word) {
        match self.stack.last_mut() {
            Some(recorder) => recorder.on_hash(preimage, digest),
            None => self.capture(Err(Error::other("hash observed outside of any call"))),
        }
    }

    /// Computes the hash of `preimage` on behalf of the innermost call,
    /// recording it and returning the digest.
    pub fn on_hash_input(&mut self, preimage: &[u8]) -> Word {
        let digest = keccak256(preimage);
        self.on_hash(preimage, digest);
        digest
    }

    /// Notifies the tracer that the innermost call wrote `value` to `key`.
    pub fn on_storage_write(&mut self, key: Word, value: Word) {
        match self.stack.last_mut() {
            Some(recorder) => recorder.on_storage_write(key, value),
            None => self.capture(Err(Error::other("storage write outside of any call"))),
        }
    }

    /// Notifies the tracer that the innermost call has ended, committing its
    /// recorded provenance.
    pub fn on_call_end(&mut self) {
        let Some(recorder) = self.stack.pop() else {
            self.capture(Err(Error::other("call ended without a matching start")));
            return;
        };

        let failures = recorder.commit(&self.db, &self.config);
        if !failures.is_empty() {
            debug!(dump = %recorder.dump(), "Recorder state at failure");
        }
        for err in failures {
            self.capture(Err(err));
        }
    }

    /// Gets the number of calls currently in progress.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Gets the innermost call's recorder, if any call is in progress.
    #[must_use]
    pub fn current(&self) -> Option<&Recorder> {
        self.stack.last()
    }

    /// Gets the errors swallowed so far.
    #[must_use]
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    fn capture(&mut self, result: Result<()>) {
        if let Err(err) = result {
            error!(%err, "Storage dictionary recording failed");
            self.failures.push(err);
        }
    }
}
