//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.
//!
//! The [`Execution`] type stands in for an execution engine. It drives an
//! [`ExecutionTracer`] through the same hooks that an instrumented engine
//! would, while applying every write to an [`InMemoryStorage`] both for the
//! contract being called and for the transaction as a whole.

#![cfg(test)]
#![allow(unused)] // Not every test uses every helper

use std::sync::Arc;

use ethnum::U256;
use storage_dictionary::{
    dictionary::db::DictionaryDb,
    error::Error,
    query::{self, QueryService},
    recorder::{self, ExecutionTracer},
    storage::InMemoryStorage,
    utility::keccak256,
    word::{Address, Word},
    StorageEntry,
    StoragePage,
};

/// The address of the contract used by most tests.
pub const CONTRACT: Address = [0x11; 20];

/// The address of a second contract, for tests involving more than one.
pub const OTHER_CONTRACT: Address = [0x22; 20];

/// A dictionary database and raw storage shared by a sequence of executions
/// and the queries over their results.
#[derive(Clone, Debug)]
pub struct Chain {
    pub db:      DictionaryDb,
    pub storage: Arc<InMemoryStorage>,
}

impl Chain {
    pub fn new() -> Self {
        Self {
            db:      DictionaryDb::in_memory(),
            storage: Arc::new(InMemoryStorage::new()),
        }
    }

    /// Starts a transaction with the hash `tx_hash`, whose outermost call is
    /// into the contract at `address`.
    pub fn transact(&self, tx_hash: u64, address: Address) -> Execution {
        let mut execution = Execution {
            tracer:  ExecutionTracer::new(self.db.clone(), recorder::Config::default()),
            storage: self.storage.clone(),
            tx_hash: Word::from(tx_hash),
            callees: Vec::new(),
        };
        execution.call(address);
        execution
    }

    /// Constructs a query service over the chain with the default
    /// configuration.
    pub fn service(&self) -> QueryService<Arc<InMemoryStorage>> {
        self.service_with(query::Config::default())
    }

    pub fn service_with(&self, config: query::Config) -> QueryService<Arc<InMemoryStorage>> {
        QueryService::new(self.db.clone(), self.storage.clone(), config)
    }
}

/// A single transaction in progress.
#[derive(Debug)]
pub struct Execution {
    tracer:  ExecutionTracer,
    storage: Arc<InMemoryStorage>,
    tx_hash: Word,
    callees: Vec<Address>,
}

impl Execution {
    /// Enters a nested call into the contract at `address`.
    pub fn call(&mut self, address: Address) -> &mut Self {
        self.tracer.on_call_start(address);
        self.callees.push(address);
        self
    }

    /// Returns from the innermost call.
    pub fn end(&mut self) -> &mut Self {
        self.tracer.on_call_end();
        self.callees.pop();
        self
    }

    /// Hashes `preimage` as the engine would, recording it.
    pub fn hash(&mut self, preimage: &[u8]) -> Word {
        self.tracer.on_hash_input(preimage)
    }

    /// Computes the slot of the value under `key` in the mapping whose base
    /// slot is `base`.
    pub fn mapping_slot(&mut self, key: &[u8], base: Word) -> Word {
        let mut preimage = key.to_vec();
        preimage.extend_from_slice(base.as_bytes());
        self.hash(&preimage)
    }

    /// Computes the slot `offset` words into the data of the dynamic array
    /// whose length lives at `base`.
    pub fn array_slot(&mut self, base: Word, offset: u64) -> Word {
        let start = self.hash(base.as_bytes());
        Word::from(start.to_u256() + U256::from(offset))
    }

    /// Computes the same slot as [`Self::array_slot`] without recording the
    /// hash, as the compiler does when it folds the hash of a constant slot.
    pub fn folded_array_slot(&self, base: Word, offset: u64) -> Word {
        Word::from(keccak256(base.as_bytes()).to_u256() + U256::from(offset))
    }

    /// Writes `value` to the slot at `key` of the innermost callee.
    pub fn store(&mut self, key: Word, value: Word) -> &mut Self {
        let Some(address) = self.callees.last() else {
            panic!("store outside of any call");
        };
        self.storage.set(address, key, value);
        self.storage.set(self.tx_hash.as_bytes(), key, value);
        self.tracer.on_storage_write(key, value);
        self
    }

    /// Ends every call still in progress, returning the failures captured
    /// while recording.
    pub fn finish(mut self) -> Vec<Error> {
        while !self.callees.is_empty() {
            self.end();
        }
        self.tracer.failures().to_vec()
    }
}

/// Gets the 32-byte form of `address`, as used for mapping keys.
pub fn address_word(address: &Address) -> Word {
    Word::from_slice(address)
}

/// Gets the values of the entries on a page, in order.
pub fn values(page: &StoragePage<StorageEntry>) -> Vec<String> {
    page.entries
        .iter()
        .map(|e| e.value.value.clone().unwrap_or_default())
        .collect()
}

/// Gets the names of the entries on a page, in order.
pub fn names(page: &StoragePage<StorageEntry>) -> Vec<String> {
    page.entries.iter().map(|e| e.key.name.clone()).collect()
}
