//! This library reconstructs a structured, typed view of the storage of an
//! [EVM](https://ethereum.org/en/developers/docs/evm/) contract. Storage is
//! physically a flat mapping from 256-bit keys to 256-bit words, and this
//! library presents it as named fields, array elements, and mapping entries.
//!
//! The locations of dynamic values are derived by hashing, which cannot be
//! reversed. The library instead records the hashes computed while contracts
//! execute, and uses them to trace each written key back to the path that
//! produced it. This is a _best effort_ process, as only keys written while
//! recording was active can ever be resolved.
//!
//! # How it Works
//!
//! 1. While a contract executes, an [`recorder::ExecutionTracer`] observes
//!    every hash and every storage write. When each call ends, every key it
//!    wrote is resolved into a path and merged into the
//!    [`dictionary::StorageDictionary`] of the called contract.
//! 2. A [`schema::TypeSchema`] describing the declared storage of the contract
//!    is turned into a [`layout::ContractLayout`], which places every declared
//!    variable at its slot.
//! 3. A [`view::StorageView`] combines the layout, the dictionary, and the raw
//!    storage into a tree of typed elements that can be paged through.
//! 4. The [`query::QueryService`] composes all of the above into raw,
//!    dictionary-only, and typed queries, each of which returns a
//!    [`entry::StoragePage`].
//!
//! # Basic Usage
//!
//! ```
//! use storage_dictionary::{
//!     dictionary::{db::DictionaryDb, path::Path},
//!     query::{self, QueryService},
//!     recorder::{self, ExecutionTracer},
//!     storage::InMemoryStorage,
//!     word::Word,
//! };
//!
//! let address = [0x11; 20];
//! let db = DictionaryDb::in_memory();
//! let storage = InMemoryStorage::new();
//!
//! // Record a call that sets `count` to 42.
//! let mut tracer = ExecutionTracer::new(db.clone(), recorder::Config::default());
//! tracer.on_call_start(address);
//! tracer.on_storage_write(Word::from(1u64), Word::from(42u64));
//! storage.set(&address, Word::from(1u64), Word::from(42u64));
//! tracer.on_call_end();
//!
//! let schema = r#"{ "name": "Counter", "variables": [
//!     { "name": "paused", "type": "bool" },
//!     { "name": "count", "type": "uint256" }
//! ]}"#;
//! let service = QueryService::new(db, storage, query::Config::default());
//! let page = service
//!     .contract_data(&address, schema, &Path::root(), 0, 10)
//!     .unwrap();
//!
//! assert_eq!(page.total, 2);
//! assert_eq!(page.entries[0].value.value.as_deref(), Some("false"));
//! assert_eq!(page.entries[1].value.value.as_deref(), Some("42"));
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod constant;
pub mod dictionary;
pub mod entry;
pub mod error;
pub mod layout;
pub mod query;
pub mod recorder;
pub mod schema;
pub mod storage;
pub mod utility;
pub mod view;
pub mod word;

// Re-exports to provide the library interface.
pub use dictionary::StorageDictionary;
pub use entry::{StorageEntry, StoragePage};
pub use layout::ContractLayout;
pub use query::QueryService;
pub use view::StorageView;
pub use word::Word;
