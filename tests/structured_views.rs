//! Tests for the raw and dictionary-only views, and for the diffs scoped to a
//! single transaction.

mod common;

use serde_json::json;
use storage_dictionary::{
    dictionary::{db::Layout, path::Path},
    query,
    word::Word,
};

use crate::common::{address_word, names, values, Chain, CONTRACT};

#[test]
fn mapping_entries_carry_their_hashed_slot() -> anyhow::Result<()> {
    let holder = [0x5a; 20];
    let chain = Chain::new();
    let mut tx = chain.transact(1, CONTRACT);
    let slot = tx.mapping_slot(address_word(&holder).as_bytes(), Word::from(0u64));
    tx.store(slot, Word::from(4_200u64));
    assert!(tx.finish().is_empty());

    let page = chain
        .service()
        .structured_storage_entries(&CONTRACT, &Path::parse("0"), 0, 10)?;

    assert_eq!(page.total, 1);
    let entry = &page.entries[0];
    assert_eq!(entry.key.raw, Some(slot.to_hex()));
    assert_eq!(entry.key.kind, "mapKey");
    assert_eq!(entry.key.name, address_word(&holder).to_hex());
    assert_eq!(entry.value.type_name, "number");
    assert_eq!(entry.value.value.as_deref(), Some("4200"));

    let root = chain
        .service()
        .structured_storage_entries(&CONTRACT, &Path::root(), 0, 10)?;
    assert_eq!(root.entries[0].value.type_name, "map");
    assert_eq!(root.entries[0].value.value, None);

    Ok(())
}

#[test]
fn pages_concatenate_to_the_full_listing() -> anyhow::Result<()> {
    let chain = Chain::new();
    let mut tx = chain.transact(1, CONTRACT);
    for key in 0..7u64 {
        let slot = tx.mapping_slot(Word::from(key + 100).as_bytes(), Word::from(3u64));
        tx.store(slot, Word::from(key));
    }
    assert!(tx.finish().is_empty());
    let service = chain.service();
    let path = Path::parse("3");

    let full = service.structured_storage_entries(&CONTRACT, &path, 0, 100)?;
    assert_eq!(full.total, 7);

    let mut paged = Vec::new();
    for page in 0..3 {
        let page = service.structured_storage_entries(&CONTRACT, &path, page, 3)?;
        assert_eq!(page.total, 7);
        paged.extend(page.entries);
    }
    assert_eq!(paged, full.entries);

    let past_the_end = service.structured_storage_entries(&CONTRACT, &path, 3, 3)?;
    assert!(past_the_end.entries.is_empty());

    let schema = json!({ "variables": [
        { "name": "a", "type": "uint256" },
        { "name": "b", "type": "uint256" },
        { "name": "c", "type": "uint256" },
        { "name": "table", "type": "mapping<uint256,uint256>" }
    ]})
    .to_string();
    let typed = service.contract_data(&CONTRACT, &schema, &path, 0, 100)?;
    let mut typed_paged = Vec::new();
    for page in 0..3 {
        typed_paged.extend(service.contract_data(&CONTRACT, &schema, &path, page, 3)?.entries);
    }
    assert_eq!(typed_paged, typed.entries);

    let mut keys = names(&typed);
    keys.sort();
    assert_eq!(keys, (100..107).map(|k: u64| k.to_string()).collect::<Vec<_>>());

    Ok(())
}

#[test]
fn raw_entries_are_sorted_by_key() -> anyhow::Result<()> {
    let chain = Chain::new();
    let mut tx = chain.transact(1, CONTRACT);
    tx.store(Word::from(9u64), Word::from(1u64));
    tx.store(Word::from(2u64), Word::from(2u64));
    tx.store(Word::from(5u64), Word::from(3u64));
    assert!(tx.finish().is_empty());

    let page = chain.service().storage_entries(&CONTRACT, 0, 2)?;

    assert_eq!(page.total, 3);
    assert_eq!(
        names(&page),
        vec![Word::from(2u64).to_hex(), Word::from(5u64).to_hex()]
    );
    assert_eq!(
        values(&page),
        vec![Word::from(2u64).to_hex(), Word::from(3u64).to_hex()]
    );

    Ok(())
}

#[test]
fn diffs_only_show_what_a_transaction_touched() -> anyhow::Result<()> {
    let schema = json!({ "name": "Token", "variables": [
        { "name": "balances", "type": "mapping<uint256,uint256>" },
        { "name": "supply", "type": "uint256" }
    ]})
    .to_string();
    let chain = Chain::new();

    let mut mint = chain.transact(1, CONTRACT);
    let first = mint.mapping_slot(Word::from(1u64).as_bytes(), Word::from(0u64));
    mint.store(first, Word::from(50u64));
    mint.store(Word::from(1u64), Word::from(50u64));
    assert!(mint.finish().is_empty());

    let mut transfer = chain.transact(2, CONTRACT);
    let second = transfer.mapping_slot(Word::from(2u64).as_bytes(), Word::from(0u64));
    transfer.store(second, Word::from(20u64));
    assert!(transfer.finish().is_empty());

    let service = chain.service();
    let tx_hash = Word::from(2u64);

    let diff = service.contract_data_diff(tx_hash.as_bytes(), &CONTRACT, &schema, &Path::root(), 0, 10)?;
    assert_eq!(diff.total, 1);
    assert_eq!(names(&diff), vec!["balances"]);

    let balances =
        service.contract_data_diff(tx_hash.as_bytes(), &CONTRACT, &schema, &Path::parse("0"), 0, 10)?;
    assert_eq!(names(&balances), vec!["2"]);
    assert_eq!(values(&balances), vec!["20"]);

    let structured = service.structured_storage_diff_entries(
        tx_hash.as_bytes(),
        &CONTRACT,
        &Path::parse("0"),
        0,
        10,
    )?;
    assert_eq!(structured.total, 1);
    assert_eq!(structured.entries[0].key.name, "2");

    let full = service.contract_data(&CONTRACT, &schema, &Path::parse("0"), 0, 10)?;
    assert_eq!(names(&full), vec!["1", "2"]);

    Ok(())
}

#[test]
fn serpent_dictionaries_are_queried_on_request() -> anyhow::Result<()> {
    let chain = Chain::new();
    let mut tx = chain.transact(1, CONTRACT);
    let mut preimage = Word::from(4u64).as_bytes().to_vec();
    preimage.extend_from_slice(Word::from(8u64).as_bytes());
    let slot = tx.hash(&preimage);
    tx.store(slot, Word::from(1u64));
    assert!(tx.finish().is_empty());

    let config = query::Config::default().with_layout(Layout::Serpent);
    let service = chain.service_with(config);

    let page = service.structured_storage_entries(&CONTRACT, &Path::parse("4"), 0, 10)?;
    assert_eq!(names(&page), vec!["8"]);
    assert_eq!(values(&page), vec!["1"]);

    let solidity = chain
        .service()
        .structured_storage_entries(&CONTRACT, &Path::root(), 0, 10)?;
    assert_eq!(names(&solidity), vec!["8"]);

    Ok(())
}
