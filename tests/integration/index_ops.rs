#![allow(missing_docs)]

use std::sync::{Arc, Once};

use mvindex::primitives::bytes::{RawCodec, U64Codec, Utf8Codec};
use mvindex::{
    CursorState, IndexError, IndexOptions, MaxCost, MemStore, MemStoreOptions, MultiIndex, Result,
    TxContext,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mvindex=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn string_index(store: &Arc<MemStore>, name: &str) -> MultiIndex<MemStore, String, String> {
    let ns = store.create_namespace(name);
    MultiIndex::new(
        name,
        Arc::clone(store),
        ns,
        Arc::new(Utf8Codec),
        Arc::new(Utf8Codec),
        IndexOptions::default(),
    )
}

fn s(text: &str) -> String {
    text.to_string()
}

#[test]
fn three_entry_scenario() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemStore::new());
    let index = string_index(&store, "scenario");
    let ctx = TxContext::none();
    index.add_entry(&ctx, &s("a"), &s("x"))?;
    index.add_entry(&ctx, &s("a"), &s("y"))?;
    index.add_entry(&ctx, &s("b"), &s("z"))?;

    assert_eq!(index.find(&ctx, &s("a"))?.collect_remaining()?, vec![s("x"), s("y")]);
    assert_eq!(
        index.scan_keys(&ctx)?.collect_remaining()?,
        vec![s("a"), s("a"), s("b")]
    );
    assert_eq!(index.count(&ctx)?, 3);
    assert_eq!(index.count_key(&ctx, &s("a"))?, 2);

    let stats = index.stats(&ctx);
    assert!(stats
        .keys_with_value(s("z"), MaxCost::Unbounded, true)
        .is_none());
    Ok(())
}

#[test]
fn cursor_walks_both_directions() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let index = string_index(&store, "walk");
    let ctx = TxContext::none();
    for value in ["a", "b", "c"] {
        index.add_entry(&ctx, &s("k"), &s(value))?;
    }
    index.add_entry(&ctx, &s("kk"), &s("outside"))?;

    let mut cursor = index.find(&ctx, &s("k"))?;
    assert_eq!(cursor.state(), CursorState::Unopened);
    assert_eq!(cursor.prev()?, Some(s("c")));
    assert_eq!(cursor.prev()?, Some(s("b")));
    assert_eq!(cursor.prev()?, Some(s("a")));
    assert_eq!(cursor.prev()?, None);
    assert_eq!(cursor.state(), CursorState::Exhausted);
    assert_eq!(cursor.next()?, Some(s("a")));
    assert_eq!(cursor.next()?, Some(s("b")));
    assert_eq!(cursor.current()?, s("b"));
    cursor.close();
    assert_eq!(cursor.state(), CursorState::Closed);
    assert!(matches!(cursor.next(), Err(IndexError::InvalidState(_))));
    Ok(())
}

#[test]
fn key_scan_seeks_to_key_group() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let index = string_index(&store, "groups");
    let ctx = TxContext::none();
    for (key, value) in [("apple", "1"), ("banana", "2"), ("banana", "3"), ("cherry", "4")] {
        index.add_entry(&ctx, &s(key), &s(value))?;
    }

    let mut keys = index.scan_keys(&ctx)?;
    assert!(keys.seek(&s("banana"))?);
    assert_eq!(keys.current()?, s("banana"));
    assert_eq!(keys.next()?, Some(s("banana")));
    assert_eq!(keys.next()?, Some(s("cherry")));

    let mut distinct = index.scan_distinct_keys(&ctx)?;
    assert!(!distinct.seek(&s("bzzzzz"))?);
    assert_eq!(distinct.current()?, s("cherry"));
    assert_eq!(distinct.prev()?, Some(s("banana")));
    assert_eq!(distinct.prev()?, Some(s("apple")));
    assert_eq!(distinct.prev()?, None);
    Ok(())
}

#[test]
fn keys_of_different_lengths_never_share_ranges() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let ns = store.create_namespace("raw");
    let index: MultiIndex<MemStore, Vec<u8>, Vec<u8>> = MultiIndex::new(
        "raw",
        Arc::clone(&store),
        ns,
        Arc::new(RawCodec),
        Arc::new(RawCodec),
        IndexOptions::default(),
    );
    let ctx = TxContext::none();
    index.add_entry(&ctx, &vec![0x01], &vec![0x02, 0x03])?;
    index.add_entry(&ctx, &vec![0x01, 0x02], &vec![0x03])?;
    index.add_entry(&ctx, &vec![0xFF; 255], &vec![0x00])?;

    assert_eq!(index.find(&ctx, &vec![0x01])?.collect_remaining()?, vec![vec![0x02, 0x03]]);
    assert_eq!(index.find(&ctx, &vec![0x01, 0x02])?.collect_remaining()?, vec![vec![0x03]]);
    assert_eq!(index.count_key(&ctx, &vec![0xFF; 255])?, 1);
    assert!(matches!(
        index.add_entry(&ctx, &vec![0x00; 256], &vec![]),
        Err(IndexError::Encoding(_))
    ));
    Ok(())
}

#[test]
fn estimates_track_exact_counts_across_flushes() -> Result<()> {
    init_tracing();
    let store = Arc::new(MemStore::with_options(
        MemStoreOptions::default().memtable_capacity(64),
    ));
    let ns = store.create_namespace("numbers");
    let index: MultiIndex<MemStore, u64, u64> = MultiIndex::new(
        "numbers",
        Arc::clone(&store),
        ns,
        Arc::new(U64Codec),
        Arc::new(U64Codec),
        IndexOptions::default(),
    );
    let ctx = TxContext::none();
    for key in 0..10u64 {
        for value in 0..50u64 {
            index.add_entry(&ctx, &key, &value)?;
        }
    }
    assert_eq!(index.count(&ctx)?, 500);
    let estimate = index.estimate_index_size()?;
    assert!(
        (450..=550).contains(&estimate),
        "uniform entry sizes should estimate closely, got {estimate}"
    );

    store.flush_all();
    let flushed = index.estimate_index_size()?;
    assert!(flushed > 0, "flushed entries must never estimate to zero");
    Ok(())
}
