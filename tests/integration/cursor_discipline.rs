#![allow(missing_docs)]

use std::sync::Arc;
use std::thread;

use mvindex::index::CounterMetrics;
use mvindex::primitives::bytes::U64Codec;
use mvindex::{CursorState, IndexOptions, MemStore, MultiIndex, Result, TxContext};

fn fixture() -> Result<(Arc<MemStore>, MultiIndex<MemStore, u64, u64>, Arc<CounterMetrics>)> {
    let store = Arc::new(MemStore::new());
    let metrics = Arc::new(CounterMetrics::default());
    let ns = store.create_namespace("edges");
    let index = MultiIndex::new(
        "edges",
        Arc::clone(&store),
        ns,
        Arc::new(U64Codec),
        Arc::new(U64Codec),
        IndexOptions::default().metrics(metrics.clone()),
    );
    let ctx = TxContext::none();
    for key in 0..20u64 {
        for value in 0..5u64 {
            index.add_entry(&ctx, &key, &(key * 100 + value))?;
        }
    }
    Ok((store, index, metrics))
}

#[test]
fn abandoned_cursors_release_iterators() -> Result<()> {
    let (store, index, metrics) = fixture()?;
    let ctx = TxContext::none();
    for round in 0..1_000u64 {
        let key = round % 20;
        match round % 4 {
            0 => drop(index.find(&ctx, &key)?),
            1 => {
                let mut cursor = index.scan_keys(&ctx)?;
                cursor.next()?;
            }
            2 => {
                let mut cursor = index.scan_distinct_keys(&ctx)?;
                cursor.prev()?;
                cursor.prev()?;
            }
            _ => {
                let mut cursor = index.scan_values(&ctx)?;
                cursor.next()?;
                assert!(!cursor.is_closed());
                cursor.close();
                cursor.close();
                assert!(cursor.is_closed());
            }
        }
    }
    assert_eq!(store.open_iterators(), 0);
    assert_eq!(metrics.open_cursors(), 0);
    assert_eq!(metrics.cursors_opened.load(std::sync::atomic::Ordering::Relaxed), 1_000);
    Ok(())
}

#[test]
fn live_cursors_are_counted_until_dropped() -> Result<()> {
    let (store, index, metrics) = fixture()?;
    let ctx = TxContext::none();
    let cursors = (0..10u64)
        .map(|key| index.find(&ctx, &key))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(store.open_iterators(), 10);
    assert_eq!(metrics.open_cursors(), 10);
    drop(cursors);
    assert_eq!(store.open_iterators(), 0);
    assert_eq!(metrics.open_cursors(), 0);
    Ok(())
}

#[test]
fn draining_helpers_close_the_cursor() -> Result<()> {
    let (store, index, _) = fixture()?;
    let ctx = TxContext::none();
    assert_eq!(index.count(&ctx)?, 100);
    assert_eq!(index.count_key(&ctx, &3)?, 5);
    let values: Vec<u64> = index.find(&ctx, &4)?.items().collect::<Result<_>>()?;
    assert_eq!(values, vec![400, 401, 402, 403, 404]);
    assert_eq!(store.open_iterators(), 0);
    Ok(())
}

#[test]
fn cursor_can_move_to_another_thread() -> Result<()> {
    let (store, index, _) = fixture()?;
    let mut cursor = index.find(&TxContext::none(), &7)?;
    assert_eq!(cursor.next()?, Some(700));
    let rest = thread::spawn(move || cursor.collect_remaining())
        .join()
        .expect("cursor thread panicked")?;
    assert_eq!(rest, vec![701, 702, 703, 704]);
    assert_eq!(store.open_iterators(), 0);
    Ok(())
}

#[test]
fn cursor_view_ignores_later_writes() -> Result<()> {
    let (_, index, _) = fixture()?;
    let ctx = TxContext::none();
    let mut cursor = index.find(&ctx, &1)?;
    index.add_entry(&ctx, &1, &150)?;
    index.remove_entry(&ctx, &1, &100)?;
    assert_eq!(cursor.next()?, Some(100));
    assert_eq!(cursor.state(), CursorState::Positioned);
    drop(cursor);
    assert_eq!(
        index.find(&ctx, &1)?.collect_remaining()?,
        vec![101, 102, 103, 104, 150]
    );
    Ok(())
}
