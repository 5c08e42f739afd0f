#![allow(missing_docs)]

use std::sync::Arc;

use mvindex::primitives::bytes::{U64Codec, Utf8Codec};
use mvindex::storage::engine::Namespace;
use mvindex::{
    BidirectionalIndex, EngineError, IndexError, IndexOptions, KvStore, KvTransaction, MemStore,
    MultiIndex, Result, TxContext,
};

fn pair(store: &Arc<MemStore>) -> (MultiIndex<MemStore, u64, String>, MultiIndex<MemStore, String, u64>) {
    let by_id = MultiIndex::new(
        "by_id",
        Arc::clone(store),
        store.create_namespace("by_id"),
        Arc::new(U64Codec),
        Arc::new(Utf8Codec),
        IndexOptions::default(),
    );
    let by_name = MultiIndex::new(
        "by_name",
        Arc::clone(store),
        store.create_namespace("by_name"),
        Arc::new(Utf8Codec),
        Arc::new(U64Codec),
        IndexOptions::default(),
    );
    (by_id, by_name)
}

#[test]
fn ambient_transaction_spans_indexes() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let (by_id, by_name) = pair(&store);
    let tx = Arc::new(store.begin()?);
    let ctx = TxContext::active(Arc::clone(&tx));
    assert!(!ctx.is_auto_commit());

    by_id.add_entry(&ctx, &1, &"ada".to_string())?;
    by_name.add_entry(&ctx, &"ada".to_string(), &1)?;
    assert_eq!(by_id.count(&ctx)?, 1, "own writes are visible");
    assert_eq!(by_id.count(&TxContext::none())?, 0, "others see nothing yet");

    tx.commit()?;
    let auto = TxContext::none();
    assert_eq!(by_id.find_first(&auto, &1)?, "ada");
    assert_eq!(by_name.find_first(&auto, &"ada".to_string())?, 1);
    Ok(())
}

#[test]
fn rollback_discards_all_index_writes() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let (by_id, by_name) = pair(&store);
    let tx = Arc::new(store.begin()?);
    let ctx = TxContext::active(Arc::clone(&tx));
    by_id.add_entry(&ctx, &2, &"bob".to_string())?;
    by_name.add_entry(&ctx, &"bob".to_string(), &2)?;
    assert_eq!(tx.pending_writes(), 2);
    tx.rollback()?;

    let auto = TxContext::none();
    assert_eq!(by_id.count(&auto)?, 0);
    assert_eq!(by_name.count(&auto)?, 0);
    assert!(matches!(
        by_id.add_entry(&ctx, &3, &"late".to_string()),
        Err(IndexError::Storage(EngineError::TransactionClosed))
    ));
    Ok(())
}

#[test]
fn remove_all_within_transaction_sees_own_writes() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let (by_id, _) = pair(&store);
    by_id.add_entry(&TxContext::none(), &5, &"committed".to_string())?;

    let tx = Arc::new(store.begin()?);
    let ctx = TxContext::active(Arc::clone(&tx));
    by_id.add_entry(&ctx, &5, &"pending".to_string())?;
    assert_eq!(by_id.remove_all_entries(&ctx, &5)?, 2);
    assert_eq!(by_id.count_key(&ctx, &5)?, 0);
    tx.commit()?;
    assert_eq!(by_id.count_key(&TxContext::none(), &5)?, 0);
    Ok(())
}

#[test]
fn concurrent_writers_conflict_on_commit() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let (by_id, _) = pair(&store);
    let first = Arc::new(store.begin()?);
    let second = Arc::new(store.begin()?);
    let value = "same".to_string();
    by_id.add_entry(&TxContext::active(Arc::clone(&first)), &9, &value)?;
    by_id.add_entry(&TxContext::active(Arc::clone(&second)), &9, &value)?;
    first.commit()?;
    assert!(matches!(second.commit(), Err(EngineError::Conflict { .. })));
    Ok(())
}

#[test]
fn failed_auto_commit_leaves_no_partial_write() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let index = BidirectionalIndex::new(
        "broken",
        Arc::clone(&store),
        store.create_namespace("broken"),
        Namespace::new("never_created"),
        Arc::new(U64Codec),
        Arc::new(Utf8Codec),
        IndexOptions::default(),
    );
    let ctx = TxContext::none();
    let err = index.add_entry(&ctx, &1, &"x".to_string()).unwrap_err();
    assert!(matches!(
        err,
        IndexError::Storage(EngineError::NamespaceNotFound(_))
    ));
    assert_eq!(index.forward().count(&ctx)?, 0);
    Ok(())
}
