#![allow(missing_docs)]

use std::sync::Arc;

use mvindex::primitives::bytes::{U64Codec, Utf8Codec};
use mvindex::storage::mem::MemTxn;
use mvindex::{BidirectionalIndex, IndexOptions, MemStore, MultiValuedIndex, Result, TxContext};

type Tags = BidirectionalIndex<MemStore, u64, String>;

fn tags(store: &Arc<MemStore>) -> Tags {
    BidirectionalIndex::new(
        "tags",
        Arc::clone(store),
        store.create_namespace("tags"),
        store.create_namespace("tags.by_value"),
        Arc::new(U64Codec),
        Arc::new(Utf8Codec),
        IndexOptions::default(),
    )
}

fn tag(text: &str) -> String {
    text.to_string()
}

#[test]
fn forward_and_reverse_stay_in_step() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let index = tags(&store);
    let ctx = TxContext::none();
    for (doc, label) in [(10, "rust"), (10, "db"), (11, "rust"), (12, "db"), (12, "rust")] {
        index.add_entry(&ctx, &doc, &tag(label))?;
    }
    assert_eq!(
        index.find_by_value(&ctx, &tag("rust"))?.collect_remaining()?,
        vec![10, 11, 12]
    );
    assert_eq!(index.find(&ctx, &12)?.collect_remaining()?, vec![tag("db"), tag("rust")]);
    assert_eq!(index.count(&ctx)?, index.reverse().count(&ctx)?);

    assert_eq!(index.remove_all_entries(&ctx, &12)?, 2);
    assert_eq!(
        index.find_by_value(&ctx, &tag("db"))?.collect_remaining()?,
        vec![10]
    );
    assert_eq!(index.count(&ctx)?, 3);
    assert_eq!(index.reverse().count(&ctx)?, 3);
    Ok(())
}

#[test]
fn works_through_trait_object_capability() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let index = tags(&store);
    let ctx = TxContext::none();
    index.add_entry(&ctx, &1, &tag("a"))?;
    index.add_entry(&ctx, &2, &tag("a"))?;

    let generic: &dyn MultiValuedIndex<u64, String, Txn = MemTxn> = &index;
    let reverse = generic.reverse_lookup().expect("bidirectional index has reverse lookup");
    let mut keys = reverse.find_by_value(&ctx, &tag("a"))?;
    assert!(keys.seek(&2)?);
    assert_eq!(keys.current()?, 2);
    assert_eq!(generic.scan_distinct_keys(&ctx)?.count()?, 2);
    Ok(())
}

#[test]
fn distinct_value_scan_through_reverse_half() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let index = tags(&store);
    let ctx = TxContext::none();
    for (doc, label) in [(1, "x"), (2, "x"), (3, "y")] {
        index.add_entry(&ctx, &doc, &tag(label))?;
    }
    assert_eq!(
        index.reverse().scan_distinct_keys(&ctx)?.collect_remaining()?,
        vec![tag("x"), tag("y")]
    );
    Ok(())
}

#[test]
fn long_values_survive_add_lookup_and_removal() -> Result<()> {
    let store = Arc::new(MemStore::new());
    let index = tags(&store);
    let ctx = TxContext::none();
    let long = "v".repeat(300);
    let short = tag("short");
    index.add_entry(&ctx, &1, &long)?;
    index.add_entry(&ctx, &1, &short)?;
    index.add_entry(&ctx, &3, &long)?;

    let mut holders = index.find_by_value(&ctx, &long)?;
    assert!(holders.seek(&3)?);
    assert_eq!(holders.current()?, 3);
    drop(holders);
    assert_eq!(index.find_by_value(&ctx, &long)?.collect_remaining()?, vec![1, 3]);
    assert_eq!(
        index.reverse().scan_distinct_keys(&ctx)?.collect_remaining()?,
        vec![short.clone(), long.clone()]
    );

    assert_eq!(index.remove_all_entries(&ctx, &1)?, 2);
    assert_eq!(index.find_by_value(&ctx, &long)?.collect_remaining()?, vec![3]);
    assert_eq!(index.find_by_value(&ctx, &short)?.count()?, 0);
    assert_eq!(index.remove_all_entries(&ctx, &3)?, 1);
    assert_eq!(index.reverse().count(&ctx)?, 0);
    Ok(())
}
