use std::ops::Bound;

use burrow_store::{MemoryStore, Store, Transaction};

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store.create_cf("data").unwrap();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf("data").unwrap();
    for key in [b"a", b"b", b"c", b"d", b"e"] {
        txn.put(&cf, key, key).unwrap();
    }
    txn.commit().unwrap();
    store
}

#[test]
fn writes_visible_after_commit() {
    let store = seeded();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf("data").unwrap();
    assert_eq!(txn.get(&cf, b"c").unwrap(), Some(b"c".to_vec()));
    assert_eq!(txn.get(&cf, b"z").unwrap(), None);
}

#[test]
fn rollback_discards_writes() {
    let store = seeded();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf("data").unwrap();
    txn.put(&cf, b"x", b"x").unwrap();
    txn.rollback().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf("data").unwrap();
    assert_eq!(txn.get(&cf, b"x").unwrap(), None);
}

#[test]
fn snapshot_isolated_from_later_commits() {
    let store = seeded();
    let reader = store.begin(true).unwrap();
    let rcf = reader.cf("data").unwrap();
    assert_eq!(reader.get(&rcf, b"a").unwrap(), Some(b"a".to_vec()));

    let writer = store.begin(false).unwrap();
    let wcf = writer.cf("data").unwrap();
    writer.delete(&wcf, b"a").unwrap();
    writer.commit().unwrap();

    // The reader snapshotted "data" before the delete committed.
    assert_eq!(reader.get(&rcf, b"a").unwrap(), Some(b"a".to_vec()));

    let fresh = store.begin(true).unwrap();
    let fcf = fresh.cf("data").unwrap();
    assert_eq!(fresh.get(&fcf, b"a").unwrap(), None);
}

#[test]
fn range_scan_honors_bounds_and_direction() {
    let store = seeded();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf("data").unwrap();

    let keys: Vec<Vec<u8>> = txn
        .scan_range(&cf, Bound::Included(&b"b"[..]), Bound::Excluded(&b"e"[..]), false)
        .unwrap()
        .map(|r| r.map(|(k, _)| k))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);

    let keys: Vec<Vec<u8>> = txn
        .scan_range(&cf, Bound::Included(&b"b"[..]), Bound::Excluded(&b"e"[..]), true)
        .unwrap()
        .map(|r| r.map(|(k, _)| k))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(keys, vec![b"d".to_vec(), b"c".to_vec(), b"b".to_vec()]);
}

#[test]
fn inverted_range_is_empty() {
    let store = seeded();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf("data").unwrap();
    let count = txn
        .scan_range(&cf, Bound::Included(&b"e"[..]), Bound::Excluded(&b"a"[..]), false)
        .unwrap()
        .count();
    assert_eq!(count, 0);
}

#[test]
fn read_only_transaction_rejects_writes() {
    let store = seeded();
    let txn = store.begin(true).unwrap();
    let cf = txn.cf("data").unwrap();
    assert!(txn.put(&cf, b"x", b"x").is_err());
}

#[test]
fn delete_range_removes_span() {
    let store = seeded();
    let txn = store.begin(false).unwrap();
    let cf = txn.cf("data").unwrap();
    txn.delete_range(&cf, Bound::Included(&b"b"[..]), Bound::Included(&b"d"[..]))
        .unwrap();
    txn.commit().unwrap();

    let txn = store.begin(true).unwrap();
    let cf = txn.cf("data").unwrap();
    let keys: Vec<Vec<u8>> = txn
        .scan_range(&cf, Bound::Unbounded, Bound::Unbounded, false)
        .unwrap()
        .map(|r| r.map(|(k, _)| k))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(keys, vec![b"a".to_vec(), b"e".to_vec()]);
}
