#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use burrow_db::{
    Database, DatabaseConfig, Emitter, Map, MapError, Mapper, Reducer, Revision, Value,
    total_values,
};
use burrow_store::MemoryStore;
use serde_json::json;

pub type TestDb = Database<Arc<MemoryStore>>;

pub fn test_db() -> TestDb {
    Database::open(
        Arc::new(MemoryStore::new()),
        DatabaseConfig {
            live_query_debounce_ms: 10,
        },
    )
}

pub fn put_doc(db: &TestDb, content: Value) -> Revision {
    db.put_document(content).unwrap()
}

/// Five seed documents with string keys, inserted out of key order.
pub fn put_docs(db: &TestDb) -> Vec<Revision> {
    vec![
        put_doc(db, json!({"_id": "22222", "key": "two"})),
        put_doc(db, json!({"_id": "44444", "key": "four"})),
        put_doc(db, json!({"_id": "11111", "key": "one"})),
        put_doc(db, json!({"_id": "33333", "key": "three"})),
        put_doc(db, json!({"_id": "55555", "key": "five"})),
    ]
}

/// Map function emitting the document's `key` property with a null value.
pub fn key_mapper() -> Arc<dyn Mapper> {
    Arc::new(
        |doc: &Map<String, Value>, emitter: &mut Emitter| -> Result<(), MapError> {
            assert!(doc.contains_key("_id"));
            assert!(doc.contains_key("_rev"));
            if let Some(key) = doc.get("key") {
                emitter.emit(key.clone(), Value::Null);
            }
            Ok(())
        },
    )
}

/// Sum-of-values reducer built on the `total_values` helper.
pub fn sum_reducer() -> Arc<dyn Reducer> {
    Arc::new(|_keys: &[Value], values: &[Value], _rereduce: bool| total_values(values))
}

/// `key_mapper` with an invocation counter, for incrementality assertions.
pub struct CountingMapper {
    pub calls: AtomicUsize,
}

impl CountingMapper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Mapper for CountingMapper {
    fn map(&self, doc: &Map<String, Value>, emitter: &mut Emitter) -> Result<(), MapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(key) = doc.get("key") {
            emitter.emit(key.clone(), Value::Null);
        }
        Ok(())
    }
}

/// Keys of a dump, as JSON values.
pub fn dump_keys(view: &burrow_db::View<Arc<MemoryStore>>) -> Vec<Value> {
    view.dump().unwrap().into_iter().map(|r| r.key).collect()
}

/// (key, sequence) pairs of a dump.
pub fn dump_seqs(view: &burrow_db::View<Arc<MemoryStore>>) -> Vec<(Value, u64)> {
    view.dump()
        .unwrap()
        .into_iter()
        .map(|r| (r.key, r.sequence))
        .collect()
}
