use std::collections::HashMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use burrow_collate::{Map, Value, successor};
use burrow_engine::{SYS_CF, delete_view_meta, load_view_meta, view_cf};
use burrow_query::{QueryOptions, QueryRow};
use burrow_store::{Store, Transaction};
use serde_json::json;
use tracing::trace;

use crate::docstore::{DocStore, Revision};
use crate::error::DbError;
use crate::live::Signal;
use crate::query;
use crate::view::{View, ViewState};

pub struct DatabaseConfig {
    /// Milliseconds a live query waits after a mutation signal before
    /// recomputing, coalescing bursts into one pass.
    pub live_query_debounce_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            live_query_debounce_ms: 50,
        }
    }
}

/// Fan-out point for mutation signals to live queries.
pub(crate) struct ChangeHub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Sender<Signal>)>>,
}

impl ChangeHub {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, tx: Sender<Signal>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().unwrap().push((id, tx));
        id
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().unwrap().retain(|(sid, _)| *sid != id);
    }

    pub(crate) fn notify_mutation(&self) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|(_, tx)| tx.send(Signal::Mutation).is_ok());
    }
}

pub(crate) struct DbInner<S: Store> {
    pub(crate) store: S,
    pub(crate) docs: DocStore,
    views: Mutex<HashMap<String, Arc<ViewState>>>,
    pub(crate) hub: ChangeHub,
    pub(crate) config: DatabaseConfig,
}

/// An embedded JSON document database with materialized map/reduce views.
///
/// Documents and their revision history live in the document store; view
/// indexes and view metadata persist in the backing key-value store and
/// survive reopen.
pub struct Database<S: Store> {
    pub(crate) inner: Arc<DbInner<S>>,
}

impl<S: Store> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store> Database<S> {
    pub fn open(store: S, config: DatabaseConfig) -> Self {
        let _ = store.create_cf(SYS_CF);
        Self {
            inner: Arc::new(DbInner {
                store,
                docs: DocStore::new(),
                views: Mutex::new(HashMap::new()),
                hub: ChangeHub::new(),
                config,
            }),
        }
    }

    // ── Views ──────────────────────────────────────────────────

    /// Get a view by name, creating it on first reference. Persisted
    /// metadata (version tag, last indexed sequence) is loaded if present.
    pub fn view(&self, name: &str) -> View<S> {
        let mut views = self.inner.views.lock().unwrap();
        if let Some(state) = views.get(name) {
            return View::new(Arc::clone(&self.inner), Arc::clone(state));
        }
        let _ = self.inner.store.create_cf(&view_cf(name));
        let meta = self.load_persisted_meta(name).unwrap_or_default();
        let state = Arc::new(ViewState::new(name, meta));
        views.insert(name.to_string(), Arc::clone(&state));
        View::new(Arc::clone(&self.inner), state)
    }

    /// Look up a view without creating it: known to this process, or
    /// persisted by a previous one.
    pub fn existing_view(&self, name: &str) -> Option<View<S>> {
        {
            let views = self.inner.views.lock().unwrap();
            if let Some(state) = views.get(name) {
                return Some(View::new(Arc::clone(&self.inner), Arc::clone(state)));
            }
        }
        self.load_persisted_meta(name)?;
        Some(self.view(name))
    }

    /// Views known to this process, by name.
    pub fn all_views(&self) -> Vec<View<S>> {
        let views = self.inner.views.lock().unwrap();
        let mut out: Vec<View<S>> = views
            .values()
            .map(|state| View::new(Arc::clone(&self.inner), Arc::clone(state)))
            .collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    /// Delete a view: its index, its metadata, and its registration.
    pub fn delete_view(&self, name: &str) -> Result<(), DbError> {
        let registered = self.inner.views.lock().unwrap().remove(name).is_some();
        let persisted = self.load_persisted_meta(name).is_some();
        if !registered && !persisted {
            return Err(DbError::NotFound(format!("view {name}")));
        }
        let txn = self.inner.store.begin(false)?;
        delete_view_meta(&txn, name)?;
        txn.commit()?;
        self.inner.store.drop_cf(&view_cf(name))?;
        Ok(())
    }

    fn load_persisted_meta(&self, name: &str) -> Option<burrow_engine::ViewMeta> {
        let txn = self.inner.store.begin(true).ok()?;
        load_view_meta(&txn, name).ok().flatten()
    }

    // ── Documents ──────────────────────────────────────────────

    /// Create a document. The id comes from `_id` (generated when absent);
    /// `_rev`, when present, names the parent revision being replaced.
    pub fn put_document(&self, content: Value) -> Result<Revision, DbError> {
        let obj = into_object(content)?;
        let doc_id = match obj.get("_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => self.inner.docs.generate_id(),
        };
        let prev = obj
            .get("_rev")
            .and_then(Value::as_str)
            .map(str::to_string);
        let rev = self
            .inner
            .docs
            .put(&doc_id, prev.as_deref(), obj, false, false)?;
        self.notify();
        Ok(rev)
    }

    /// Replace a document's content, given its current winning revision id.
    pub fn update_document(
        &self,
        doc_id: &str,
        prev_rev_id: &str,
        content: Value,
    ) -> Result<Revision, DbError> {
        let obj = into_object(content)?;
        let rev = self
            .inner
            .docs
            .put(doc_id, Some(prev_rev_id), obj, false, false)?;
        self.notify();
        Ok(rev)
    }

    /// Delete a document, given its current winning revision id.
    pub fn delete_document(&self, doc_id: &str, prev_rev_id: &str) -> Result<Revision, DbError> {
        let rev = self
            .inner
            .docs
            .put(doc_id, Some(prev_rev_id), Map::new(), true, false)?;
        self.notify();
        Ok(rev)
    }

    /// Replication-style insertion of a revision with a caller-chosen id;
    /// introduces a conflict when the document already has a live leaf.
    pub fn force_insert(
        &self,
        doc_id: &str,
        rev_id: &str,
        content: Value,
        deleted: bool,
    ) -> Result<Revision, DbError> {
        let obj = into_object(content)?;
        let rev = self.inner.docs.force_insert(doc_id, rev_id, obj, deleted)?;
        self.notify();
        Ok(rev)
    }

    /// Current content of a live document, with `_id`/`_rev` injected.
    pub fn document(&self, doc_id: &str) -> Option<Value> {
        self.inner.docs.document_content(doc_id)
    }

    pub fn current_winning_revision(&self, doc_id: &str) -> Option<Revision> {
        self.inner.docs.current_winning_revision(doc_id)
    }

    /// Conflicting (non-winning, live) leaf revision ids of a document.
    pub fn conflicts(&self, doc_id: &str) -> Vec<String> {
        self.inner.docs.conflicts(doc_id)
    }

    pub fn document_count(&self) -> usize {
        self.inner.docs.document_count()
    }

    /// The global sequence of the latest mutation.
    pub fn current_sequence(&self) -> u64 {
        self.inner.docs.current_sequence()
    }

    fn notify(&self) {
        trace!("document mutated, signalling live queries");
        self.inner.hub.notify_mutation();
    }

    // ── All-docs queries ───────────────────────────────────────

    /// Query the document-id index with the same options machinery as a
    /// view. Ids order by raw bytes; row values carry the winning revision
    /// id and any conflicting revisions.
    pub fn all_docs(&self, options: &QueryOptions) -> Result<Vec<QueryRow>, DbError> {
        if options.keys.is_some() && (options.start_key.is_some() || options.end_key.is_some()) {
            return Err(DbError::InvalidQueryOptions(
                "keys is mutually exclusive with start_key/end_key".to_string(),
            ));
        }
        let live = self.inner.docs.live_docs();

        let rows: Vec<QueryRow> = if let Some(keys) = &options.keys {
            // Input order; unknown or deleted ids yield error-marker rows.
            keys.iter()
                .map(|key| {
                    key.as_str()
                        .and_then(|id| {
                            live.iter()
                                .find(|(doc_id, _)| doc_id == id)
                                .map(|(doc_id, rev)| self.all_docs_row(doc_id, rev))
                        })
                        .unwrap_or_else(|| QueryRow::unreduced(key.clone()))
                })
                .collect()
        } else {
            let (lower, upper) = id_bounds(options)?;
            let mut rows: Vec<QueryRow> = live
                .iter()
                .filter(|(id, _)| id_in_bounds(id.as_bytes(), &lower, &upper))
                .map(|(id, rev)| self.all_docs_row(id, rev))
                .collect();
            if options.descending {
                rows.reverse();
            }
            rows
        };

        Ok(query::finalize(rows, options, &self.inner.docs))
    }

    fn all_docs_row(&self, doc_id: &str, rev: &Revision) -> QueryRow {
        let conflicts = self.inner.docs.conflicts(doc_id);
        QueryRow::mapped(
            json!(doc_id),
            json!({ "rev": rev.rev_id, "_conflicts": conflicts }),
            doc_id.to_string(),
            rev.sequence,
        )
    }
}

fn into_object(content: Value) -> Result<Map<String, Value>, DbError> {
    match content {
        Value::Object(obj) => Ok(obj),
        other => Err(DbError::InvalidDocument(format!(
            "document content must be an object, got {other}"
        ))),
    }
}

// ── Raw id range resolution ─────────────────────────────────

/// Doc-id bounds for an all-docs range query. Ids compare by raw bytes;
/// `prefix_match_level` truncates the bound keys to their first N
/// characters and widens them to prefix ranges, as for view keys.
fn id_bounds(options: &QueryOptions) -> Result<(Bound<Vec<u8>>, Bound<Vec<u8>>), DbError> {
    let key_bytes = |key: &Value| -> Result<Vec<u8>, DbError> {
        let s = key.as_str().ok_or_else(|| {
            DbError::InvalidQueryOptions("all-docs keys must be strings".to_string())
        })?;
        Ok(match options.prefix_match_level {
            0 => s.as_bytes().to_vec(),
            n => s.chars().take(n).collect::<String>().into_bytes(),
        })
    };
    let prefixed = options.prefix_match_level > 0;

    // Descending swaps which option is the low end, not bound semantics.
    let (low, high) = if options.descending {
        (options.end_key.as_ref(), options.start_key.as_ref())
    } else {
        (options.start_key.as_ref(), options.end_key.as_ref())
    };
    let (low_inclusive, high_inclusive) = if options.descending {
        (options.inclusive_end, true)
    } else {
        (true, options.inclusive_end)
    };

    let lower = match low {
        None => Bound::Unbounded,
        Some(k) => {
            let bytes = key_bytes(k)?;
            if low_inclusive {
                Bound::Included(bytes)
            } else if prefixed {
                successor(bytes).map_or(Bound::Unbounded, Bound::Included)
            } else {
                Bound::Excluded(bytes)
            }
        }
    };
    let upper = match high {
        None => Bound::Unbounded,
        Some(k) => {
            let bytes = key_bytes(k)?;
            if prefixed && high_inclusive {
                successor(bytes).map_or(Bound::Unbounded, Bound::Excluded)
            } else if high_inclusive {
                Bound::Included(bytes)
            } else {
                Bound::Excluded(bytes)
            }
        }
    };
    Ok((lower, upper))
}

fn id_in_bounds(id: &[u8], lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> bool {
    let above_lower = match lower {
        Bound::Unbounded => true,
        Bound::Included(b) => id >= b.as_slice(),
        Bound::Excluded(b) => id > b.as_slice(),
    };
    let below_upper = match upper {
        Bound::Unbounded => true,
        Bound::Included(b) => id <= b.as_slice(),
        Bound::Excluded(b) => id < b.as_slice(),
    };
    above_lower && below_upper
}
