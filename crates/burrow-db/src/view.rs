use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use burrow_collate::Collation;
use burrow_engine::{IndexRow, IndexStore, ViewMeta, save_view_meta};
use burrow_query::{IndexUpdateMode, QueryOptions, QueryRow};
use burrow_store::{Store, Transaction};
use tracing::{debug, warn};

use crate::database::DbInner;
use crate::docstore::with_meta;
use crate::error::DbError;
use crate::live::LiveQuery;
use crate::mapred::{Emitter, Mapper, Reducer};
use crate::query;

/// Documents with this id prefix never contribute index rows.
pub(crate) const DESIGN_PREFIX: &str = "_design/";

pub(crate) struct ViewState {
    name: String,
    pub(crate) mapper: RwLock<Option<Arc<dyn Mapper>>>,
    pub(crate) reducer: RwLock<Option<Arc<dyn Reducer>>>,
    version: RwLock<Option<String>>,
    collation: RwLock<Collation>,
    last_sequence: AtomicU64,
    /// Serializes index passes: at most one per view at a time.
    update_lock: Mutex<()>,
}

impl ViewState {
    pub(crate) fn new(name: &str, meta: ViewMeta) -> Self {
        Self {
            name: name.to_string(),
            mapper: RwLock::new(None),
            reducer: RwLock::new(None),
            version: RwLock::new(meta.version),
            collation: RwLock::new(Collation::default()),
            last_sequence: AtomicU64::new(meta.last_sequence),
            update_lock: Mutex::new(()),
        }
    }
}

/// Named handle on one materialized view. Cheap to clone.
pub struct View<S: Store> {
    pub(crate) inner: Arc<DbInner<S>>,
    pub(crate) state: Arc<ViewState>,
}

impl<S: Store> Clone for View<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: Store> View<S> {
    pub(crate) fn new(inner: Arc<DbInner<S>>, state: Arc<ViewState>) -> Self {
        Self { inner, state }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn collation(&self) -> Collation {
        *self.state.collation.read().unwrap()
    }

    /// Change the collation mode. The index orders by it, so a change
    /// invalidates the index.
    pub fn set_collation(&self, mode: Collation) -> Result<(), DbError> {
        {
            let mut current = self.state.collation.write().unwrap();
            if *current == mode {
                return Ok(());
            }
            *current = mode;
        }
        self.reset_index()
    }

    pub fn has_map(&self) -> bool {
        self.state.mapper.read().unwrap().is_some()
    }

    /// Register the map (and optional reduce) function under a version tag.
    ///
    /// Returns whether anything changed. A changed version tag invalidates
    /// the index and forces full re-derivation on the next pass.
    pub fn set_map_reduce(
        &self,
        mapper: Arc<dyn Mapper>,
        reducer: Option<Arc<dyn Reducer>>,
        version: &str,
    ) -> Result<bool, DbError> {
        *self.state.mapper.write().unwrap() = Some(mapper);
        *self.state.reducer.write().unwrap() = reducer;
        let changed = {
            let mut current = self.state.version.write().unwrap();
            if current.as_deref() == Some(version) {
                false
            } else {
                *current = Some(version.to_string());
                true
            }
        };
        if changed {
            self.reset_index()?;
        }
        Ok(changed)
    }

    pub fn set_map(&self, mapper: Arc<dyn Mapper>, version: &str) -> Result<bool, DbError> {
        self.set_map_reduce(mapper, None, version)
    }

    /// Whether the index lags the document store.
    pub fn is_stale(&self) -> bool {
        self.state.last_sequence.load(Ordering::SeqCst) < self.inner.docs.current_sequence()
    }

    /// Last global sequence fully reflected in the index.
    pub fn last_indexed_sequence(&self) -> u64 {
        self.state.last_sequence.load(Ordering::SeqCst)
    }

    /// Bring the index up to date with the document store.
    ///
    /// One pass per view at a time; the whole pass commits atomically, so a
    /// failure leaves prior durable state unchanged. A map-function error
    /// on one document contributes zero rows for it and never aborts the
    /// pass. Re-running with no intervening mutation is a no-op.
    pub fn update_index(&self) -> Result<(), DbError> {
        let _pass = self.state.update_lock.lock().unwrap();

        let mapper = self
            .state
            .mapper
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| DbError::ViewNotDefined(self.state.name.clone()))?;

        let since = self.state.last_sequence.load(Ordering::SeqCst);
        let changes = self.inner.docs.changes_since(since);
        if changes.is_empty() {
            return Ok(());
        }

        let mode = self.collation();
        let txn = self.inner.store.begin(false)?;
        let index = IndexStore::open(&txn, &self.state.name, mode)?;

        let mut last = since;
        let mut emitted = 0usize;
        for change in &changes {
            last = last.max(change.latest_sequence);
            index.remove_doc(&change.doc_id)?;

            let Some(rev) = &change.winning else { continue };
            if rev.deleted || change.doc_id.starts_with(DESIGN_PREFIX) {
                continue;
            }

            let content = with_meta(rev);
            let mut emitter = Emitter::new();
            match mapper.map(&content, &mut emitter) {
                Ok(()) => {
                    let rows = emitter.into_rows();
                    emitted += rows.len();
                    // Rows carry the winning revision's own sequence, so a
                    // conflict flip re-attributes them to whichever revision
                    // currently wins.
                    index.insert_doc(&change.doc_id, &rows, rev.sequence)?;
                }
                Err(e) => {
                    warn!(
                        view = %self.state.name,
                        doc = %change.doc_id,
                        error = %e,
                        "map function failed; document contributes no rows"
                    );
                }
            }
        }

        save_view_meta(
            &txn,
            &self.state.name,
            &ViewMeta {
                version: self.state.version.read().unwrap().clone(),
                last_sequence: last,
            },
        )?;
        txn.commit()?;
        self.state.last_sequence.store(last, Ordering::SeqCst);
        debug!(
            view = %self.state.name,
            documents = changes.len(),
            rows = emitted,
            last_sequence = last,
            "index pass complete"
        );
        Ok(())
    }

    /// Drop all index rows and reset the watermark. The view definition
    /// persists.
    pub fn delete_index(&self) -> Result<(), DbError> {
        self.reset_index()
    }

    fn reset_index(&self) -> Result<(), DbError> {
        let txn = self.inner.store.begin(false)?;
        let index = IndexStore::open(&txn, &self.state.name, self.collation())?;
        index.clear()?;
        save_view_meta(
            &txn,
            &self.state.name,
            &ViewMeta {
                version: self.state.version.read().unwrap().clone(),
                last_sequence: 0,
            },
        )?;
        txn.commit()?;
        self.state.last_sequence.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Full ordered listing of raw index rows. Diagnostic/test use.
    pub fn dump(&self) -> Result<Vec<IndexRow>, DbError> {
        let txn = self.inner.store.begin(true)?;
        let index = IndexStore::open(&txn, &self.state.name, self.collation())?;
        Ok(index.dump()?)
    }
}

impl<S: Store + Send + Sync + 'static> View<S> {
    /// Resolve a query against the view's index.
    pub fn query(&self, options: &QueryOptions) -> Result<Vec<QueryRow>, DbError> {
        match options.index_update_mode {
            IndexUpdateMode::Before => {
                if self.is_stale() {
                    self.update_index()?;
                }
            }
            IndexUpdateMode::After => {
                let view = self.clone();
                thread::spawn(move || {
                    if let Err(e) = view.update_index() {
                        warn!(view = %view.state.name, error = %e, "background index pass failed");
                    }
                });
            }
            IndexUpdateMode::Never => {}
        }
        query::run(self, options)
    }

    /// Wrap this view in a live query over the given options.
    pub fn live_query(&self, options: QueryOptions) -> LiveQuery<S> {
        LiveQuery::new(self.clone(), options)
    }
}
