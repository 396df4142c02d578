use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ops::Bound;
use std::sync::{Arc, MutexGuard};

use crate::error::StoreError;
use crate::store::{KvIter, Transaction};

use super::store::{ColumnFamily, MemoryStore};

/// Column family handle for the memory backend.
///
/// A lightweight name token; all reads go through the transaction's
/// snapshot so writes within the same transaction are visible.
#[derive(Clone)]
pub struct MemoryCf {
    name: String,
}

/// Lazily-loaded snapshot of column families.
struct Snapshot {
    data: HashMap<String, Arc<ColumnFamily>>,
}

impl Snapshot {
    fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    fn ensure(&mut self, store: &MemoryStore, cf: &str) -> Result<(), StoreError> {
        if !self.data.contains_key(cf) {
            match store.snapshot_cf(cf) {
                Some(data) => {
                    self.data.insert(cf.to_string(), data);
                }
                None => {
                    return Err(StoreError::Storage(format!(
                        "column family not found: {cf}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn get_cf(&self, cf: &str) -> Result<&Arc<ColumnFamily>, StoreError> {
        self.data
            .get(cf)
            .ok_or_else(|| StoreError::Storage(format!("column family not found: {cf}")))
    }

    fn get_cf_mut(&mut self, cf: &str) -> Result<&mut ColumnFamily, StoreError> {
        let arc = self
            .data
            .get_mut(cf)
            .ok_or_else(|| StoreError::Storage(format!("column family not found: {cf}")))?;
        Ok(Arc::make_mut(arc))
    }
}

pub struct MemoryTransaction<'a> {
    snapshot: RefCell<Option<Snapshot>>,
    /// CFs that have been written to.
    dirty: RefCell<HashSet<String>>,
    store: &'a MemoryStore,
    read_only: bool,
    /// Write lock held for the duration of a write transaction.
    _write_guard: Option<MutexGuard<'a, ()>>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new_read_only(store: &'a MemoryStore) -> Self {
        Self {
            snapshot: RefCell::new(Some(Snapshot::new())),
            dirty: RefCell::new(HashSet::new()),
            store,
            read_only: true,
            _write_guard: None,
        }
    }

    pub(crate) fn new_writable(store: &'a MemoryStore, guard: MutexGuard<'a, ()>) -> Self {
        Self {
            snapshot: RefCell::new(Some(Snapshot::new())),
            dirty: RefCell::new(HashSet::new()),
            store,
            read_only: false,
            _write_guard: Some(guard),
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

/// Owned bound pair usable with `OrdMap::range`. Returns `None` when the
/// bounds describe an empty range, which `range` would reject.
fn owned_bounds(
    lower: Bound<&[u8]>,
    upper: Bound<&[u8]>,
) -> Option<(Bound<Vec<u8>>, Bound<Vec<u8>>)> {
    let empty = match (&lower, &upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    };
    if empty {
        return None;
    }
    let own = |b: Bound<&[u8]>| match b {
        Bound::Included(v) => Bound::Included(v.to_vec()),
        Bound::Excluded(v) => Bound::Excluded(v.to_vec()),
        Bound::Unbounded => Bound::Unbounded,
    };
    Some((own(lower), own(upper)))
}

impl<'a> Transaction for MemoryTransaction<'a> {
    type Cf = MemoryCf;

    fn cf(&self, name: &str) -> Result<Self::Cf, StoreError> {
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        snap.ensure(self.store, name)?;
        Ok(MemoryCf {
            name: name.to_string(),
        })
    }

    fn get(&self, cf: &Self::Cf, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let snap = self.snapshot.borrow();
        let snap = snap.as_ref().ok_or(StoreError::TransactionConsumed)?;
        let data = snap.get_cf(&cf.name)?;
        Ok(data.get(key).cloned())
    }

    fn scan_range<'b>(
        &'b self,
        cf: &Self::Cf,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<KvIter<'b>, StoreError> {
        let snap = self.snapshot.borrow();
        let snap_ref = snap.as_ref().ok_or(StoreError::TransactionConsumed)?;
        let data = snap_ref.get_cf(&cf.name)?;

        let Some(bounds) = owned_bounds(lower, upper) else {
            return Ok(Box::new(std::iter::empty()));
        };
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = data
            .range(bounds)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if reverse {
            entries.reverse();
        }
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn put(&self, cf: &Self::Cf, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.dirty.borrow_mut().insert(cf.name.clone());
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        let data = snap.get_cf_mut(&cf.name)?;
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, cf: &Self::Cf, key: &[u8]) -> Result<(), StoreError> {
        self.check_writable()?;
        self.dirty.borrow_mut().insert(cf.name.clone());
        let mut snap = self.snapshot.borrow_mut();
        let snap = snap.as_mut().ok_or(StoreError::TransactionConsumed)?;
        let data = snap.get_cf_mut(&cf.name)?;
        data.remove(key);
        Ok(())
    }

    fn delete_range(
        &self,
        cf: &Self::Cf,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let keys: Vec<Vec<u8>> = self
            .scan_range(cf, lower, upper, false)?
            .map(|r| r.map(|(k, _)| k))
            .collect::<Result<_, _>>()?;
        for key in keys {
            self.delete(cf, &key)?;
        }
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        let snapshot = self
            .snapshot
            .into_inner()
            .ok_or(StoreError::TransactionConsumed)?;

        if self.read_only {
            return Err(StoreError::ReadOnly);
        }

        let dirty_set = self.dirty.into_inner();
        let dirty: HashMap<String, Arc<ColumnFamily>> = snapshot
            .data
            .into_iter()
            .filter(|(name, _)| dirty_set.contains(name))
            .collect();

        if !dirty.is_empty() {
            self.store.publish(dirty);
        }
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        if self.snapshot.into_inner().is_none() {
            return Err(StoreError::TransactionConsumed);
        }
        Ok(())
    }
}
