use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::MemoryTransaction;

pub(crate) type ColumnFamily = OrdMap<Vec<u8>, Vec<u8>>;

/// In-memory reference backend.
///
/// Each column family is an immutable ordered map published through an
/// `ArcSwap`; transactions snapshot lazily and commit by swapping in the
/// updated maps. Structural sharing keeps snapshots cheap.
pub struct MemoryStore {
    cfs: RwLock<HashMap<String, Arc<ArcSwap<ColumnFamily>>>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cfs: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot a single column family, or `None` if it doesn't exist.
    pub(crate) fn snapshot_cf(&self, name: &str) -> Option<Arc<ColumnFamily>> {
        let cfs = self.cfs.read().unwrap();
        cfs.get(name).map(|arc| arc.load_full())
    }

    /// Publish the dirty column families of a committing transaction.
    pub(crate) fn publish(&self, dirty: HashMap<String, Arc<ColumnFamily>>) {
        let cfs = self.cfs.read().unwrap();
        for (name, data) in dirty {
            if let Some(arc) = cfs.get(&name) {
                arc.store(data);
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        if read_only {
            return Ok(MemoryTransaction::new_read_only(self));
        }
        let guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        Ok(MemoryTransaction::new_writable(self, guard))
    }

    fn create_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self.cfs.write().unwrap();
        cfs.entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self.cfs.write().unwrap();
        cfs.remove(name);
        Ok(())
    }
}
