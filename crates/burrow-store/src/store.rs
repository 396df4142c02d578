use std::ops::Bound;

use crate::error::StoreError;

pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(Vec<u8>, Vec<u8>), StoreError>> + 'a>;

/// An ordered, transactional key-value substrate.
///
/// Keys within a column family are ordered bytewise; index layers above this
/// encode their ordering into the key bytes. Implementations must provide
/// snapshot isolation: a transaction observes the state at `begin` plus its
/// own writes, and `commit` publishes all writes atomically.
pub trait Store {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError>;
    fn create_cf(&self, name: &str) -> Result<(), StoreError>;
    fn drop_cf(&self, name: &str) -> Result<(), StoreError>;
}

impl<S: Store> Store for std::sync::Arc<S> {
    type Txn<'a>
        = S::Txn<'a>
    where
        Self: 'a;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        (**self).begin(read_only)
    }

    fn create_cf(&self, name: &str) -> Result<(), StoreError> {
        (**self).create_cf(name)
    }

    fn drop_cf(&self, name: &str) -> Result<(), StoreError> {
        (**self).drop_cf(name)
    }
}

pub trait Transaction {
    /// Backend-specific column family handle. Cheap to clone.
    type Cf: Clone;

    /// Resolve a column family by name. Must be called before any access.
    fn cf(&self, name: &str) -> Result<Self::Cf, StoreError>;

    // ── Reads ──────────────────────────────────────────────────

    fn get(&self, cf: &Self::Cf, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Scan keys within the given bound pair, ascending by key bytes, or
    /// descending when `reverse` is set. Bounds address the same ends of the
    /// range either way; `reverse` only flips iteration order.
    fn scan_range<'a>(
        &'a self,
        cf: &Self::Cf,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        reverse: bool,
    ) -> Result<KvIter<'a>, StoreError>;

    // ── Writes ─────────────────────────────────────────────────

    fn put(&self, cf: &Self::Cf, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, cf: &Self::Cf, key: &[u8]) -> Result<(), StoreError>;

    /// Remove every key in the bound pair. Equivalent to scan + delete.
    fn delete_range(
        &self,
        cf: &Self::Cf,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
    ) -> Result<(), StoreError>;

    // ── Lifecycle ──────────────────────────────────────────────

    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}
