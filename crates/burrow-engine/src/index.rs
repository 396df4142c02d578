use std::ops::Bound;

use burrow_collate::{Collation, Value, prefix_key, sort_key, successor};
use burrow_store::Transaction;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::keys;

/// One decoded index emission.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub doc_id: String,
    pub key: Value,
    pub value: Value,
    /// Sequence of the revision whose map invocation emitted this row.
    pub sequence: u64,
}

#[derive(Serialize)]
struct RowPayloadRef<'a> {
    id: &'a str,
    key: &'a Value,
    value: &'a Value,
    seq: u64,
}

#[derive(Deserialize)]
struct RowPayload {
    id: String,
    key: Value,
    value: Value,
    seq: u64,
}

// ── Scan bounds ─────────────────────────────────────────────

/// Logical range parameters, before resolution into byte bounds.
#[derive(Debug, Clone, Copy)]
pub struct RangeSpec<'a> {
    pub start_key: Option<&'a Value>,
    pub end_key: Option<&'a Value>,
    pub start_key_doc_id: Option<&'a str>,
    pub end_key_doc_id: Option<&'a str>,
    pub inclusive_end: bool,
    pub descending: bool,
    pub prefix_match_level: usize,
}

/// Resolved byte bounds over a view's entry space plus iteration direction.
#[derive(Debug, Clone)]
pub struct ScanBounds {
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    descending: bool,
}

/// Upper-bound successor of an entry prefix. Entry prefixes begin with a
/// tag byte below 0xff, so a successor always exists; the empty fallback
/// resolves to an empty scan.
fn prefix_successor(prefix: Vec<u8>) -> Vec<u8> {
    successor(prefix).unwrap_or_default()
}

fn bound_ref(b: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match b {
        Bound::Included(v) => Bound::Included(v.as_slice()),
        Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl ScanBounds {
    /// The whole entry space, ascending.
    pub fn all() -> Self {
        let root = keys::entry_root();
        Self {
            upper: Bound::Excluded(prefix_successor(root.clone())),
            lower: Bound::Included(root),
            descending: false,
        }
    }

    /// Every entry whose key collates equal to `key`.
    pub fn exact(mode: Collation, key: &Value) -> Self {
        let prefix = keys::entry_prefix(&sort_key(mode, key));
        Self {
            upper: Bound::Excluded(prefix_successor(prefix.clone())),
            lower: Bound::Included(prefix),
            descending: false,
        }
    }

    /// Resolve logical range parameters into byte bounds.
    ///
    /// `descending` reverses iteration direction but not bound roles: the
    /// scan starts at `start_key` (now the high end of the byte range) and
    /// ends at `end_key`, with `inclusive_end` and the doc-id qualifiers
    /// staying attached to their own keys. With `prefix_match_level > 0`
    /// the point bounds widen to prefix ranges and doc-id qualifiers are
    /// not applicable.
    pub fn resolve(mode: Collation, spec: &RangeSpec<'_>) -> Self {
        struct End<'a> {
            key: Option<&'a Value>,
            doc_id: Option<&'a str>,
            inclusive: bool,
        }
        let start = End {
            key: spec.start_key,
            doc_id: spec.start_key_doc_id,
            inclusive: true,
        };
        let end = End {
            key: spec.end_key,
            doc_id: spec.end_key_doc_id,
            inclusive: spec.inclusive_end,
        };
        let (low, high) = if spec.descending {
            (end, start)
        } else {
            (start, end)
        };

        let level = spec.prefix_match_level;
        let lower = match low.key {
            None => Bound::Included(keys::entry_root()),
            Some(k) => {
                let mut p = keys::entry_prefix(&truncated_key(mode, k, level));
                if level == 0
                    && let Some(d) = low.doc_id
                {
                    keys::write_doc_id(d, &mut p);
                }
                if low.inclusive {
                    Bound::Included(p)
                } else {
                    Bound::Included(prefix_successor(p))
                }
            }
        };
        let upper = match high.key {
            None => Bound::Excluded(prefix_successor(keys::entry_root())),
            Some(k) => {
                let mut p = keys::entry_prefix(&truncated_key(mode, k, level));
                if level == 0
                    && let Some(d) = high.doc_id
                {
                    keys::write_doc_id(d, &mut p);
                }
                if high.inclusive {
                    Bound::Excluded(prefix_successor(p))
                } else {
                    Bound::Excluded(p)
                }
            }
        };

        Self {
            lower,
            upper,
            descending: spec.descending,
        }
    }
}

fn truncated_key(mode: Collation, key: &Value, level: usize) -> Vec<u8> {
    if level == 0 {
        sort_key(mode, key)
    } else {
        prefix_key(mode, key, level)
    }
}

// ── Index store ─────────────────────────────────────────────

/// The ordered index of one view, bound to an open store transaction.
///
/// The indexer is the sole writer; queries open it read-only. Rows are
/// physically ordered by `(sort_key(key), doc_id, ordinal)`.
pub struct IndexStore<'t, T: Transaction> {
    txn: &'t T,
    cf: T::Cf,
    mode: Collation,
}

impl<'t, T: Transaction> IndexStore<'t, T> {
    pub fn open(txn: &'t T, view: &str, mode: Collation) -> Result<Self, EngineError> {
        let cf = txn.cf(&keys::view_cf(view))?;
        Ok(Self { txn, cf, mode })
    }

    /// Write all emissions of one map invocation, plus the back-reference
    /// used by [`remove_doc`](Self::remove_doc). Ordinal is emission order.
    pub fn insert_doc(
        &self,
        doc_id: &str,
        emissions: &[(Value, Value)],
        sequence: u64,
    ) -> Result<(), EngineError> {
        if emissions.is_empty() {
            return Ok(());
        }
        let mut entry_keys = Vec::with_capacity(emissions.len());
        for (ordinal, (key, value)) in emissions.iter().enumerate() {
            let sk = sort_key(self.mode, key);
            let entry_key = keys::entry_key(&sk, doc_id, ordinal as u32);
            let payload = serde_json::to_vec(&RowPayloadRef {
                id: doc_id,
                key,
                value,
                seq: sequence,
            })?;
            self.txn.put(&self.cf, &entry_key, &payload)?;
            entry_keys.push(entry_key);
        }
        self.txn.put(
            &self.cf,
            &keys::doc_key(doc_id),
            &keys::encode_key_list(&entry_keys),
        )?;
        Ok(())
    }

    /// Remove every entry previously emitted for a document. Idempotent.
    pub fn remove_doc(&self, doc_id: &str) -> Result<(), EngineError> {
        let doc_key = keys::doc_key(doc_id);
        let Some(bytes) = self.txn.get(&self.cf, &doc_key)? else {
            return Ok(());
        };
        for entry_key in keys::decode_key_list(&bytes)? {
            self.txn.delete(&self.cf, &entry_key)?;
        }
        self.txn.delete(&self.cf, &doc_key)?;
        Ok(())
    }

    /// Rows within the bounds, in scan order.
    pub fn scan(&self, bounds: &ScanBounds) -> Result<Vec<IndexRow>, EngineError> {
        let iter = self.txn.scan_range(
            &self.cf,
            bound_ref(&bounds.lower),
            bound_ref(&bounds.upper),
            bounds.descending,
        )?;
        let mut rows = Vec::new();
        for item in iter {
            let (_, payload) = item?;
            rows.push(decode_row(&payload)?);
        }
        Ok(rows)
    }

    /// Rows matching any of the given keys, ordered by the position of the
    /// matching key in the input list (not collation order). Duplicate input
    /// keys produce duplicate rows.
    pub fn scan_keys(&self, exact_keys: &[Value]) -> Result<Vec<IndexRow>, EngineError> {
        let mut rows = Vec::new();
        for key in exact_keys {
            rows.extend(self.scan(&ScanBounds::exact(self.mode, key))?);
        }
        Ok(rows)
    }

    /// Full ordered listing. Diagnostic/test use.
    pub fn dump(&self) -> Result<Vec<IndexRow>, EngineError> {
        self.scan(&ScanBounds::all())
    }

    /// Drop every entry and back-reference of the view.
    pub fn clear(&self) -> Result<(), EngineError> {
        self.txn
            .delete_range(&self.cf, Bound::Unbounded, Bound::Unbounded)?;
        Ok(())
    }
}

fn decode_row(payload: &[u8]) -> Result<IndexRow, EngineError> {
    let p: RowPayload = serde_json::from_slice(payload)
        .map_err(|e| EngineError::Corrupt(format!("bad row payload: {e}")))?;
    Ok(IndexRow {
        doc_id: p.id,
        key: p.key,
        value: p.value,
        sequence: p.seq,
    })
}
