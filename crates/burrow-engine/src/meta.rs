use burrow_store::Transaction;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Global column family holding per-view metadata records.
pub const SYS_CF: &str = "_sys";

/// Persisted view state: the registered version tag and the last global
/// sequence fully reflected in the index. A version mismatch against the
/// registered map function forces a full re-derivation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewMeta {
    pub version: Option<String>,
    pub last_sequence: u64,
}

fn meta_key(view: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + view.len());
    buf.extend_from_slice(b"view\x00");
    buf.extend_from_slice(view.as_bytes());
    buf
}

pub fn load_view_meta<T: Transaction>(
    txn: &T,
    view: &str,
) -> Result<Option<ViewMeta>, EngineError> {
    let sys = txn.cf(SYS_CF)?;
    match txn.get(&sys, &meta_key(view))? {
        Some(bytes) => {
            let meta = serde_json::from_slice(&bytes)
                .map_err(|e| EngineError::Corrupt(format!("bad view metadata: {e}")))?;
            Ok(Some(meta))
        }
        None => Ok(None),
    }
}

pub fn save_view_meta<T: Transaction>(
    txn: &T,
    view: &str,
    meta: &ViewMeta,
) -> Result<(), EngineError> {
    let sys = txn.cf(SYS_CF)?;
    let bytes = serde_json::to_vec(meta)?;
    txn.put(&sys, &meta_key(view), &bytes)?;
    Ok(())
}

pub fn delete_view_meta<T: Transaction>(txn: &T, view: &str) -> Result<(), EngineError> {
    let sys = txn.cf(SYS_CF)?;
    txn.delete(&sys, &meta_key(view))?;
    Ok(())
}
