use crate::error::EngineError;

// Key grammar within a view's column family:
//
// - entry:    `e 0x00 {sort_key} {doc_id_esc} {ordinal: u32 BE}`
// - back-ref: `d 0x00 {doc_id_esc}` → length-prefixed list of entry keys
//
// `d` < `e`, so back-references sit below the entry space and never appear
// in an entry scan.

const ENTRY_TAG: u8 = b'e';
const DOC_TAG: u8 = b'd';
const SEP: u8 = 0x00;

/// Column family holding a view's index.
pub fn view_cf(view: &str) -> String {
    format!("view:{view}")
}

/// Root prefix of the entry space: every entry key starts with this.
pub(crate) fn entry_root() -> Vec<u8> {
    vec![ENTRY_TAG, SEP]
}

/// Prefix of every entry whose sort key starts with `sort_key_prefix`.
pub(crate) fn entry_prefix(sort_key_prefix: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + sort_key_prefix.len());
    buf.push(ENTRY_TAG);
    buf.push(SEP);
    buf.extend_from_slice(sort_key_prefix);
    buf
}

pub(crate) fn entry_key(sort_key: &[u8], doc_id: &str, ordinal: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + sort_key.len() + 2 * doc_id.len() + 5);
    buf.push(ENTRY_TAG);
    buf.push(SEP);
    buf.extend_from_slice(sort_key);
    write_doc_id(doc_id, &mut buf);
    buf.extend_from_slice(&ordinal.to_be_bytes());
    buf
}

pub(crate) fn doc_key(doc_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + 2 * doc_id.len() + 1);
    buf.push(DOC_TAG);
    buf.push(SEP);
    write_doc_id(doc_id, &mut buf);
    buf
}

/// Escaped doc id: each byte prefixed with 0x01, terminated by 0x00, so
/// byte order equals doc-id order and no id is a byte prefix of another.
pub(crate) fn write_doc_id(doc_id: &str, out: &mut Vec<u8>) {
    for &b in doc_id.as_bytes() {
        out.push(0x01);
        out.push(b);
    }
    out.push(0x00);
}

// ── Entry-key lists (back-reference payloads) ───────────────

pub(crate) fn encode_key_list(keys: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(keys.iter().map(|k| 4 + k.len()).sum());
    for key in keys {
        buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
        buf.extend_from_slice(key);
    }
    buf
}

pub(crate) fn decode_key_list(bytes: &[u8]) -> Result<Vec<Vec<u8>>, EngineError> {
    let mut keys = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(EngineError::Corrupt("truncated key list".into()));
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        rest = &rest[4..];
        if rest.len() < len {
            return Err(EngineError::Corrupt("truncated key list entry".into()));
        }
        keys.push(rest[..len].to_vec());
        rest = &rest[len..];
    }
    Ok(keys)
}
