use serde::Serialize;
use serde_json::Value;

/// One query result element.
///
/// Map-mode rows carry the emitting document's id and source sequence.
/// Reduced rows have neither (`doc_id` is `None`, `sequence` is 0). A
/// grouped query against a view with no reducer yields rows with `error`
/// set in place of a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRow {
    pub key: Value,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub sequence: u64,
    /// Hydrated source (or linked) document, when `include_docs` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
    /// Conflicting revision ids of the source document, when hydrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryRow {
    pub fn mapped(key: Value, value: Value, doc_id: String, sequence: u64) -> Self {
        Self {
            key,
            value,
            doc_id: Some(doc_id),
            sequence,
            doc: None,
            conflicts: None,
            error: None,
        }
    }

    pub fn reduced(key: Value, value: Value) -> Self {
        Self {
            key,
            value,
            doc_id: None,
            sequence: 0,
            doc: None,
            conflicts: None,
            error: None,
        }
    }

    /// Group row for a view without a reducer: an error marker instead of a
    /// value.
    pub fn unreduced(key: Value) -> Self {
        Self {
            key,
            value: Value::Null,
            doc_id: None,
            sequence: 0,
            doc: None,
            conflicts: None,
            error: Some("not_found".to_string()),
        }
    }
}
