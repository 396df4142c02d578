use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::row::QueryRow;

/// Predicate applied to materialized rows, before limit/skip accounting.
pub type PostFilter = Arc<dyn Fn(&QueryRow) -> bool + Send + Sync>;

/// When a query brings the view's index up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexUpdateMode {
    /// Reindex synchronously before resolving the query.
    #[default]
    Before,
    /// Resolve against current state, then trigger a background reindex.
    After,
    /// Resolve against current state only.
    Never,
}

/// The full query shape. Plain fields; build with struct-update syntax over
/// `Default::default()`.
#[derive(Clone)]
pub struct QueryOptions {
    pub start_key: Option<Value>,
    pub end_key: Option<Value>,
    /// Doc-id tiebreak on rows whose key equals `start_key`.
    pub start_key_doc_id: Option<String>,
    /// Doc-id tiebreak on rows whose key equals `end_key`.
    pub end_key_doc_id: Option<String>,
    /// Whether rows matching `end_key` are included. Defaults to true.
    pub inclusive_end: bool,
    /// Reverse iteration. Bound roles are unchanged: the scan still starts
    /// at `start_key` and ends at `end_key`.
    pub descending: bool,
    /// Exact-key mode; mutually exclusive with `start_key`/`end_key`.
    /// Output order follows this list, not collation order.
    pub keys: Option<Vec<Value>>,
    /// Group rows by their entire key.
    pub group: bool,
    /// Group rows by the first N elements of array keys (non-array keys
    /// group by the whole key). 0 disables grouping.
    pub group_level: usize,
    /// Explicit reduce override. Unset defaults to "the view has a reducer
    /// and no `keys` list was given".
    pub reduce: Option<bool>,
    pub limit: Option<usize>,
    pub skip: usize,
    /// N > 0 turns the start/end point bounds into prefix ranges over their
    /// first N characters (string keys) or elements (array keys).
    pub prefix_match_level: usize,
    /// Hydrate each surviving row with its source document (or the linked
    /// document named by a `{"_id": ...}` value).
    pub include_docs: bool,
    pub index_update_mode: IndexUpdateMode,
    pub post_filter: Option<PostFilter>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            start_key: None,
            end_key: None,
            start_key_doc_id: None,
            end_key_doc_id: None,
            inclusive_end: true,
            descending: false,
            keys: None,
            group: false,
            group_level: 0,
            reduce: None,
            limit: None,
            skip: 0,
            prefix_match_level: 0,
            include_docs: false,
            index_update_mode: IndexUpdateMode::default(),
            post_filter: None,
        }
    }
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("start_key", &self.start_key)
            .field("end_key", &self.end_key)
            .field("start_key_doc_id", &self.start_key_doc_id)
            .field("end_key_doc_id", &self.end_key_doc_id)
            .field("inclusive_end", &self.inclusive_end)
            .field("descending", &self.descending)
            .field("keys", &self.keys)
            .field("group", &self.group)
            .field("group_level", &self.group_level)
            .field("reduce", &self.reduce)
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .field("prefix_match_level", &self.prefix_match_level)
            .field("include_docs", &self.include_docs)
            .field("index_update_mode", &self.index_update_mode)
            .field("post_filter", &self.post_filter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl QueryOptions {
    /// Whether grouping was requested in any form.
    pub fn grouped(&self) -> bool {
        self.group || self.group_level > 0
    }
}
