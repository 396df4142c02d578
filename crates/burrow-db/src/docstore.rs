use std::collections::BTreeMap;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::RwLock;

use burrow_collate::{Map, Value};
use serde_json::json;

use crate::error::DbError;

/// Immutable snapshot of a document at one point, tagged with the global
/// sequence assigned at mutation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub doc_id: String,
    pub rev_id: String,
    pub sequence: u64,
    pub deleted: bool,
    pub content: Map<String, Value>,
}

/// One entry of the changes feed: a document whose latest mutation exceeds
/// the requested watermark, together with its *current winning* revision
/// (which may be older than the mutation that triggered the entry).
#[derive(Debug, Clone)]
pub(crate) struct DocChange {
    pub doc_id: String,
    pub winning: Option<Revision>,
    pub latest_sequence: u64,
}

struct StoredRev {
    rev_id: String,
    parent: Option<String>,
    deleted: bool,
    sequence: u64,
    content: Map<String, Value>,
}

struct DocRecord {
    revs: Vec<StoredRev>,
}

impl DocRecord {
    fn leaves(&self) -> Vec<&StoredRev> {
        self.revs
            .iter()
            .filter(|r| {
                !self
                    .revs
                    .iter()
                    .any(|c| c.parent.as_deref() == Some(r.rev_id.as_str()))
            })
            .collect()
    }

    /// The winning revision: non-deleted leaves beat deleted ones, then the
    /// highest (generation, suffix) wins.
    fn winner(&self) -> Option<&StoredRev> {
        self.leaves()
            .into_iter()
            .max_by(|a, b| {
                b.deleted
                    .cmp(&a.deleted)
                    .then_with(|| rev_ord(&a.rev_id).cmp(&rev_ord(&b.rev_id)))
            })
    }

    fn latest_sequence(&self) -> u64 {
        self.revs.iter().map(|r| r.sequence).max().unwrap_or(0)
    }

    fn has_rev(&self, rev_id: &str) -> bool {
        self.revs.iter().any(|r| r.rev_id == rev_id)
    }
}

fn generation(rev_id: &str) -> u64 {
    rev_id
        .split_once('-')
        .and_then(|(g, _)| g.parse().ok())
        .unwrap_or(0)
}

fn rev_ord(rev_id: &str) -> (u64, &str) {
    match rev_id.split_once('-') {
        Some((g, s)) => (g.parse().unwrap_or(0), s),
        None => (0, rev_id),
    }
}

fn to_revision(doc_id: &str, r: &StoredRev) -> Revision {
    Revision {
        doc_id: doc_id.to_string(),
        rev_id: r.rev_id.clone(),
        sequence: r.sequence,
        deleted: r.deleted,
        content: r.content.clone(),
    }
}

/// Document content as handed to map functions and `include_docs`
/// hydration: the revision's properties plus injected `_id` and `_rev`.
pub(crate) fn with_meta(rev: &Revision) -> Map<String, Value> {
    let mut content = rev.content.clone();
    content.insert("_id".to_string(), json!(rev.doc_id));
    content.insert("_rev".to_string(), json!(rev.rev_id));
    content
}

struct DocsInner {
    docs: BTreeMap<String, DocRecord>,
    sequence: u64,
}

/// The revision-tree collaborator: documents, conflict history, winning
/// revision selection, and the global sequence counter. The view layer
/// consumes only the pull interface (`current_winning_revision`,
/// `changes_since`).
pub(crate) struct DocStore {
    inner: RwLock<DocsInner>,
    ids: RandomState,
}

impl DocStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(DocsInner {
                docs: BTreeMap::new(),
                sequence: 0,
            }),
            ids: RandomState::new(),
        }
    }

    pub fn current_sequence(&self) -> u64 {
        self.inner.read().unwrap().sequence
    }

    pub fn generate_id(&self) -> String {
        let seq = self.current_sequence();
        let mut h = self.ids.build_hasher();
        seq.hash(&mut h);
        format!("{:016x}", h.finish())
    }

    /// Insert a new revision. With no parent the document must not already
    /// have a live winner; with a parent, the parent must be the current
    /// winner unless `allow_conflict` permits branching from any known
    /// revision.
    pub fn put(
        &self,
        doc_id: &str,
        prev_rev_id: Option<&str>,
        mut content: Map<String, Value>,
        deleted: bool,
        allow_conflict: bool,
    ) -> Result<Revision, DbError> {
        let mut inner = self.inner.write().unwrap();

        let (gen_num, parent) = {
            let record = inner.docs.get(doc_id);
            match prev_rev_id {
                None => match record.and_then(DocRecord::winner) {
                    Some(w) if !w.deleted => {
                        return Err(DbError::Conflict(format!(
                            "document already exists: {doc_id}"
                        )));
                    }
                    // Recreating a deleted document extends its winning
                    // (deleted) branch.
                    Some(w) => (generation(&w.rev_id) + 1, Some(w.rev_id.clone())),
                    None => (1, None),
                },
                Some(prev) => {
                    let record = record
                        .ok_or_else(|| DbError::NotFound(format!("document {doc_id}")))?;
                    if !record.has_rev(prev) {
                        return Err(DbError::Conflict(format!(
                            "unknown parent revision {prev} for {doc_id}"
                        )));
                    }
                    if !allow_conflict
                        && record.winner().map(|w| w.rev_id.as_str()) != Some(prev)
                    {
                        return Err(DbError::Conflict(format!(
                            "stale parent revision {prev} for {doc_id}"
                        )));
                    }
                    (generation(prev) + 1, Some(prev.to_string()))
                }
            }
        };

        inner.sequence += 1;
        let sequence = inner.sequence;
        content.remove("_id");
        content.remove("_rev");

        let mut h = self.ids.build_hasher();
        doc_id.hash(&mut h);
        sequence.hash(&mut h);
        deleted.hash(&mut h);
        let rev_id = format!("{gen_num}-{:012x}", h.finish() & 0xffff_ffff_ffff);

        let stored = StoredRev {
            rev_id: rev_id.clone(),
            parent,
            deleted,
            sequence,
            content: content.clone(),
        };
        inner
            .docs
            .entry(doc_id.to_string())
            .or_insert_with(|| DocRecord { revs: Vec::new() })
            .revs
            .push(stored);

        Ok(Revision {
            doc_id: doc_id.to_string(),
            rev_id,
            sequence,
            deleted,
            content,
        })
    }

    /// Replication-style insertion of a leaf with a caller-chosen revision
    /// id; used to introduce conflicts.
    pub fn force_insert(
        &self,
        doc_id: &str,
        rev_id: &str,
        mut content: Map<String, Value>,
        deleted: bool,
    ) -> Result<Revision, DbError> {
        let mut inner = self.inner.write().unwrap();
        if inner.docs.get(doc_id).is_some_and(|r| r.has_rev(rev_id)) {
            return Err(DbError::Conflict(format!(
                "revision already exists: {doc_id} {rev_id}"
            )));
        }
        inner.sequence += 1;
        let sequence = inner.sequence;
        content.remove("_id");
        content.remove("_rev");
        let stored = StoredRev {
            rev_id: rev_id.to_string(),
            parent: None,
            deleted,
            sequence,
            content: content.clone(),
        };
        inner
            .docs
            .entry(doc_id.to_string())
            .or_insert_with(|| DocRecord { revs: Vec::new() })
            .revs
            .push(stored);
        Ok(Revision {
            doc_id: doc_id.to_string(),
            rev_id: rev_id.to_string(),
            sequence,
            deleted,
            content,
        })
    }

    pub fn current_winning_revision(&self, doc_id: &str) -> Option<Revision> {
        let inner = self.inner.read().unwrap();
        inner.docs.get(doc_id)?.winner().map(|w| to_revision(doc_id, w))
    }

    /// Documents mutated after `since`, ascending by each document's latest
    /// mutation sequence.
    pub fn changes_since(&self, since: u64) -> Vec<DocChange> {
        let inner = self.inner.read().unwrap();
        let mut changes: Vec<DocChange> = inner
            .docs
            .iter()
            .filter_map(|(id, record)| {
                let latest = record.latest_sequence();
                (latest > since).then(|| DocChange {
                    doc_id: id.clone(),
                    winning: record.winner().map(|w| to_revision(id, w)),
                    latest_sequence: latest,
                })
            })
            .collect();
        changes.sort_by_key(|c| c.latest_sequence);
        changes
    }

    /// Non-winning live leaf revision ids of a document.
    pub fn conflicts(&self, doc_id: &str) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let Some(record) = inner.docs.get(doc_id) else {
            return Vec::new();
        };
        let winner = record.winner().map(|w| w.rev_id.clone());
        record
            .leaves()
            .into_iter()
            .filter(|r| !r.deleted && Some(&r.rev_id) != winner.as_ref())
            .map(|r| r.rev_id.clone())
            .collect()
    }

    /// Current content of a live document, with `_id`/`_rev` injected.
    pub fn document_content(&self, doc_id: &str) -> Option<Value> {
        let rev = self.current_winning_revision(doc_id)?;
        if rev.deleted {
            return None;
        }
        Some(Value::Object(with_meta(&rev)))
    }

    pub fn document_count(&self) -> usize {
        let inner = self.inner.read().unwrap();
        inner
            .docs
            .values()
            .filter(|r| r.winner().is_some_and(|w| !w.deleted))
            .count()
    }

    /// Live documents in id order, with their winning revisions.
    pub fn live_docs(&self) -> Vec<(String, Revision)> {
        let inner = self.inner.read().unwrap();
        inner
            .docs
            .iter()
            .filter_map(|(id, record)| {
                let w = record.winner()?;
                (!w.deleted).then(|| (id.clone(), to_revision(id, w)))
            })
            .collect()
    }
}
