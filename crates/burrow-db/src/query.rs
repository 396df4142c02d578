use std::cmp::Ordering;

use burrow_collate::{Collation, Value, compare};
use burrow_engine::{IndexRow, IndexStore, RangeSpec, ScanBounds};
use burrow_query::{QueryOptions, QueryRow};
use burrow_store::Store;

use crate::docstore::DocStore;
use crate::error::DbError;
use crate::mapred::Reducer;
use crate::view::View;

/// Resolve QueryOptions into an ordered, grouped, reduced, filtered,
/// paginated row sequence. Read-only over the index store.
pub(crate) fn run<S: Store>(
    view: &View<S>,
    options: &QueryOptions,
) -> Result<Vec<QueryRow>, DbError> {
    let reducer = view.state.reducer.read().unwrap().clone();
    validate(options, reducer.is_some())?;

    let mode = view.collation();
    let txn = view.inner.store.begin(true)?;
    let index = IndexStore::open(&txn, view.name(), mode)?;

    let raw = match &options.keys {
        Some(keys) => index.scan_keys(keys)?,
        None => index.scan(&ScanBounds::resolve(
            mode,
            &RangeSpec {
                start_key: options.start_key.as_ref(),
                end_key: options.end_key.as_ref(),
                start_key_doc_id: options.start_key_doc_id.as_deref(),
                end_key_doc_id: options.end_key_doc_id.as_deref(),
                inclusive_end: options.inclusive_end,
                descending: options.descending,
                prefix_match_level: options.prefix_match_level,
            },
        ))?,
    };

    let reduce = options
        .reduce
        .unwrap_or(reducer.is_some() && options.keys.is_none());

    let rows = if options.grouped() {
        group(mode, raw, options, reducer.as_deref())
    } else if reduce {
        match reducer {
            Some(reducer) if !raw.is_empty() => {
                let (keys, values): (Vec<Value>, Vec<Value>) =
                    raw.into_iter().map(|r| (r.key, r.value)).unzip();
                vec![QueryRow::reduced(
                    Value::Null,
                    reducer.reduce(&keys, &values, false),
                )]
            }
            _ => Vec::new(),
        }
    } else {
        raw.into_iter()
            .map(|r| QueryRow::mapped(r.key, r.value, r.doc_id, r.sequence))
            .collect()
    };

    Ok(finalize(rows, options, &view.inner.docs))
}

fn validate(options: &QueryOptions, has_reducer: bool) -> Result<(), DbError> {
    if options.keys.is_some()
        && (options.start_key.is_some()
            || options.end_key.is_some()
            || options.start_key_doc_id.is_some()
            || options.end_key_doc_id.is_some())
    {
        return Err(DbError::InvalidQueryOptions(
            "keys is mutually exclusive with key-range bounds".to_string(),
        ));
    }
    if options.grouped() && options.reduce == Some(false) {
        return Err(DbError::InvalidQueryOptions(
            "grouping requires reduction".to_string(),
        ));
    }
    if options.reduce == Some(true) && !has_reducer && !options.grouped() {
        return Err(DbError::InvalidQueryOptions(
            "view has no reduce function".to_string(),
        ));
    }
    Ok(())
}

// ── Grouping ────────────────────────────────────────────────

fn group_key(options: &QueryOptions, key: &Value) -> Value {
    if !options.group
        && options.group_level > 0
        && let Value::Array(items) = key
    {
        return Value::Array(items.iter().take(options.group_level).cloned().collect());
    }
    key.clone()
}

/// Partition already-sorted rows into contiguous runs of equal group keys
/// and reduce each run independently. Without a reducer, each run yields an
/// error-marker row.
fn group(
    mode: Collation,
    raw: Vec<IndexRow>,
    options: &QueryOptions,
    reducer: Option<&dyn Reducer>,
) -> Vec<QueryRow> {
    let mut out = Vec::new();
    let mut run: Option<(Value, Vec<Value>, Vec<Value>)> = None;

    for row in raw {
        let gk = group_key(options, &row.key);
        match &mut run {
            Some((current, keys, values)) if compare(mode, current, &gk) == Ordering::Equal => {
                keys.push(row.key);
                values.push(row.value);
            }
            _ => {
                if let Some(done) = run.take() {
                    out.push(flush_group(done, reducer));
                }
                run = Some((gk, vec![row.key], vec![row.value]));
            }
        }
    }
    if let Some(done) = run.take() {
        out.push(flush_group(done, reducer));
    }
    out
}

fn flush_group(
    (key, keys, values): (Value, Vec<Value>, Vec<Value>),
    reducer: Option<&dyn Reducer>,
) -> QueryRow {
    match reducer {
        Some(reducer) => QueryRow::reduced(key, reducer.reduce(&keys, &values, false)),
        None => QueryRow::unreduced(key),
    }
}

// ── Hydration, filtering, pagination ────────────────────────

/// Shared tail of the pipeline: hydrate (`include_docs`), apply the post
/// filter, then skip and limit, in that order.
pub(crate) fn finalize(
    mut rows: Vec<QueryRow>,
    options: &QueryOptions,
    docs: &DocStore,
) -> Vec<QueryRow> {
    if options.include_docs {
        for row in &mut rows {
            let Some(doc_id) = row.doc_id.clone() else {
                continue;
            };
            // Linked-document convention: a value object with an `_id`
            // field hydrates the referenced document instead.
            let target = row
                .value
                .get("_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| doc_id.clone());
            row.doc = docs.document_content(&target);
            let conflicts = docs.conflicts(&doc_id);
            if !conflicts.is_empty() {
                row.conflicts = Some(conflicts);
            }
        }
    }

    if let Some(filter) = &options.post_filter {
        rows.retain(|row| filter(row));
    }

    rows.into_iter()
        .skip(options.skip)
        .take(options.limit.unwrap_or(usize::MAX))
        .collect()
}
