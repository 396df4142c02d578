mod common;
use common::*;

use std::sync::Arc;

use burrow_db::{QueryOptions, QueryRow, Value};
use serde_json::json;

fn ids_of(rows: &[QueryRow]) -> Vec<Value> {
    rows.iter().map(|r| r.key.clone()).collect()
}

#[test]
fn all_docs_orders_ids_by_raw_bytes() {
    let db = test_db();
    put_docs(&db);

    let rows = db.all_docs(&QueryOptions::default()).unwrap();
    assert_eq!(
        ids_of(&rows),
        vec![
            json!("11111"),
            json!("22222"),
            json!("33333"),
            json!("44444"),
            json!("55555")
        ]
    );
    // Value carries the winning revision id and (empty) conflicts list.
    let rev = db.current_winning_revision("11111").unwrap();
    assert_eq!(rows[0].value.get("rev"), Some(&json!(rev.rev_id)));
    assert_eq!(rows[0].value.get("_conflicts"), Some(&json!([])));
}

#[test]
fn all_docs_range_with_inclusive_and_exclusive_end() {
    let db = test_db();
    put_docs(&db);

    let mut options = QueryOptions {
        start_key: Some(json!("2")),
        end_key: Some(json!("44444")),
        ..Default::default()
    };
    let rows = db.all_docs(&options).unwrap();
    assert_eq!(
        ids_of(&rows),
        vec![json!("22222"), json!("33333"), json!("44444")]
    );

    options.inclusive_end = false;
    let rows = db.all_docs(&options).unwrap();
    assert_eq!(ids_of(&rows), vec![json!("22222"), json!("33333")]);
}

#[test]
fn all_docs_descending() {
    let db = test_db();
    put_docs(&db);

    let rows = db
        .all_docs(&QueryOptions {
            start_key: Some(json!("44444")),
            end_key: Some(json!("2")),
            descending: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        ids_of(&rows),
        vec![json!("44444"), json!("33333"), json!("22222")]
    );
}

#[test]
fn all_docs_specific_keys_in_input_order() {
    let db = test_db();
    put_docs(&db);

    let rows = db
        .all_docs(&QueryOptions {
            keys: Some(vec![json!("33333"), json!("11111"), json!("99999")]),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].key, json!("33333"));
    assert_eq!(rows[1].key, json!("11111"));
    // Unknown id: error-marker row.
    assert_eq!(rows[2].key, json!("99999"));
    assert_eq!(rows[2].error.as_deref(), Some("not_found"));
}

#[test]
fn all_docs_excludes_deleted_documents() {
    let db = test_db();
    put_docs(&db);
    let rev = db.current_winning_revision("33333").unwrap();
    db.delete_document("33333", &rev.rev_id).unwrap();

    let rows = db.all_docs(&QueryOptions::default()).unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r.key != json!("33333")));
}

#[test]
fn all_docs_prefix_match_is_case_sensitive_on_raw_ids() {
    let db = test_db();
    for id in ["aaaaaaa", "a11zzzzz", "a七乃又直ந்த", "A1", "bcd", "01234"] {
        put_doc(&db, json!({"_id": id}));
    }

    let rows = db
        .all_docs(&QueryOptions {
            prefix_match_level: 1,
            start_key: Some(json!("a")),
            end_key: Some(json!("a")),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(
        ids_of(&rows),
        vec![json!("a11zzzzz"), json!("aaaaaaa"), json!("a七乃又直ந்த")]
    );
}

#[test]
fn all_docs_post_filter_over_hydrated_documents() {
    let db = test_db();
    put_doc(&db, json!({"_id": "1", "name": "Barry", "skin": "none"}));
    put_doc(&db, json!({"_id": "2", "name": "Terry", "skin": "furry"}));
    put_doc(&db, json!({"_id": "3", "name": "Wanda", "skin": "scaly"}));

    let rows = db
        .all_docs(&QueryOptions {
            include_docs: true,
            post_filter: Some(Arc::new(|row: &QueryRow| {
                row.doc
                    .as_ref()
                    .and_then(|d| d.get("skin"))
                    .and_then(Value::as_str)
                    .is_some_and(|skin| skin.ends_with('y'))
            })),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(ids_of(&rows), vec![json!("2"), json!("3")]);
}

#[test]
fn all_docs_rejects_keys_with_range_bounds() {
    let db = test_db();
    put_docs(&db);
    assert!(
        db.all_docs(&QueryOptions {
            keys: Some(vec![json!("11111")]),
            start_key: Some(json!("2")),
            ..Default::default()
        })
        .is_err()
    );
}
