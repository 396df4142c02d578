use std::cmp::Ordering;

use serde_json::Value;

/// Collation mode for view keys.
///
/// `Json` is the default CouchDB-style ordering; `Raw` compares strings and
/// booleans by plain codepoint/tag order and sorts numbers first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collation {
    #[default]
    Json,
    Raw,
}

/// Total order over JSON values under the given collation mode.
///
/// Consistent and transitive for all inputs: numbers compare as f64 (JSON
/// has no NaN), so there is no incomparable pair.
pub fn compare(mode: Collation, a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(mode, a).cmp(&type_rank(mode, b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match mode {
            Collation::Json => unicode_cmp(x, y),
            Collation::Raw => x.cmp(y),
        },
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let ord = compare(mode, ex, ey);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            // All shared elements equal: the shorter array sorts first.
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
                let key_ord = match mode {
                    Collation::Json => unicode_cmp(kx, ky),
                    Collation::Raw => kx.cmp(ky),
                };
                if key_ord != Ordering::Equal {
                    return key_ord;
                }
                let ord = compare(mode, vx, vy);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => unreachable!("equal type ranks imply equal variants"),
    }
}

fn type_rank(mode: Collation, v: &Value) -> u8 {
    match mode {
        Collation::Json => match v {
            Value::Null => 0,
            Value::Bool(false) => 1,
            Value::Bool(true) => 2,
            Value::Number(_) => 3,
            Value::String(_) => 4,
            Value::Array(_) => 5,
            Value::Object(_) => 6,
        },
        Collation::Raw => match v {
            Value::Number(_) => 0,
            Value::Bool(false) => 1,
            Value::Null => 2,
            Value::Bool(true) => 3,
            Value::Array(_) => 4,
            Value::String(_) => 5,
            Value::Object(_) => 6,
        },
    }
}

// ── Unicode-aware string ordering ───────────────────────────

/// Primary weight of one case-folded character: punctuation, symbols and
/// control characters sort as a class before alphanumerics; within a class,
/// codepoint order.
pub(crate) fn primary_weight(c: char) -> (u8, u32) {
    let class = if c.is_alphanumeric() { 3 } else { 2 };
    (class, c as u32)
}

/// Case weight: lowercase (and caseless) before uppercase. Only consulted
/// when primary weights are fully equal.
pub(crate) fn case_weight(c: char) -> u8 {
    if c.is_uppercase() { 2 } else { 1 }
}

/// JSON-mode string comparison: case-insensitive primary pass with
/// punctuation before alphanumerics, case as the final tiebreak. A string
/// that is a strict prefix of another sorts first.
fn unicode_cmp(a: &str, b: &str) -> Ordering {
    let pa = a.chars().flat_map(char::to_lowercase).map(primary_weight);
    let pb = b.chars().flat_map(char::to_lowercase).map(primary_weight);
    pa.cmp(pb)
        .then_with(|| {
            a.chars()
                .map(case_weight)
                .cmp(b.chars().map(case_weight))
        })
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    /// The canonical JSON-mode ordering table, ascending.
    pub(crate) fn json_table() -> Vec<Value> {
        vec![
            json!(null),
            json!(false),
            json!(true),
            json!(0),
            json!(2.5),
            json!(10),
            json!(" "),
            json!("_"),
            json!("~"),
            json!("a"),
            json!("A"),
            json!("aa"),
            json!("b"),
            json!("B"),
            json!("ba"),
            json!("bb"),
            json!(["a"]),
            json!(["b"]),
            json!(["b", "c"]),
            json!(["b", "c", "a"]),
            json!(["b", "d"]),
            json!(["b", "d", "e"]),
        ]
    }

    /// The same value set in Raw-mode order.
    pub(crate) fn raw_table() -> Vec<Value> {
        vec![
            json!(0),
            json!(2.5),
            json!(10),
            json!(false),
            json!(null),
            json!(true),
            json!(["a"]),
            json!(["b"]),
            json!(["b", "c"]),
            json!(["b", "c", "a"]),
            json!(["b", "d"]),
            json!(["b", "d", "e"]),
            json!(" "),
            json!("A"),
            json!("B"),
            json!("_"),
            json!("a"),
            json!("aa"),
            json!("b"),
            json!("ba"),
            json!("bb"),
            json!("~"),
        ]
    }
}
