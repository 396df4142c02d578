use serde_json::Value;

use crate::compare::{Collation, case_weight, primary_weight};

// ── Type tags ───────────────────────────────────────────────
//
// One tag byte per type, spaced so byte order matches the collation
// precedence of the active mode. Composite terminators use 0x00, which is
// strictly below every tag, so a shorter composite sorts before any
// extension of it.

const TERM: u8 = 0x00;

fn type_tag(mode: Collation, v: &Value) -> u8 {
    match mode {
        Collation::Json => match v {
            Value::Null => 0x10,
            Value::Bool(false) => 0x14,
            Value::Bool(true) => 0x18,
            Value::Number(_) => 0x1c,
            Value::String(_) => 0x20,
            Value::Array(_) => 0x24,
            Value::Object(_) => 0x28,
        },
        Collation::Raw => match v {
            Value::Number(_) => 0x10,
            Value::Bool(false) => 0x14,
            Value::Null => 0x18,
            Value::Bool(true) => 0x1c,
            Value::Array(_) => 0x20,
            Value::String(_) => 0x24,
            Value::Object(_) => 0x28,
        },
    }
}

/// Encode an f64 so that byte-level lexicographic comparison matches
/// numeric ordering: positive values flip the sign bit, negative values
/// flip all bits.
#[inline]
fn encode_f64_sortable(f: f64) -> [u8; 8] {
    let bits = f.to_bits();
    let encoded = if (bits & 0x8000_0000_0000_0000) != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000_0000_0000
    };
    encoded.to_be_bytes()
}

/// Order-preserving byte encoding of a value under a collation mode.
///
/// `sort_key(m, a) < sort_key(m, b)` iff `compare(m, a, b) == Less`, and no
/// sort key is a strict byte prefix of a different value's sort key — so
/// arbitrary bytes may be appended (doc id, ordinal) without disturbing
/// relative order between distinct keys.
pub fn sort_key(mode: Collation, v: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(mode, v, &mut out);
    out
}

fn write_value(mode: Collation, v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Null | Value::Bool(_) => out.push(type_tag(mode, v)),
        Value::Number(n) => {
            out.push(type_tag(mode, v));
            out.extend_from_slice(&encode_f64_sortable(n.as_f64().unwrap_or(0.0)));
        }
        Value::String(s) => write_string(mode, s, out),
        Value::Array(items) => {
            out.push(type_tag(mode, v));
            for item in items {
                write_value(mode, item, out);
            }
            out.push(TERM);
        }
        Value::Object(entries) => {
            out.push(type_tag(mode, v));
            for (key, val) in entries {
                write_string(mode, key, out);
                write_value(mode, val, out);
            }
            out.push(TERM);
        }
    }
}

fn write_string(mode: Collation, s: &str, out: &mut Vec<u8>) {
    out.push(match mode {
        Collation::Json => 0x20,
        Collation::Raw => 0x24,
    });
    match mode {
        Collation::Json => {
            // Primary section: class byte + codepoint per folded character,
            // then the case weights as the tiebreak section. All weight
            // bytes are >= 0x01, keeping TERM strictly lowest.
            for c in s.chars().flat_map(char::to_lowercase) {
                let (class, cp) = primary_weight(c);
                out.push(class);
                push_codepoint(cp, out);
            }
            out.push(TERM);
            for c in s.chars() {
                out.push(case_weight(c));
            }
            out.push(TERM);
        }
        Collation::Raw => {
            for c in s.chars() {
                out.push(0x01);
                push_codepoint(c as u32, out);
            }
            out.push(TERM);
        }
    }
}

#[inline]
fn push_codepoint(cp: u32, out: &mut Vec<u8>) {
    // Codepoints fit in 3 bytes (max U+10FFFF).
    out.push((cp >> 16) as u8);
    out.push((cp >> 8) as u8);
    out.push(cp as u8);
}

/// Byte prefix shared by every key whose first `level` components match the
/// first `level` components of `v`.
///
/// For arrays the components are elements; for strings, characters (compared
/// by primary weight, so JSON-mode string prefixes are case-insensitive, as
/// under the full collation). Scalars have a single component: the prefix is
/// the whole sort key. `level == 0` degenerates to the exact sort key.
pub fn prefix_key(mode: Collation, v: &Value, level: usize) -> Vec<u8> {
    if level == 0 {
        return sort_key(mode, v);
    }
    match v {
        Value::Array(items) => {
            let mut out = vec![type_tag(mode, v)];
            for item in items.iter().take(level) {
                write_value(mode, item, &mut out);
            }
            out
        }
        Value::String(s) => {
            let mut out = vec![match mode {
                Collation::Json => 0x20,
                Collation::Raw => 0x24,
            }];
            match mode {
                Collation::Json => {
                    for c in s.chars().take(level).flat_map(char::to_lowercase) {
                        let (class, cp) = primary_weight(c);
                        out.push(class);
                        push_codepoint(cp, &mut out);
                    }
                }
                Collation::Raw => {
                    for c in s.chars().take(level) {
                        out.push(0x01);
                        push_codepoint(c as u32, &mut out);
                    }
                }
            }
            out
        }
        _ => sort_key(mode, v),
    }
}

/// Smallest byte string greater than every string with the given prefix,
/// or `None` if no such bound exists (all bytes 0xff).
pub fn successor(mut prefix: Vec<u8>) -> Option<Vec<u8>> {
    while let Some(&last) = prefix.last() {
        if last == 0xff {
            prefix.pop();
        } else {
            *prefix.last_mut().unwrap() = last + 1;
            return Some(prefix);
        }
    }
    None
}
