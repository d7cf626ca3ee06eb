//! Content fingerprints for change detection.
//!
//! A fingerprint is the SHA-256 hex digest of a canonical, type-tagged
//! encoding of a JSON value:
//!
//! - object keys are sorted, so field insertion order never matters
//! - array elements are sorted by their own canonical encoding
//! - every scalar carries its JSON type, so `1`, `"1"` and `true` never
//!   collide (no coercion between types)
//! - numbers compare by value: an integral float such as `1.0` encodes
//!   exactly like the integer `1`
//!
//! Tasks compare fingerprints taken before and after a transformation to
//! decide whether a document needs writing at all.

use std::fmt::Write;

use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

use crate::document::Document;

/// Builds the canonical encoding of `value`.
#[must_use]
pub fn canonical(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => {
            let _ = write!(out, "bool:{flag}");
        }
        Value::Number(number) => write_number(number, out),
        // JSON-quoted so separators inside strings stay unambiguous.
        Value::String(_) => {
            let _ = write!(out, "string:{value}");
        }
        Value::Array(items) => {
            let mut encoded: Vec<String> = items.iter().map(canonical).collect();
            encoded.sort_unstable();
            out.push_str("array:[");
            out.push_str(&encoded.join(","));
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|left, right| left.0.cmp(right.0));
            out.push_str("object:{");
            for (index, (key, item)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}:", Value::String(key.clone()));
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

/// Writes integral floats as integers so that `1.0` and `1` agree.
fn write_number(number: &Number, out: &mut String) {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.is_finite() && float.fract() == 0.0 => {
            // -0.0 and 0.0 are the same number.
            let float = if float == 0.0 { 0.0 } else { float };
            let _ = write!(out, "number:{float:.0}");
        }
        _ => {
            let _ = write!(out, "number:{number}");
        }
    }
}

/// SHA-256 hex digest of the canonical encoding of `value`.
#[must_use]
pub fn fingerprint(value: &Value) -> String {
    let digest = Sha256::digest(canonical(value).as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

/// Fingerprint of a document, reserved fields included.
#[must_use]
pub fn document_fingerprint(doc: &Document) -> String {
    fingerprint(&doc.to_value())
}
