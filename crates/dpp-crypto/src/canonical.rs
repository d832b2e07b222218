//! Canonical JSON encoding (`dpp-canonical-json/1`).
//!
//! Two independent implementations following these rules produce identical
//! bytes for identical data:
//!
//! 1. UTF-8 output, no whitespace between tokens.
//! 2. Object keys sorted by byte-wise lexicographic order, at every depth.
//! 3. Arrays keep their element order.
//! 4. `null`, `true`, `false` as literals.
//! 5. Integers in minimal decimal form; other numbers in the shortest
//!    round-trip form (`1.5`, `1e21`).
//! 6. Strings escape `"`, `\`, and control characters (`\b \f \n \r \t`,
//!    otherwise `\u00xx` lowercase). Everything else is raw UTF-8.
//!
//! Anchored hashes are permanent, so these rules never change. A new rule set
//! gets a new name and a new hasher domain.

use std::fmt::Write as _;

use serde_json::{Number, Value};

/// Name of the rule set implemented here.
pub const CANONICAL_FORM: &str = "dpp-canonical-json/1";

/// Encode `value` canonically.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

/// Canonical encoding as a string, for diagnostics and verifiers.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_number(n: &Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
    } else if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
    } else {
        // serde_json renders f64 through ryu: shortest round-trip form.
        let _ = write!(out, "{n}");
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_at_every_depth() {
        let value = json!({"b": 1, "a": {"z": true, "m": null}});
        assert_eq!(canonical_string(&value), r#"{"a":{"m":null,"z":true},"b":1}"#);
    }

    #[test]
    fn bytes_and_string_forms_agree() {
        let value = json!({"log": [{"id": "e1", "sev": 2}], "k": "v"});
        assert_eq!(canonicalize(&value), canonical_string(&value).as_bytes());
        assert_eq!(canonicalize(&value), br#"{"k":"v","log":[{"id":"e1","sev":2}]}"#.to_vec());
    }

    #[test]
    fn arrays_keep_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonical_string(&value), "[3,1,2]");
    }

    #[test]
    fn numbers_use_minimal_forms() {
        let value = json!({"i": -42, "u": 18446744073709551615u64, "f": 1.5, "g": 2.0});
        assert_eq!(
            canonical_string(&value),
            r#"{"f":1.5,"g":2.0,"i":-42,"u":18446744073709551615}"#
        );
    }

    #[test]
    fn strings_escape_controls_only() {
        let value = json!("tab\there \"quoted\" \\ é \u{1}");
        assert_eq!(
            canonical_string(&value),
            "\"tab\\there \\\"quoted\\\" \\\\ é \\u0001\""
        );
    }

    #[test]
    fn input_key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": {"b": 2, "a": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": {"a": 3, "b": 2}, "x": 1}"#).unwrap();
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn no_insignificant_whitespace() {
        let value: Value = serde_json::from_str("{ \"a\" : [ 1 , 2 ] }").unwrap();
        assert_eq!(canonical_string(&value), r#"{"a":[1,2]}"#);
    }
}
