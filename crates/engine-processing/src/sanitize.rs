//! Normalizes cell values into wire-safe primitives before they leave the process.
//!
//! Nothing here fails: a value that cannot be represented becomes null and the
//! data-quality fallout is reported later by the classifier.

use model::{core::value::Value, records::record::Record};

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

pub fn sanitize_record(record: &Record) -> Record {
    let mut out = record.clone();
    for field in &mut out.fields {
        field.value = sanitize_value(&field.value);
    }
    out
}

pub fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Null | Value::Boolean(_) | Value::Int(_) => value.clone(),
        Value::Float(f) => sanitize_float(*f),
        Value::String(s) => sanitize_text(s),
        Value::List(items) => Value::List(items.iter().map(sanitize_value).collect()),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_value(v)))
                .collect(),
        ),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => sanitize_text(text),
            Err(_) => Value::Null,
        },
    }
}

fn sanitize_float(f: f64) -> Value {
    if !f.is_finite() {
        Value::Null
    } else if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

fn sanitize_text(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        Value::Null
    } else {
        Value::String(trimmed.to_string())
    }
}

/// Tri-state coercion for boolean-typed columns.
///
/// `1/true/yes/y/t` map to true, `0/false/no/n/f` to false, anything else
/// (including empty) to null.
pub fn coerce_bool(value: &Value) -> Value {
    match value {
        Value::Boolean(_) => value.clone(),
        Value::Int(1) => Value::Boolean(true),
        Value::Int(0) => Value::Boolean(false),
        Value::Float(f) if *f == 1.0 => Value::Boolean(true),
        Value::Float(f) if *f == 0.0 => Value::Boolean(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "y" | "t" => Value::Boolean(true),
            "0" | "false" | "no" | "n" | "f" => Value::Boolean(false),
            _ => Value::Null,
        },
        _ => Value::Null,
    }
}

/// Applies [`coerce_bool`] to every listed column present in `record`.
pub fn apply_boolean_coercion<S: AsRef<str>>(record: &mut Record, boolean_fields: &[S]) {
    for name in boolean_fields {
        if let Some(slot) = record.get_mut(name.as_ref()) {
            *slot = coerce_bool(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn messy() -> Record {
        let mut nested = BTreeMap::new();
        nested.insert("inner".to_string(), Value::Float(f64::INFINITY));
        nested.insert("text".to_string(), Value::from("  x "));

        Record::from_pairs([
            ("nan", Value::Float(f64::NAN)),
            ("marker", Value::from("nan")),
            ("empty", Value::from("   ")),
            ("padded", Value::from("  Acme ")),
            ("whole", Value::Float(42.0)),
            ("fraction", Value::Float(1.5)),
            ("list", Value::List(vec![Value::Float(f64::NEG_INFINITY), Value::Int(1)])),
            ("map", Value::Map(nested)),
            ("bytes", Value::Bytes(vec![0xff, 0xfe])),
        ])
    }

    #[test]
    fn test_sanitize_normalizes_values() {
        let clean = sanitize_record(&messy());

        assert_eq!(clean.get_value("nan"), Value::Null);
        assert_eq!(clean.get_value("marker"), Value::Null);
        assert_eq!(clean.get_value("empty"), Value::Null);
        assert_eq!(clean.get_value("padded"), Value::from("Acme"));
        assert_eq!(clean.get_value("whole"), Value::Int(42));
        assert_eq!(clean.get_value("fraction"), Value::Float(1.5));
        assert_eq!(
            clean.get_value("list"),
            Value::List(vec![Value::Null, Value::Int(1)])
        );
        assert_eq!(clean.get_value("bytes"), Value::Null);

        let Value::Map(map) = clean.get_value("map") else {
            panic!("map expected");
        };
        assert_eq!(map["inner"], Value::Null);
        assert_eq!(map["text"], Value::from("x"));
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize_record(&messy());
        assert_eq!(sanitize_record(&once), once);
    }

    #[test]
    fn test_boolean_coercion_table() {
        for truthy in ["1", "true", "YES", " y ", "t"] {
            assert_eq!(coerce_bool(&Value::from(truthy)), Value::Boolean(true));
        }
        for falsy in ["0", "False", "no", "n", "F"] {
            assert_eq!(coerce_bool(&Value::from(falsy)), Value::Boolean(false));
        }
        assert_eq!(coerce_bool(&Value::from("")), Value::Null);
        assert_eq!(coerce_bool(&Value::from("maybe")), Value::Null);
        assert_eq!(coerce_bool(&Value::Int(1)), Value::Boolean(true));
        assert_eq!(coerce_bool(&Value::Float(0.0)), Value::Boolean(false));
        assert_eq!(coerce_bool(&Value::Int(7)), Value::Null);
        assert_eq!(coerce_bool(&Value::Null), Value::Null);
    }

    #[test]
    fn test_apply_boolean_coercion_touches_listed_columns_only() {
        let mut record = Record::from_pairs([("Active__c", "yes"), ("Name", "yes")]);
        apply_boolean_coercion(&mut record, &["Active__c", "Missing__c"]);

        assert_eq!(record.get_value("Active__c"), Value::Boolean(true));
        assert_eq!(record.get_value("Name"), Value::from("yes"));
    }
}
