//! Engine payload value tree and its JSON-safety normalizer.
//!
//! The engine's auxiliary "understanding" payload is built from maps,
//! sequences, scalars, and unordered unique string collections (its entity
//! and keyword extractors work with sets). Sets have no JSON representation,
//! so [`clean`] rewrites every set into an ordered sequence before the
//! payload crosses the wire.

use std::collections::{BTreeMap, HashSet};

use serde_json::{json, Value};

/// A value produced by the semantic engine.
///
/// `Set` is the one variant without a direct JSON counterpart; everything
/// else mirrors the JSON data model. Maps use `BTreeMap` so serialized key
/// order is stable.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<EngineValue>),
    Map(BTreeMap<String, EngineValue>),
    Set(HashSet<String>),
}

impl EngineValue {
    /// Shorthand for an empty map.
    pub fn map() -> BTreeMap<String, EngineValue> {
        BTreeMap::new()
    }

    /// True if this value or any nested value is a `Set`.
    pub fn contains_set(&self) -> bool {
        match self {
            EngineValue::Set(_) => true,
            EngineValue::Seq(items) => items.iter().any(EngineValue::contains_set),
            EngineValue::Map(entries) => entries.values().any(EngineValue::contains_set),
            _ => false,
        }
    }
}

/// Recursively rewrite unordered unique collections into ordered sequences.
///
/// Maps and sequences are rebuilt preserving key and element order; scalars
/// pass through unchanged; sets become sorted string sequences. Idempotent:
/// the output contains no `Set`, so a second pass is the identity.
pub fn clean(value: EngineValue) -> EngineValue {
    match value {
        EngineValue::Set(items) => {
            let mut ordered: Vec<String> = items.into_iter().collect();
            ordered.sort();
            EngineValue::Seq(ordered.into_iter().map(EngineValue::Str).collect())
        }
        EngineValue::Seq(items) => EngineValue::Seq(items.into_iter().map(clean).collect()),
        EngineValue::Map(entries) => EngineValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, clean(v)))
                .collect(),
        ),
        scalar => scalar,
    }
}

impl From<EngineValue> for Value {
    /// Convert a cleaned value into JSON. A `Set` reaching this conversion
    /// is serialized as a sorted array, same as running [`clean`] first.
    fn from(value: EngineValue) -> Value {
        match value {
            EngineValue::Null => Value::Null,
            EngineValue::Bool(b) => Value::Bool(b),
            EngineValue::Int(i) => json!(i),
            EngineValue::Float(f) => json!(f),
            EngineValue::Str(s) => Value::String(s),
            EngineValue::Seq(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            EngineValue::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            EngineValue::Set(items) => {
                let mut ordered: Vec<String> = items.into_iter().collect();
                ordered.sort();
                Value::Array(ordered.into_iter().map(Value::String).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_set(items: &[&str]) -> EngineValue {
        EngineValue::Set(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_clean_converts_set_to_sequence() {
        let cleaned = clean(entity_set(&["rent", "food"]));
        match cleaned {
            EngineValue::Seq(items) => {
                assert_eq!(
                    items,
                    vec![
                        EngineValue::Str("food".to_string()),
                        EngineValue::Str("rent".to_string())
                    ]
                );
            }
            other => panic!("expected Seq, got {other:?}"),
        }
    }

    #[test]
    fn test_clean_recurses_into_maps_and_sequences() {
        let mut understanding = EngineValue::map();
        understanding.insert("intent".to_string(), EngineValue::Str("spending_summary".into()));
        understanding.insert("entities".to_string(), entity_set(&["rent", "food"]));
        understanding.insert(
            "signals".to_string(),
            EngineValue::Seq(vec![entity_set(&["spent"]), EngineValue::Int(3)]),
        );
        let cleaned = clean(EngineValue::Map(understanding));

        assert!(!cleaned.contains_set());
        let json: Value = cleaned.into();
        assert_eq!(json["entities"], json!(["food", "rent"]));
        assert_eq!(json["signals"][0], json!(["spent"]));
        assert_eq!(json["signals"][1], json!(3));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut inner = EngineValue::map();
        inner.insert("entities".to_string(), entity_set(&["food", "rent", "travel"]));
        let value = EngineValue::Seq(vec![EngineValue::Map(inner), EngineValue::Null]);

        let once = clean(value);
        let twice = clean(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clean_is_identity_without_sets() {
        let mut entries = EngineValue::map();
        entries.insert("confidence".to_string(), EngineValue::Float(0.92));
        entries.insert(
            "terms".to_string(),
            EngineValue::Seq(vec![EngineValue::Str("budget".into())]),
        );
        let value = EngineValue::Map(entries);

        assert_eq!(clean(value.clone()), value);
    }

    #[test]
    fn test_scalars_pass_through() {
        for scalar in [
            EngineValue::Null,
            EngineValue::Bool(true),
            EngineValue::Int(-7),
            EngineValue::Float(1.5),
            EngineValue::Str("hello".into()),
        ] {
            assert_eq!(clean(scalar.clone()), scalar);
        }
    }

    #[test]
    fn test_json_conversion_orders_set_members() {
        let json: Value = entity_set(&["rent", "food"]).into();
        assert_eq!(json, json!(["food", "rent"]));
    }
}
