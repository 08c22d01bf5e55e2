use crate::error::{CoreError, CoreResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

// Canonical JSON used for journal hashing and report exports:
// - keys sorted lexicographically, recursively
// - no insignificant whitespace
// - integers only; a float anywhere in the tree is rejected
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    let normalized = normalize_value(v)?;
    let s = serde_json::to_string(&normalized)?;
    Ok(s.into_bytes())
}

pub fn to_canonical_string<T: Serialize>(value: &T) -> CoreResult<String> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes)
        .map_err(|e| CoreError::DeterminismViolation(format!("canonical JSON not UTF-8: {e}")))
}

fn normalize_value(v: Value) -> CoreResult<Value> {
    match v {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, vv)| normalize_value(vv).map(|nv| (k, nv)))
                .collect::<CoreResult<_>>()?;
            // preserve_order may be enabled by a dependent crate; rebuild in sorted order.
            let mut out = serde_json::Map::new();
            for (k, vv) in sorted {
                out.insert(k, vv);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => Ok(Value::Array(
            arr.into_iter()
                .map(normalize_value)
                .collect::<CoreResult<Vec<_>>>()?,
        )),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(Value::Number(n))
            } else {
                Err(CoreError::DeterminismViolation(
                    "canonical JSON forbids non-integer numbers".to_string(),
                ))
            }
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let v = json!({"b": 1, "a": {"d": [ {"z": 1, "y": 2} ], "c": "x"}});
        let s = to_canonical_string(&v).unwrap();
        assert_eq!(s, r#"{"a":{"c":"x","d":[{"y":2,"z":1}]},"b":1}"#);
    }

    #[test]
    fn floats_are_rejected() {
        assert!(to_canonical_bytes(&json!({"cutoff": 0.8})).is_err());
    }
}
