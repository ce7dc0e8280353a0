use serde_json::Value;

use crate::common::{DATE_KEY, ID_ATTRIBUTES, OID_KEY};
use crate::errors::{CorralError, CorralResult, ErrorKind};

/// Canonical attribute-string form of a JSON value.
///
/// Objects carrying an `"$oid"` collapse to that id, objects carrying a
/// `"$date"` keep the date's raw JSON form, any other object or array
/// becomes its compact JSON text. Strings lose their quotes, numbers and
/// booleans keep their written form, and null reads `"null"`.
pub fn canonical_string(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            if let Some(oid) = map.get(OID_KEY) {
                return match oid {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
            }
            if let Some(date) = map.get(DATE_KEY) {
                return date.to_string();
            }
            value.to_string()
        }
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The record id of a JSON object: its `id`, else its `_id`, each
/// canonicalized (so a `$oid` wrapper unwraps). Null, empty or missing
/// members give `None`.
pub fn record_id(record: &Value) -> Option<String> {
    let map = record.as_object()?;
    for key in ID_ATTRIBUTES {
        match map.get(key) {
            Some(Value::Null) | None => continue,
            Some(value) => {
                let id = canonical_string(value);
                if !id.is_empty() {
                    return Some(id);
                }
            }
        }
    }
    None
}

/// Parses a JSON array into the canonical string per element, for
/// attributes holding id lists.
pub fn json_array_to_strings(text: &str) -> CorralResult<Vec<String>> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(items) => Ok(items.iter().map(canonical_string).collect()),
        _ => {
            log::warn!("JSON is not an array: {}", text);
            Err(CorralError::new(
                "JSON is not an array",
                ErrorKind::ParseError,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_oid_objects_collapse_to_the_id() {
        assert_eq!(canonical_string(&json!({"$oid": "57cb4f4fa38ec106ca0ae982"})), "57cb4f4fa38ec106ca0ae982");
        assert_eq!(canonical_string(&json!({"$oid": 12})), "12");
    }

    #[test]
    fn test_date_objects_keep_raw_json_form() {
        assert_eq!(
            canonical_string(&json!({"$date": "2016-09-03T21:08:31.041Z"})),
            "\"2016-09-03T21:08:31.041Z\""
        );
        assert_eq!(
            canonical_string(&json!({"$date": {"$numberLong": "1472936911041"}})),
            "{\"$numberLong\":\"1472936911041\"}"
        );
    }

    #[test]
    fn test_plain_objects_and_arrays_compact() {
        assert_eq!(canonical_string(&json!({"a": 1, "b": "x"})), "{\"a\":1,\"b\":\"x\"}");
        assert_eq!(canonical_string(&json!(["a", 2])), "[\"a\",2]");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(canonical_string(&json!("hello")), "hello");
        assert_eq!(canonical_string(&json!(25)), "25");
        assert_eq!(canonical_string(&json!(10.5)), "10.5");
        assert_eq!(canonical_string(&json!(true)), "true");
        assert_eq!(canonical_string(&Value::Null), "null");
    }

    #[test]
    fn test_record_id_prefers_id_over_alt_id() {
        assert_eq!(record_id(&json!({"id": "a", "_id": "b"})), Some("a".to_string()));
        assert_eq!(record_id(&json!({"_id": "b"})), Some("b".to_string()));
    }

    #[test]
    fn test_record_id_unwraps_oid() {
        let record = json!({"_id": {"$oid": "57cb4f4fa38ec106ca0ae982"}});
        assert_eq!(record_id(&record), Some("57cb4f4fa38ec106ca0ae982".to_string()));
    }

    #[test]
    fn test_record_id_skips_null_and_empty() {
        assert_eq!(record_id(&json!({"id": null, "_id": "b"})), Some("b".to_string()));
        assert_eq!(record_id(&json!({"id": "", "_id": "b"})), Some("b".to_string()));
        assert_eq!(record_id(&json!({"number": "one"})), None);
        assert_eq!(record_id(&json!("not an object")), None);
    }

    #[test]
    fn test_json_array_to_strings() {
        let ids = json_array_to_strings(r#"["a", {"$oid": "b"}, 3]"#).unwrap();
        assert_eq!(ids, vec!["a", "b", "3"]);
    }

    #[test]
    fn test_json_array_to_strings_rejects_non_arrays() {
        let result = json_array_to_strings(r#"{"a": 1}"#);
        assert!(result.is_err());
        if let Err(err) = result {
            assert_eq!(err.kind(), &ErrorKind::ParseError);
        }
    }
}
