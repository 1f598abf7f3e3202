//! Conversion between plain JSON and Firestore's typed value encoding.
//!
//! Firestore REST wraps every value in a single-key object naming its type
//! (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...). Integers travel as
//! decimal strings.

use serde_json::{Map, Value, json};

use crate::store::StoreError;

/// Encode a JSON value as a Firestore value.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or_default() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode every entry of a JSON object.
#[must_use]
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decode a Firestore value into plain JSON.
///
/// Timestamps, references and geo points decode to their string / object
/// wire form.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] for values that are not single-key typed
/// objects or carry malformed integers.
pub fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Value::Object(typed) = value else {
        return Err(StoreError::Codec(format!("expected typed value, got {value}")));
    };
    let Some((kind, inner)) = typed.iter().next() else {
        return Err(StoreError::Codec("empty typed value".to_string()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue"
        | "bytesValue" | "geoPointValue" => Ok(inner.clone()),
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| StoreError::Codec(format!("bad integerValue {s:?}: {e}"))),
            Value::Number(_) => Ok(inner.clone()),
            other => Err(StoreError::Codec(format!("bad integerValue {other}"))),
        },
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Object(fields))
        }
        other => Err(StoreError::Codec(format!("unknown value type {other}"))),
    }
}

/// Decode the `fields` object of a Firestore document.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if any field fails to decode.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    fields
        .iter()
        .map(|(key, value)| decode_value(value).map(|decoded| (key.clone(), decoded)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode_value(&json!("Koc")), json!({"stringValue": "Koc"}));
        assert_eq!(encode_value(&json!(50)), json!({"integerValue": "50"}));
        assert_eq!(encode_value(&json!(-3)), json!({"integerValue": "-3"}));
        assert_eq!(encode_value(&json!(0.9)), json!({"doubleValue": 0.9}));
        assert_eq!(encode_value(&json!(true)), json!({"booleanValue": true}));
        assert_eq!(encode_value(&Value::Null), json!({"nullValue": null}));
    }

    #[test]
    fn test_encode_nested() {
        let encoded = encode_value(&json!({"cards": [{"name": "Ay"}]}));
        assert_eq!(
            encoded,
            json!({
                "mapValue": {"fields": {
                    "cards": {"arrayValue": {"values": [
                        {"mapValue": {"fields": {"name": {"stringValue": "Ay"}}}}
                    ]}}
                }}
            })
        );
    }

    #[test]
    fn test_decode_document_fields() {
        let fields = json!({
            "coinBalance": {"integerValue": "30"},
            "isPremium": {"booleanValue": false},
            "zodiacSign": {"stringValue": "Aries"},
            "createdAt": {"timestampValue": "2024-06-01T10:00:00Z"},
            "empty": {"arrayValue": {}},
            "nested": {"mapValue": {"fields": {"n": {"doubleValue": 1.5}}}}
        });
        let decoded = decode_fields(fields.as_object().expect("object")).expect("decode");

        assert_eq!(decoded["coinBalance"], json!(30));
        assert_eq!(decoded["isPremium"], json!(false));
        assert_eq!(decoded["zodiacSign"], json!("Aries"));
        assert_eq!(decoded["createdAt"], json!("2024-06-01T10:00:00Z"));
        assert_eq!(decoded["empty"], json!([]));
        assert_eq!(decoded["nested"], json!({"n": 1.5}));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode_value(&json!({"integerValue": "abc"})).is_err());
        assert!(decode_value(&json!({"mysteryValue": 1})).is_err());
        assert!(decode_value(&json!("bare")).is_err());
        assert!(decode_value(&json!({})).is_err());
    }

    #[test]
    fn test_round_trip_preserves_plain_json() {
        let original = json!({
            "motto": "X",
            "love": 80,
            "strengths": ["a", "b"],
            "meta": {"source": "web", "ok": true}
        });
        let encoded = encode_fields(original.as_object().expect("object"));
        let decoded = decode_fields(&encoded).expect("decode");
        assert_eq!(Value::Object(decoded), original);
    }
}
