//! Conversions between `Value`, `serde_json::Value` and serde types.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Value};

/// Decode a `Value` into any deserializable type.
///
/// ```rust
/// use statetree_value::{from_value, Value};
///
/// let count: i64 = from_value(&Value::from(3)).unwrap();
/// assert_eq!(count, 3);
/// ```
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, Error> {
    serde_json::from_value(value_to_json(value.clone())).map_err(|e| Error::decode(e.to_string()))
}

/// Encode any serializable type as a `Value`.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value, Error> {
    let json = serde_json::to_value(data).map_err(|e| Error::encode(e.to_string()))?;
    Ok(json_to_value(json))
}

/// Convert a `Value` to `serde_json::Value`.
///
/// Bytes become base64 strings and non-finite floats become `null`.
pub fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Integer(i) => serde_json::Value::Number(i.into()),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::Bytes(b) => {
            use base64::Engine;
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(&b))
        }
        Value::Array(arr) => serde_json::Value::Array(arr.into_iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, value_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert a `serde_json::Value` to a `Value`.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct CartItem {
        id: u32,
        quantity: u32,
    }

    #[test]
    fn typed_round_trip() {
        let item = CartItem { id: 7, quantity: 2 };
        let value = to_value(&item).unwrap();
        assert_eq!(value.field("quantity"), Some(&Value::Integer(2)));
        let back: CartItem = from_value(&value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn json_numbers() {
        let value = json_to_value(serde_json::json!({"count": 42, "ratio": 0.5}));
        assert_eq!(value.field("count"), Some(&Value::Integer(42)));
        assert_eq!(value.field("ratio"), Some(&Value::Float(0.5)));
    }

    #[test]
    fn nan_becomes_null() {
        assert_eq!(value_to_json(Value::Float(f64::NAN)), serde_json::Value::Null);
    }

    #[test]
    fn decode_mismatch_is_error() {
        let result: Result<CartItem, _> = from_value(&Value::from("nope"));
        assert!(matches!(result, Err(Error::Decode { .. })));
    }
}
