//! Value codec shared by the backends that persist outside process memory
//!
//! Values are encoded as JSON. Two values are "the same" for dirty-checks
//! when they compare equal as [`CacheValue`], which is deep structural
//! equality (`1` and `1.0` differ, object key order does not matter).

use crate::cache::types::CacheValue;
use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Encode a value to its durable byte form
pub fn encode(value: &CacheValue) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a value from its durable byte form
pub fn decode(bytes: &[u8]) -> Result<CacheValue> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Convert any serializable type into a cache value
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<CacheValue> {
    Ok(serde_json::to_value(value)?)
}

/// Convert a cache value back into a concrete type
pub fn from_value<T: DeserializeOwned>(value: CacheValue) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values_survive_encoding() {
        for value in [json!(false), json!(0), json!(""), json!([]), json!({}), json!(null)] {
            let bytes = encode(&value).unwrap();
            assert!(!bytes.is_empty());
            assert_eq!(decode(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_equality_ignores_key_order() {
        let a = decode(br#"{"a":1,"b":[1,2]}"#).unwrap();
        let b = decode(br#"{"b":[1,2],"a":1}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_is_type_strict() {
        assert_ne!(json!(1), json!(1.0));
        assert_ne!(json!("1"), json!(1));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode(b"not json").is_err());
        assert!(decode(b"").is_err());
    }

    #[test]
    fn test_typed_conversion() {
        let columns = vec!["id".to_string(), "name".to_string()];
        let value = to_value(&columns).unwrap();
        assert_eq!(value, json!(["id", "name"]));

        let back: Vec<String> = from_value(value).unwrap();
        assert_eq!(back, columns);

        let wrong: Result<u32> = from_value(json!("nope"));
        assert!(wrong.is_err());
    }
}
