//! Value encoding for the store's flat string format
//!
//! Numbers are written as their bare decimal text, which keeps them usable by
//! store-side arithmetic; every other value is written as JSON. Strings are
//! always JSON-quoted, so a stored `"00501"` can never read back as `501`.

use crate::errors::CacheError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

/// Encoder/decoder between application values and cache payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec;

impl ValueCodec {
    /// Encode a value into its wire text
    ///
    /// Values pass through [`serde_json::Value`] first, so map keys come out
    /// sorted and equal inputs always produce equal payloads.
    pub fn encode<T>(value: &T) -> Result<String, CacheError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        Ok(value.to_string())
    }

    /// Decode a payload read from the store
    ///
    /// `None` is the store's missing-key answer and decodes to `Ok(None)`.
    /// Numeric text decodes as a number; anything else must be valid JSON
    /// for `T`, otherwise [`CacheError::Decode`] is returned.
    pub fn decode<T>(raw: Option<&str>) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let Some(raw) = raw else {
            return Ok(None);
        };

        let value = match parse_number(raw) {
            Some(number) => Value::Number(number),
            None => serde_json::from_str(raw).map_err(|e| CacheError::Decode(e.to_string()))?,
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| CacheError::Decode(e.to_string()))
    }

    /// Whether a payload is read back as a number
    pub fn is_numeric(raw: &str) -> bool {
        parse_number(raw).is_some()
    }
}

/// Integers first so that 64-bit values keep full precision
fn parse_number(raw: &str) -> Option<Number> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(int.into());
    }
    if let Ok(uint) = raw.parse::<u64>() {
        return Some(uint.into());
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Product {
        id: u32,
        name: String,
        tags: Vec<String>,
        price: f64,
    }

    fn round_trip<T>(value: &T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let raw = ValueCodec::encode(value).unwrap();
        ValueCodec::decode(Some(&raw)).unwrap().unwrap()
    }

    #[test]
    fn test_numbers_encode_as_decimal_text() {
        assert_eq!(ValueCodec::encode(&42).unwrap(), "42");
        assert_eq!(ValueCodec::encode(&-7i64).unwrap(), "-7");
        assert_eq!(ValueCodec::encode(&1.5f64).unwrap(), "1.5");
        assert_eq!(ValueCodec::encode(&u64::MAX).unwrap(), u64::MAX.to_string());
    }

    #[test]
    fn test_integer_round_trip_is_exact() {
        for value in [0i64, 1, -1, i64::MAX, i64::MIN, 9_007_199_254_740_993] {
            assert_eq!(round_trip(&value), value);
        }
        assert_eq!(round_trip(&u64::MAX), u64::MAX);
    }

    #[test]
    fn test_float_round_trip() {
        for value in [0.1f64, -2.75, 1e20, 3.0, f64::MAX] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn test_structured_round_trip() {
        let product = Product {
            id: 7,
            name: "Lamp".to_string(),
            tags: vec!["home".to_string(), "light".to_string()],
            price: 19.99,
        };
        assert_eq!(round_trip(&product), product);

        let nested = json!({"a": [1, 2, {"b": null}], "c": true});
        assert_eq!(round_trip(&nested), nested);
    }

    #[test]
    fn test_numeric_looking_strings_stay_strings() {
        let zip = "00501".to_string();
        let raw = ValueCodec::encode(&zip).unwrap();
        assert_eq!(raw, "\"00501\"");
        assert!(!ValueCodec::is_numeric(&raw));
        assert_eq!(round_trip(&zip), zip);
        assert_eq!(round_trip(&"42".to_string()), "42");
    }

    #[test]
    fn test_encoding_is_deterministic_for_maps() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for (key, value) in [("zeta", 1), ("alpha", 2), ("mid", 3)] {
            first.insert(key, value);
        }
        for (key, value) in [("mid", 3), ("zeta", 1), ("alpha", 2)] {
            second.insert(key, value);
        }
        assert_eq!(
            ValueCodec::encode(&first).unwrap(),
            ValueCodec::encode(&second).unwrap()
        );
        assert_eq!(
            ValueCodec::encode(&first).unwrap(),
            r#"{"alpha":2,"mid":3,"zeta":1}"#
        );
    }

    #[test]
    fn test_missing_decodes_to_none() {
        assert_eq!(ValueCodec::decode::<i64>(None).unwrap(), None);
    }

    #[test]
    fn test_store_side_counters_decode_as_numbers() {
        // Raw text written by INCR or external tooling, never JSON-encoded by us
        assert_eq!(ValueCodec::decode::<i64>(Some("17")).unwrap(), Some(17));
        assert_eq!(ValueCodec::decode::<f64>(Some("2.5")).unwrap(), Some(2.5));
        assert_eq!(ValueCodec::decode::<f64>(Some("3")).unwrap(), Some(3.0));
    }

    #[test]
    fn test_malformed_payload_is_decode_error() {
        let err = ValueCodec::decode::<Product>(Some("{not json")).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
        assert!(err.is_recoverable());

        // Valid JSON of the wrong shape is also a decode failure
        let err = ValueCodec::decode::<Product>(Some("[1,2]")).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }

    #[test]
    fn test_non_finite_text_is_not_numeric() {
        assert!(!ValueCodec::is_numeric("inf"));
        assert!(!ValueCodec::is_numeric("NaN"));
        assert!(ValueCodec::is_numeric("-0.5"));
        assert!(ValueCodec::decode::<f64>(Some("inf")).is_err());
    }
}
