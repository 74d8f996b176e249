//! Serializer adapters.
//!
//! Adapters turn application values into the strings a store persists and
//! back. Values are modelled as [`serde_json::Value`] so that each adapter can
//! accept or reject a value by its shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{SerializationError, TabulaResult};

/// Converts values to and from their stored string form.
pub trait Serializer: Send + Sync {
    /// Adapter name, used in error messages.
    fn name(&self) -> &'static str;

    fn serialize(&self, value: &Value) -> TabulaResult<String>;

    fn deserialize(&self, serialized: &str) -> TabulaResult<Value>;
}

/// Describe the shape of a value for error messages.
pub fn value_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(true) => "true",
        Value::Bool(false) => "false",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Pass-through adapter.
///
/// Accepts strings, `false` and `null`; the latter two serialize to the empty
/// string. Deserializing never decodes anything: the stored string comes back
/// unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl Serializer for StringSerializer {
    fn name(&self) -> &'static str {
        "string"
    }

    fn serialize(&self, value: &Value) -> TabulaResult<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Bool(false) | Value::Null => Ok(String::new()),
            other => Err(SerializationError::UnsupportedValue {
                adapter: self.name(),
                shape: value_shape(other).to_string(),
            }
            .into()),
        }
    }

    fn deserialize(&self, serialized: &str) -> TabulaResult<Value> {
        Ok(Value::String(serialized.to_string()))
    }
}

/// JSON text adapter. Accepts any value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, value: &Value) -> TabulaResult<String> {
        serde_json::to_string(value).map_err(|_| {
            SerializationError::UnsupportedValue {
                adapter: self.name(),
                shape: value_shape(value).to_string(),
            }
            .into()
        })
    }

    fn deserialize(&self, serialized: &str) -> TabulaResult<Value> {
        serde_json::from_str(serialized).map_err(|e| {
            SerializationError::Malformed {
                adapter: self.name(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Serializer selection for configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializerKind {
    #[default]
    String,
    Json,
}

impl SerializerKind {
    /// Parse a configuration value (`string` or `json`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Build the selected adapter.
    pub fn build(self) -> Box<dyn Serializer> {
        match self {
            Self::String => Box::new(StringSerializer),
            Self::Json => Box::new(JsonSerializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TabulaError;
    use serde_json::json;

    #[test]
    fn test_string_serializer_accepts_strings() {
        let s = StringSerializer;
        assert_eq!(s.serialize(&json!("value")).unwrap(), "value");
        assert_eq!(s.serialize(&json!("")).unwrap(), "");
        assert_eq!(s.serialize(&json!("{}")).unwrap(), "{}");
    }

    #[test]
    fn test_string_serializer_normalizes_false_and_null() {
        let s = StringSerializer;
        assert_eq!(s.serialize(&json!(false)).unwrap(), "");
        assert_eq!(s.serialize(&Value::Null).unwrap(), "");
    }

    #[test]
    fn test_string_serializer_rejects_other_shapes() {
        let s = StringSerializer;
        for (value, shape) in [
            (json!(true), "true"),
            (json!(42), "number"),
            (json!([1, 2]), "array"),
            (json!({"a": 1}), "object"),
        ] {
            let err = s.serialize(&value).expect_err("must reject");
            assert_eq!(
                err,
                TabulaError::Serialization(SerializationError::UnsupportedValue {
                    adapter: "string",
                    shape: shape.to_string(),
                })
            );
        }
    }

    #[test]
    fn test_string_serializer_deserialize_is_identity() {
        let s = StringSerializer;
        assert_eq!(s.deserialize("[1,2]").unwrap(), json!("[1,2]"));
        assert_eq!(s.deserialize("").unwrap(), json!(""));
    }

    #[test]
    fn test_json_serializer_round_trip() {
        let s = JsonSerializer;
        let value = json!({"name": "robot", "tags": [1, 2, 3]});
        let encoded = s.serialize(&value).unwrap();
        assert_eq!(s.deserialize(&encoded).unwrap(), value);
    }

    #[test]
    fn test_json_serializer_rejects_malformed() {
        let err = JsonSerializer.deserialize("{not json").expect_err("malformed");
        assert!(matches!(
            err,
            TabulaError::Serialization(SerializationError::Malformed { adapter: "json", .. })
        ));
    }

    #[test]
    fn test_serializer_kind_parse_and_build() {
        assert_eq!(SerializerKind::parse("JSON"), Some(SerializerKind::Json));
        assert_eq!(SerializerKind::parse(" string "), Some(SerializerKind::String));
        assert_eq!(SerializerKind::parse("msgpack"), None);
        assert_eq!(SerializerKind::Json.build().name(), "json");
        assert_eq!(SerializerKind::default().build().name(), "string");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any string survives the pass-through adapter unchanged.
        #[test]
        fn prop_string_serializer_preserves_strings(s in ".*") {
            let adapter = StringSerializer;
            let encoded = adapter.serialize(&Value::String(s.clone())).unwrap();
            prop_assert_eq!(&encoded, &s);
            prop_assert_eq!(adapter.deserialize(&encoded).unwrap(), Value::String(s));
        }

        /// Numbers are never accepted by the pass-through adapter.
        #[test]
        fn prop_string_serializer_rejects_numbers(n in any::<i64>()) {
            prop_assert!(StringSerializer.serialize(&Value::from(n)).is_err());
        }
    }
}
