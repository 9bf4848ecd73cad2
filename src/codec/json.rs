use bytes::Bytes;
use serde_json::{Map, Number};

use super::Codec;
use crate::error::{Error, Result};
use crate::value::Value;

/// JSON codec.
///
/// Integers and floats are stored as their decimal representation, which keeps `INCR`,
/// `INCRBYFLOAT` and numeric `SORT` working on the server. Maps are written with sorted keys, so
/// keys must be strings. Byte strings, sets and non-finite floats have no JSON representation
/// and are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    const NAME: &'static str = "json";

    fn to_json(value: &Value) -> Result<serde_json::Value> {
        let unsupported = |kind| Error::UnsupportedValueKind {
            codec: Self::NAME,
            kind,
        };

        let json = match value {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .ok_or_else(|| unsupported("non-finite float"))?,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(_) | Value::Set(_) => return Err(unsupported(value.kind())),
            Value::List(items) => serde_json::Value::Array(
                items.iter().map(Self::to_json).collect::<Result<_>>()?,
            ),
            Value::Map(map) => {
                let mut object = Map::new();
                for (key, value) in map {
                    let key = match key {
                        Value::Str(key) => key.clone(),
                        other => return Err(unsupported(other.kind())),
                    };
                    object.insert(key, Self::to_json(value)?);
                }
                serde_json::Value::Object(object)
            }
        };

        Ok(json)
    }

    fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(object) => Value::Map(
                object
                    .into_iter()
                    .map(|(k, v)| (Value::Str(k), Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn serialize(&self, value: &Value) -> Result<Bytes> {
        let json = Self::to_json(value)?;
        serde_json::to_vec(&json)
            .map(Bytes::from)
            .map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize(&self, raw: &[u8]) -> Result<Value> {
        serde_json::from_slice(raw)
            .map(Self::from_json)
            .map_err(|e| Error::Deserialize(e.to_string()))
    }

    fn is_numeric_text(&self) -> bool {
        true
    }

    // The closing quote and escape sequences break byte order: `"a b"` sorts before `"a"`.
    fn preserves_lexical_order(&self) -> bool {
        false
    }
}
