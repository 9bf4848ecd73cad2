use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::Codec;
use crate::error::{Error, Result};
use crate::value::Value;

/// Binary codec backed by `bincode`, able to store any [`Value`], including sets and maps with
/// non-string keys.
///
/// `bincode` is not self-describing, so values go through an externally tagged mirror of
/// [`Value`] that records the variant of every node.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

#[derive(Serialize, Deserialize)]
enum Tagged {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Tagged>),
    Set(Vec<Tagged>),
    Map(Vec<(Tagged, Tagged)>),
}

impl From<&Value> for Tagged {
    fn from(value: &Value) -> Self {
        match value {
            Value::Nil => Tagged::Nil,
            Value::Bool(b) => Tagged::Bool(*b),
            Value::Int(i) => Tagged::Int(*i),
            Value::Float(f) => Tagged::Float(*f),
            Value::Str(s) => Tagged::Str(s.clone()),
            Value::Bytes(b) => Tagged::Bytes(b.clone()),
            Value::List(items) => Tagged::List(items.iter().map(Tagged::from).collect()),
            Value::Set(items) => Tagged::Set(items.iter().map(Tagged::from).collect()),
            Value::Map(map) => Tagged::Map(
                map.iter()
                    .map(|(k, v)| (Tagged::from(k), Tagged::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Tagged> for Value {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::Nil => Value::Nil,
            Tagged::Bool(b) => Value::Bool(b),
            Tagged::Int(i) => Value::Int(i),
            Tagged::Float(f) => Value::Float(f),
            Tagged::Str(s) => Value::Str(s),
            Tagged::Bytes(b) => Value::Bytes(b),
            Tagged::List(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Tagged::Set(items) => Value::Set(items.into_iter().map(Value::from).collect()),
            Tagged::Map(pairs) => Value::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (Value::from(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Codec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes> {
        ::bincode::serialize(&Tagged::from(value))
            .map(Bytes::from)
            .map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize(&self, raw: &[u8]) -> Result<Value> {
        ::bincode::deserialize::<Tagged>(raw)
            .map(Value::from)
            .map_err(|e| Error::Deserialize(e.to_string()))
    }
}
