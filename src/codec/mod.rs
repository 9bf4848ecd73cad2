//! Value codecs.
//!
//! A [`Codec`] turns a [`Value`] into the bytes stored in Redis and back. Every value written
//! through [`SerializedClient`](crate::SerializedClient) goes through [`Codec::serialize`] and
//! every value read goes through [`Codec::deserialize`].
//!
//! - [`JsonCodec`] - JSON using `serde_json`, numbers stay readable by the server.
//! - [`MsgpackCodec`] - MessagePack using `rmp-serde`.
//! - [`BincodeCodec`] - `bincode`, preserves every [`Value`] kind including sets.

mod bincode;
mod json;
mod msgpack;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use strum_macros::{Display, EnumString};

use crate::error::Result;
use crate::value::Value;

pub use self::bincode::BincodeCodec;
pub use self::json::JsonCodec;
pub use self::msgpack::MsgpackCodec;

/// A stateless serialize/deserialize pair.
///
/// `deserialize(serialize(v)) == v` must hold for every value the codec accepts. Values the
/// codec cannot represent are rejected by `serialize` with
/// [`Error::UnsupportedValueKind`](crate::Error::UnsupportedValueKind).
pub trait Codec: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn serialize(&self, value: &Value) -> Result<Bytes>;

    fn deserialize(&self, raw: &[u8]) -> Result<Value>;

    /// Integers and floats are encoded as plain decimal text, so the server can increment them
    /// and sort them numerically.
    fn is_numeric_text(&self) -> bool {
        false
    }

    /// Comparing encoded strings byte by byte gives the same order as comparing the strings
    /// themselves, so server side `ALPHA` sorting is meaningful. None of the built-in codecs do.
    fn preserves_lexical_order(&self) -> bool {
        false
    }
}

/// The built-in codecs, selectable by name from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Json,
    Msgpack,
    Bincode,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            CodecKind::Json => Arc::new(JsonCodec),
            CodecKind::Msgpack => Arc::new(MsgpackCodec),
            CodecKind::Bincode => Arc::new(BincodeCodec),
        }
    }

    pub fn parse(name: &str) -> Option<CodecKind> {
        CodecKind::from_str(&name.to_lowercase()).ok()
    }
}

/// Deserializes a stored value. An empty payload is never handed to the codec: it can only come
/// from a value written around this layer, and reads back as an empty string.
pub fn deserialize_value(codec: &dyn Codec, raw: &[u8]) -> Result<Value> {
    if raw.is_empty() {
        return Ok(Value::Str(String::new()));
    }
    codec.deserialize(raw)
}

/// Walks `value` and reports the first nested kind for which `unsupported` returns true.
pub(crate) fn find_unsupported(
    value: &Value,
    unsupported: &impl Fn(&Value) -> bool,
) -> Option<&'static str> {
    if unsupported(value) {
        return Some(value.kind());
    }
    match value {
        Value::List(items) => items.iter().find_map(|v| find_unsupported(v, unsupported)),
        Value::Set(items) => items.iter().find_map(|v| find_unsupported(v, unsupported)),
        Value::Map(map) => map.iter().find_map(|(k, v)| {
            find_unsupported(k, unsupported).or_else(|| find_unsupported(v, unsupported))
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_kind_from_name() {
        assert_eq!(CodecKind::parse("json"), Some(CodecKind::Json));
        assert_eq!(CodecKind::parse("MsgPack"), Some(CodecKind::Msgpack));
        assert_eq!(CodecKind::parse("bincode"), Some(CodecKind::Bincode));
        assert_eq!(CodecKind::parse("pickle"), None);
        assert_eq!(CodecKind::Msgpack.to_string(), "msgpack");
    }

    #[test]
    fn empty_payload_is_not_decoded() {
        for kind in [CodecKind::Json, CodecKind::Msgpack, CodecKind::Bincode] {
            let codec = kind.build();
            let value = deserialize_value(codec.as_ref(), b"").unwrap();
            assert_eq!(value, Value::Str(String::new()));
        }
    }
}
