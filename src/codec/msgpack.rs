use bytes::Bytes;

use super::{find_unsupported, Codec};
use crate::error::{Error, Result};
use crate::value::Value;

/// MessagePack codec backed by `rmp-serde`.
///
/// Binary safe and compact. MessagePack has no set type, so sets are rejected rather than
/// silently read back as lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgpackCodec;

impl Codec for MsgpackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes> {
        if let Some(kind) = find_unsupported(value, &|v| matches!(v, Value::Set(_))) {
            return Err(Error::UnsupportedValueKind {
                codec: self.name(),
                kind,
            });
        }

        rmp_serde::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::Serialize(e.to_string()))
    }

    fn deserialize(&self, raw: &[u8]) -> Result<Value> {
        rmp_serde::from_slice(raw).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    #[test]
    fn round_trips_nested_values() {
        let mut map = BTreeMap::new();
        map.insert(Value::from("list"), Value::from(vec![1, 2, 3]));
        map.insert(Value::from(12), Value::Bytes(b"\r\n\x00".to_vec()));
        map.insert(Value::from("nil"), Value::Nil);
        map.insert(Value::from("float"), Value::from(-0.5));
        let value = Value::Map(map);

        let raw = MsgpackCodec.serialize(&value).unwrap();

        assert_eq!(MsgpackCodec.deserialize(&raw).unwrap(), value);
    }

    #[test]
    fn large_unsigned_integers_become_floats() {
        let raw = rmp_serde::to_vec(&u64::MAX).unwrap();
        assert_eq!(
            MsgpackCodec.deserialize(&raw).unwrap(),
            Value::Float(u64::MAX as f64)
        );
    }

    #[test]
    fn rejects_sets() {
        let value = Value::from(vec![Value::from(BTreeSet::from(["a"]))]);
        let err = MsgpackCodec.serialize(&value).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedValueKind {
                codec: "msgpack",
                kind: "set"
            }
        ));
    }

    #[test]
    fn truncated_payload() {
        let raw = MsgpackCodec.serialize(&Value::from("hello")).unwrap();
        let err = MsgpackCodec.deserialize(&raw[..2]).unwrap_err();
        assert!(matches!(err, Error::Deserialize(_)));
    }
}
