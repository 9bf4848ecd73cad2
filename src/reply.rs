use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::value::Value;

/// A reply in the native shape produced by the response callbacks.
///
/// A raw [`Frame`] first becomes a `Reply` through `From<Frame>`; the standard callbacks then
/// apply protocol level coercion (`OK` to `true`, scores to floats, flat arrays to pairs) and
/// the value decoders replace raw [`Reply::Data`] with [`Reply::Value`] or [`Reply::Text`].
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Status(String),
    /// Raw bulk payload that has not been decoded yet.
    Data(Bytes),
    /// Bulk payload decoded as plain text: key, field and channel names.
    Text(String),
    /// Bulk payload passed through the codec.
    Value(Value),
    Array(Vec<Reply>),
    Pairs(Vec<(Reply, Reply)>),
    Set(HashSet<Value>),
    Map(HashMap<String, Value>),
    Scored(Vec<(Value, f64)>),
    Cursor(u64, Box<Reply>),
    /// Error marker for one command of a batch executed without raising.
    Error(String),
}

impl From<Frame> for Reply {
    fn from(frame: Frame) -> Reply {
        match frame {
            Frame::Simple(s) => Reply::Status(s),
            Frame::Error(e) => Reply::Error(e),
            Frame::Integer(i) => Reply::Int(i),
            Frame::Bulk(b) => Reply::Data(b),
            Frame::Null => Reply::Nil,
            Frame::Array(items) => Reply::Array(items.into_iter().map(Reply::from).collect()),
        }
    }
}

impl Reply {
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Turns an error marker into `Err`, leaving every other reply untouched.
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Reply::Error(msg) => Err(Error::Response(msg)),
            reply => Ok(reply),
        }
    }

    pub fn into_value(self) -> Result<Value> {
        Value::from_reply(self)
    }
}

/// Conversion from a decoded [`Reply`] into the typed result of a command.
pub trait FromReply: Sized {
    fn from_reply(reply: Reply) -> Result<Self>;
}

impl FromReply for Reply {
    fn from_reply(reply: Reply) -> Result<Self> {
        Ok(reply)
    }
}

impl FromReply for () {
    fn from_reply(reply: Reply) -> Result<Self> {
        reply.into_result().map(|_| ())
    }
}

impl FromReply for bool {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Bool(b) => Ok(b),
            Reply::Int(i) => Ok(i != 0),
            Reply::Status(s) => Ok(s == "OK"),
            Reply::Nil => Ok(false),
            other => Err(Error::unexpected("bool", other)),
        }
    }
}

impl FromReply for i64 {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Int(i) => Ok(i),
            Reply::Bool(b) => Ok(b as i64),
            other => Err(Error::unexpected("integer", other)),
        }
    }
}

impl FromReply for u64 {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Int(i) if i >= 0 => Ok(i as u64),
            other => Err(Error::unexpected("unsigned integer", other)),
        }
    }
}

impl FromReply for f64 {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Float(f) => Ok(f),
            Reply::Int(i) => Ok(i as f64),
            Reply::Data(raw) => parse_float(&raw),
            other => Err(Error::unexpected("float", other)),
        }
    }
}

impl FromReply for String {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Text(s) | Reply::Status(s) => Ok(s),
            Reply::Data(raw) => String::from_utf8(raw.to_vec())
                .map_err(|_| Error::unexpected("utf-8 text", raw)),
            other => Err(Error::unexpected("text", other)),
        }
    }
}

impl FromReply for Value {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Value(v) => Ok(v),
            Reply::Nil => Ok(Value::Nil),
            Reply::Int(i) => Ok(Value::Int(i)),
            Reply::Float(f) => Ok(Value::Float(f)),
            Reply::Bool(b) => Ok(Value::Bool(b)),
            Reply::Text(s) | Reply::Status(s) => Ok(Value::Str(s)),
            Reply::Error(msg) => Err(Error::Response(msg)),
            Reply::Array(items) => items
                .into_iter()
                .map(Value::from_reply)
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Reply::Set(items) => Ok(Value::Set(items.into_iter().collect())),
            Reply::Map(map) => Ok(Value::Map(
                map.into_iter().map(|(k, v)| (Value::Str(k), v)).collect(),
            )),
            other => Err(Error::unexpected("decoded value", other)),
        }
    }
}

impl<T: FromReply> FromReply for Option<T> {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Nil => Ok(None),
            reply => T::from_reply(reply).map(Some),
        }
    }
}

impl<T: FromReply> FromReply for Vec<T> {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Array(items) => items.into_iter().map(T::from_reply).collect(),
            // Pairs convert item by item as two element arrays.
            Reply::Pairs(pairs) => pairs
                .into_iter()
                .map(|(a, b)| T::from_reply(Reply::Array(vec![a, b])))
                .collect(),
            Reply::Scored(pairs) => pairs
                .into_iter()
                .map(|(member, score)| {
                    T::from_reply(Reply::Array(vec![Reply::Value(member), Reply::Float(score)]))
                })
                .collect(),
            Reply::Nil => Ok(Vec::new()),
            other => Err(Error::unexpected("array", other)),
        }
    }
}

impl FromReply for HashSet<Value> {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Set(items) => Ok(items),
            Reply::Array(items) => items.into_iter().map(Value::from_reply).collect(),
            other => Err(Error::unexpected("set", other)),
        }
    }
}

impl FromReply for HashMap<String, Value> {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Map(map) => Ok(map),
            other => Err(Error::unexpected("mapping", other)),
        }
    }
}

impl<A: FromReply, B: FromReply> FromReply for (A, B) {
    fn from_reply(reply: Reply) -> Result<Self> {
        match reply {
            Reply::Cursor(cursor, inner) => Ok((
                A::from_reply(Reply::Int(cursor as i64))?,
                B::from_reply(*inner)?,
            )),
            Reply::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(a), Some(b)) => Ok((A::from_reply(a)?, B::from_reply(b)?)),
                    _ => Err(Error::unexpected("pair", "short array")),
                }
            }
            other => Err(Error::unexpected("pair", other)),
        }
    }
}

/// Type of the value stored at a key, as reported by `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum KeyType {
    None,
    String,
    List,
    Set,
    Zset,
    Hash,
    Stream,
}

impl FromReply for KeyType {
    fn from_reply(reply: Reply) -> Result<Self> {
        let name = String::from_reply(reply)?;
        name.parse()
            .map_err(|_| Error::unexpected("key type", name))
    }
}

/// One result of a radius query. The optional parts are present when the matching `WITH*` flag
/// was requested.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoMember {
    pub member: Value,
    pub dist: Option<f64>,
    pub hash: Option<i64>,
    pub coord: Option<(f64, f64)>,
}

impl FromReply for GeoMember {
    fn from_reply(reply: Reply) -> Result<Self> {
        let items = match reply {
            Reply::Value(member) => {
                return Ok(GeoMember {
                    member,
                    dist: None,
                    hash: None,
                    coord: None,
                })
            }
            Reply::Array(items) => items,
            other => return Err(Error::unexpected("geo member", other)),
        };

        let mut items = items.into_iter();
        let member = items
            .next()
            .ok_or_else(|| Error::unexpected("geo member", "empty array"))
            .and_then(Value::from_reply)?;
        let mut geo = GeoMember {
            member,
            dist: None,
            hash: None,
            coord: None,
        };

        // The server always orders the optional parts as distance, hash, coordinates; their
        // types tell them apart.
        for item in items {
            match item {
                Reply::Float(dist) => geo.dist = Some(dist),
                Reply::Int(hash) => geo.hash = Some(hash),
                Reply::Array(_) => geo.coord = Some(<(f64, f64)>::from_reply(item)?),
                other => return Err(Error::unexpected("geo member part", other)),
            }
        }

        Ok(geo)
    }
}

pub(crate) fn parse_float(raw: &[u8]) -> Result<f64> {
    let text = std::str::from_utf8(raw).map_err(|_| Error::unexpected("float", raw))?;
    match text {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        text => text.parse().map_err(|_| Error::unexpected("float", text)),
    }
}
