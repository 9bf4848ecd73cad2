//! Value decoders, one per reply shape.
//!
//! A decoder runs after the protocol level callback of its command and passes every value slot
//! of the reply through the codec. Key names, field names, channel names and cursors are only
//! turned into text, never deserialized.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::callbacks::Callback;
use crate::cmd::ReplyOptions;
use crate::codec::{deserialize_value, Codec};
use crate::error::{Error, Result};
use crate::reply::{FromReply, Reply};
use crate::value::Value;

/// Structural category of a reply, independent of the command that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Names only: keys, fields, channels.
    Text,
    Scalar,
    Sequence,
    /// Unordered members, as a set unless a list was requested.
    Collection,
    Mapping,
    CursorMapping,
    CursorCollection,
    CursorScored,
    /// Sorted set ranges, with or without scores.
    Scored,
    BlockingPop,
    GeoQuery,
}

/// Commands whose replies carry values or names, with the shape of their reply.
pub const DECODED_COMMANDS: &[(&str, ReplyShape)] = &[
    ("KEYS", ReplyShape::Text),
    ("TYPE", ReplyShape::Text),
    ("SCAN", ReplyShape::Text),
    ("HKEYS", ReplyShape::Text),
    ("GEOHASH", ReplyShape::Text),
    ("PUBSUB CHANNELS", ReplyShape::Text),
    ("PUBSUB NUMSUB", ReplyShape::Text),
    ("GET", ReplyShape::Scalar),
    ("GETSET", ReplyShape::Scalar),
    ("HGET", ReplyShape::Scalar),
    ("LPOP", ReplyShape::Scalar),
    ("RPOP", ReplyShape::Scalar),
    ("RPOPLPUSH", ReplyShape::Scalar),
    ("BRPOPLPUSH", ReplyShape::Scalar),
    ("LINDEX", ReplyShape::Scalar),
    ("SPOP", ReplyShape::Scalar),
    ("MGET", ReplyShape::Sequence),
    ("HVALS", ReplyShape::Sequence),
    ("HMGET", ReplyShape::Sequence),
    ("LRANGE", ReplyShape::Sequence),
    ("SRANDMEMBER", ReplyShape::Sequence),
    ("SORT", ReplyShape::Sequence),
    ("SMEMBERS", ReplyShape::Collection),
    ("SDIFF", ReplyShape::Collection),
    ("SINTER", ReplyShape::Collection),
    ("SUNION", ReplyShape::Collection),
    ("HGETALL", ReplyShape::Mapping),
    ("HSCAN", ReplyShape::CursorMapping),
    ("SSCAN", ReplyShape::CursorCollection),
    ("ZSCAN", ReplyShape::CursorScored),
    ("ZRANGE", ReplyShape::Scored),
    ("ZRANGEBYSCORE", ReplyShape::Scored),
    ("ZREVRANGE", ReplyShape::Scored),
    ("ZREVRANGEBYSCORE", ReplyShape::Scored),
    ("BLPOP", ReplyShape::BlockingPop),
    ("BRPOP", ReplyShape::BlockingPop),
    ("GEORADIUS", ReplyShape::GeoQuery),
    ("GEORADIUSBYMEMBER", ReplyShape::GeoQuery),
];

impl ReplyShape {
    pub fn decode(self, codec: &dyn Codec, reply: Reply, options: &ReplyOptions) -> Result<Reply> {
        match self {
            ReplyShape::Text => decode_text(reply),
            ReplyShape::Scalar => decode_scalar(codec, reply),
            ReplyShape::Sequence => decode_sequence(codec, reply),
            ReplyShape::Collection if options.as_list => decode_collection_as_list(codec, reply),
            ReplyShape::Collection => decode_collection(codec, reply),
            ReplyShape::Mapping => decode_mapping(codec, reply),
            ReplyShape::CursorMapping => decode_cursor_mapping(codec, reply),
            ReplyShape::CursorCollection => {
                decode_cursor(reply, |items| decode_collection_as_list(codec, items))
            }
            ReplyShape::CursorScored => decode_cursor_scored_set(codec, reply),
            ReplyShape::Scored => decode_scored_pairs(codec, reply, options.with_scores),
            ReplyShape::BlockingPop => decode_blocking_pop(codec, reply),
            ReplyShape::GeoQuery => decode_geo_query(codec, reply, options),
        }
    }

    /// Wraps the decoder of this shape into a response callback bound to `codec`.
    pub fn callback(self, codec: Arc<dyn Codec>) -> Callback {
        Arc::new(move |reply, options: &ReplyOptions| {
            self.decode(codec.as_ref(), reply, options)
        })
    }
}

/// Turns raw bulk strings into text, anywhere in the reply. Names that are not valid UTF-8
/// are an error rather than being rewritten.
pub fn decode_text(reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Data(raw) => String::from_utf8(raw.to_vec())
            .map(Reply::Text)
            .map_err(|_| Error::unexpected("utf-8 text", raw)),
        Reply::Array(items) => items
            .into_iter()
            .map(decode_text)
            .collect::<Result<_>>()
            .map(Reply::Array),
        Reply::Pairs(pairs) => pairs
            .into_iter()
            .map(|(a, b)| -> Result<(Reply, Reply)> { Ok((decode_text(a)?, decode_text(b)?)) })
            .collect::<Result<_>>()
            .map(Reply::Pairs),
        Reply::Cursor(cursor, inner) => Ok(Reply::Cursor(cursor, Box::new(decode_text(*inner)?))),
        other => Ok(other),
    }
}

pub fn decode_scalar(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Data(raw) => deserialize_value(codec, &raw).map(Reply::Value),
        other => Ok(other),
    }
}

pub fn decode_sequence(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Array(items) => items
            .into_iter()
            .map(|item| decode_scalar(codec, item))
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        other => decode_scalar(codec, other),
    }
}

pub fn decode_collection(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Array(items) => items
            .into_iter()
            .map(|item| value(codec, item))
            .collect::<Result<HashSet<_>>>()
            .map(Reply::Set),
        Reply::Nil => Ok(Reply::Set(HashSet::new())),
        other => Err(Error::unexpected("collection", other)),
    }
}

pub fn decode_collection_as_list(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Array(items) => items
            .into_iter()
            .map(|item| value(codec, item).map(Reply::Value))
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        Reply::Nil => Ok(Reply::Array(Vec::new())),
        other => Err(Error::unexpected("collection", other)),
    }
}

pub fn decode_mapping(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Pairs(pairs) => pairs
            .into_iter()
            .map(|(field, v)| -> Result<(String, Value)> {
                Ok((text(field)?, value(codec, v)?))
            })
            .collect::<Result<HashMap<_, _>>>()
            .map(Reply::Map),
        Reply::Array(items) if items.is_empty() => Ok(Reply::Map(HashMap::new())),
        Reply::Nil => Ok(Reply::Map(HashMap::new())),
        other => Err(Error::unexpected("mapping", other)),
    }
}

pub fn decode_cursor_mapping(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    decode_cursor(reply, |mapping| decode_mapping(codec, mapping))
}

pub fn decode_scored_pairs(codec: &dyn Codec, reply: Reply, with_scores: bool) -> Result<Reply> {
    if !with_scores {
        return decode_sequence(codec, reply);
    }

    match reply {
        Reply::Pairs(pairs) => pairs
            .into_iter()
            .map(|(member, score)| -> Result<(Value, f64)> {
                Ok((value(codec, member)?, f64::from_reply(score)?))
            })
            .collect::<Result<Vec<_>>>()
            .map(Reply::Scored),
        Reply::Array(items) if items.is_empty() => Ok(Reply::Scored(Vec::new())),
        other => Err(Error::unexpected("scored members", other)),
    }
}

/// Decodes a sorted set scan page. A member returned twice across a rehash is kept once.
pub fn decode_cursor_scored_set(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    decode_cursor(reply, |pairs| {
        let mut seen = HashSet::new();
        match decode_scored_pairs(codec, pairs, true)? {
            Reply::Scored(pairs) => Ok(Reply::Scored(
                pairs
                    .into_iter()
                    .filter(|(member, _)| seen.insert(member.clone()))
                    .collect(),
            )),
            other => Ok(other),
        }
    })
}

/// `nil` on timeout, otherwise `[key, value]` with only the value deserialized.
pub fn decode_blocking_pop(codec: &dyn Codec, reply: Reply) -> Result<Reply> {
    let items = match reply {
        Reply::Nil => return Ok(Reply::Nil),
        Reply::Array(items) if items.len() == 2 => items,
        other => return Err(Error::unexpected("key and value", other)),
    };

    let mut items = items.into_iter();
    match (items.next(), items.next()) {
        (Some(key), Some(v)) => Ok(Reply::Array(vec![
            Reply::Text(text(key)?),
            decode_scalar(codec, v)?,
        ])),
        _ => Err(Error::unexpected("key and value", "short array")),
    }
}

/// Decodes a radius query. Stored results are a count and pass through; otherwise only the
/// member slot of each result is deserialized.
pub fn decode_geo_query(codec: &dyn Codec, reply: Reply, options: &ReplyOptions) -> Result<Reply> {
    if options.store {
        return Ok(reply);
    }
    if !(options.with_dist || options.with_coord || options.with_hash) {
        return decode_sequence(codec, reply);
    }

    match reply {
        Reply::Array(items) => items
            .into_iter()
            .map(|item| -> Result<Reply> {
                let parts = match item {
                    Reply::Array(parts) => parts,
                    other => return Err(Error::unexpected("geo result", other)),
                };

                let mut parts = parts.into_iter();
                let mut decoded = Vec::with_capacity(4);
                if let Some(member) = parts.next() {
                    decoded.push(decode_scalar(codec, member)?);
                }
                decoded.extend(parts);
                Ok(Reply::Array(decoded))
            })
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        other => Err(Error::unexpected("geo results", other)),
    }
}

fn decode_cursor(reply: Reply, inner: impl FnOnce(Reply) -> Result<Reply>) -> Result<Reply> {
    match reply {
        Reply::Cursor(cursor, items) => Ok(Reply::Cursor(cursor, Box::new(inner(*items)?))),
        other => Err(Error::unexpected("cursor reply", other)),
    }
}

fn value(codec: &dyn Codec, reply: Reply) -> Result<Value> {
    match reply {
        Reply::Data(raw) => deserialize_value(codec, &raw),
        other => Value::from_reply(other),
    }
}

fn text(reply: Reply) -> Result<String> {
    match decode_text(reply)? {
        Reply::Text(s) => Ok(s),
        other => Err(Error::unexpected("text", other)),
    }
}
