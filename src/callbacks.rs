use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;

use crate::cmd::ReplyOptions;
use crate::error::{Error, Result};
use crate::reply::{parse_float, Reply};

/// Post-processing step applied to the reply of one command.
pub type Callback = Arc<dyn Fn(Reply, &ReplyOptions) -> Result<Reply> + Send + Sync>;

/// Table mapping a command name to the step that turns its raw reply into a native shape.
///
/// The table is built once and then only read. Extending it with [`ResponseCallbacks::chain`]
/// produces a new table and keeps the step that was registered before.
#[derive(Clone, Default)]
pub struct ResponseCallbacks {
    table: HashMap<String, Callback>,
}

impl ResponseCallbacks {
    /// The protocol level parsers every underlying client starts from.
    pub fn standard() -> ResponseCallbacks {
        let mut callbacks = ResponseCallbacks::default();

        for name in [
            "SET", "MSET", "HMSET", "LSET", "LTRIM", "RENAME", "SETEX", "PSETEX", "WATCH",
            "UNWATCH",
        ] {
            callbacks = callbacks.with(name, Arc::new(ok_to_bool));
        }
        for name in [
            "SETNX", "MSETNX", "HSETNX", "SISMEMBER", "SMOVE", "EXPIRE", "PEXPIRE", "PERSIST",
            "RENAMENX", "HEXISTS",
        ] {
            callbacks = callbacks.with(name, Arc::new(int_to_bool));
        }
        for name in ["ZSCORE", "ZINCRBY", "INCRBYFLOAT", "HINCRBYFLOAT", "GEODIST"] {
            callbacks = callbacks.with(name, Arc::new(to_float));
        }
        for name in ["ZRANGE", "ZRANGEBYSCORE", "ZREVRANGE", "ZREVRANGEBYSCORE"] {
            callbacks = callbacks.with(name, Arc::new(with_scores));
        }
        for name in ["GEORADIUS", "GEORADIUSBYMEMBER"] {
            callbacks = callbacks.with(name, Arc::new(geo_radius));
        }

        callbacks
            .with("HGETALL", Arc::new(|reply, _: &ReplyOptions| pairs(reply)))
            .with("SCAN", Arc::new(|reply, _: &ReplyOptions| cursor(reply, Ok)))
            .with("SSCAN", Arc::new(|reply, _: &ReplyOptions| cursor(reply, Ok)))
            .with("HSCAN", Arc::new(|reply, _: &ReplyOptions| cursor(reply, pairs)))
            .with(
                "ZSCAN",
                Arc::new(|reply, _: &ReplyOptions| cursor(reply, scored_pairs)),
            )
            .with("GEOPOS", Arc::new(geo_pos))
            .with(
                "PUBSUB NUMSUB",
                Arc::new(|reply, _: &ReplyOptions| pairs(reply)),
            )
    }

    pub fn get(&self, name: &str) -> Option<&Callback> {
        self.table.get(name)
    }

    /// Registers `callback` for `name`, replacing any previous entry.
    pub fn with(mut self, name: &str, callback: Callback) -> ResponseCallbacks {
        self.table.insert(name.to_string(), callback);
        self
    }

    /// Registers `outer` for `name` so that it runs on the result of the step already
    /// registered, if any.
    pub fn chain(mut self, name: &str, outer: Callback) -> ResponseCallbacks {
        let callback: Callback = match self.table.remove(name) {
            Some(inner) => Arc::new(move |reply, options: &ReplyOptions| {
                let reply = inner(reply, options)?;
                outer(reply, options)
            }),
            None => outer,
        };
        self.table.insert(name.to_string(), callback);
        self
    }

    /// Runs the step registered for `name`. Error replies and commands without an entry pass
    /// through untouched.
    pub fn apply(&self, name: &str, reply: Reply, options: &ReplyOptions) -> Result<Reply> {
        if let Reply::Error(_) = reply {
            return Ok(reply);
        }
        match self.table.get(name) {
            Some(callback) => callback(reply, options),
            None => Ok(reply),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl fmt::Debug for ResponseCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys().sorted()).finish()
    }
}

fn ok_to_bool(reply: Reply, _: &ReplyOptions) -> Result<Reply> {
    match reply {
        Reply::Status(s) => Ok(Reply::Bool(s == "OK")),
        // SET with NX or XX answers nil when the condition does not hold.
        Reply::Nil => Ok(Reply::Bool(false)),
        other => Ok(other),
    }
}

fn int_to_bool(reply: Reply, _: &ReplyOptions) -> Result<Reply> {
    match reply {
        Reply::Int(i) => Ok(Reply::Bool(i != 0)),
        other => Ok(other),
    }
}

fn to_float(reply: Reply, _: &ReplyOptions) -> Result<Reply> {
    match reply {
        Reply::Data(raw) => parse_float(&raw).map(Reply::Float),
        Reply::Status(s) => parse_float(s.as_bytes()).map(Reply::Float),
        other => Ok(other),
    }
}

fn with_scores(reply: Reply, options: &ReplyOptions) -> Result<Reply> {
    if options.with_scores {
        scored_pairs(reply)
    } else {
        Ok(reply)
    }
}

/// Groups a flat `[k1, v1, k2, v2, ...]` array into pairs.
fn pairs(reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Array(items) => Ok(Reply::Pairs(items.into_iter().tuples().collect())),
        other => Ok(other),
    }
}

/// Groups a flat `[member, score, ...]` array into pairs with the score parsed.
fn scored_pairs(reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Array(items) => items
            .into_iter()
            .tuples()
            .map(|(member, score): (Reply, Reply)| -> Result<(Reply, Reply)> {
                Ok((member, to_float(score, &ReplyOptions::default())?))
            })
            .collect::<Result<Vec<_>>>()
            .map(Reply::Pairs),
        other => Ok(other),
    }
}

/// Splits a `[cursor, items]` scan reply and shapes the items with `inner`.
fn cursor(reply: Reply, inner: fn(Reply) -> Result<Reply>) -> Result<Reply> {
    let items = match reply {
        Reply::Array(items) if items.len() == 2 => items,
        other => return Err(Error::unexpected("cursor reply", other)),
    };

    let mut items = items.into_iter();
    match (items.next(), items.next()) {
        (Some(Reply::Data(raw)), Some(rest)) => {
            let cursor = std::str::from_utf8(&raw)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| Error::unexpected("cursor", &raw))?;
            Ok(Reply::Cursor(cursor, Box::new(inner(rest)?)))
        }
        (cursor, _) => Err(Error::unexpected("cursor", cursor)),
    }
}

fn coordinates(reply: Reply) -> Result<Reply> {
    match reply {
        Reply::Array(items) => items
            .into_iter()
            .map(|item| to_float(item, &ReplyOptions::default()))
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        other => Ok(other),
    }
}

fn geo_pos(reply: Reply, _: &ReplyOptions) -> Result<Reply> {
    match reply {
        Reply::Array(items) => items
            .into_iter()
            .map(coordinates)
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        other => Ok(other),
    }
}

fn geo_radius(reply: Reply, options: &ReplyOptions) -> Result<Reply> {
    if options.store || !(options.with_dist || options.with_hash || options.with_coord) {
        return Ok(reply);
    }

    let items = match reply {
        Reply::Array(items) => items,
        other => return Ok(other),
    };

    // Every item is `[member, dist?, hash?, coord?]`; the member stays raw.
    items
        .into_iter()
        .map(|item| -> Result<Reply> {
            let parts = match item {
                Reply::Array(parts) => parts,
                other => return Ok(other),
            };

            let mut parts = parts.into_iter();
            let mut shaped = Vec::with_capacity(4);
            shaped.extend(parts.next());
            for part in parts {
                shaped.push(match part {
                    Reply::Data(_) => to_float(part, options)?,
                    Reply::Array(_) => coordinates(part)?,
                    other => other,
                });
            }
            Ok(Reply::Array(shaped))
        })
        .collect::<Result<Vec<_>>>()
        .map(Reply::Array)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn data(s: &'static str) -> Reply {
        Reply::Data(Bytes::from_static(s.as_bytes()))
    }

    #[test]
    fn ok_becomes_true() {
        let callbacks = ResponseCallbacks::standard();
        let options = ReplyOptions::default();

        let reply = callbacks
            .apply("SET", Reply::Status("OK".to_string()), &options)
            .unwrap();
        assert_eq!(reply, Reply::Bool(true));

        let reply = callbacks.apply("SET", Reply::Nil, &options).unwrap();
        assert_eq!(reply, Reply::Bool(false));

        let reply = callbacks.apply("SETNX", Reply::Int(0), &options).unwrap();
        assert_eq!(reply, Reply::Bool(false));
    }

    #[test]
    fn unknown_commands_pass_through() {
        let callbacks = ResponseCallbacks::standard();
        let reply = callbacks
            .apply("ECHO", data("hi"), &ReplyOptions::default())
            .unwrap();
        assert_eq!(reply, data("hi"));
    }

    #[test]
    fn error_replies_skip_callbacks() {
        let callbacks = ResponseCallbacks::standard();
        let reply = callbacks
            .apply(
                "ZSCORE",
                Reply::Error("WRONGTYPE".to_string()),
                &ReplyOptions::default(),
            )
            .unwrap();
        assert_eq!(reply, Reply::Error("WRONGTYPE".to_string()));
    }

    #[test]
    fn scores_are_parsed() {
        let callbacks = ResponseCallbacks::standard();
        let raw = Reply::Array(vec![data("a"), data("1.5"), data("b"), data("inf")]);

        let reply = callbacks
            .apply("ZRANGE", raw.clone(), &ReplyOptions::with_scores())
            .unwrap();
        assert_eq!(
            reply,
            Reply::Pairs(vec![
                (data("a"), Reply::Float(1.5)),
                (data("b"), Reply::Float(f64::INFINITY)),
            ])
        );

        let reply = callbacks
            .apply("ZRANGE", raw.clone(), &ReplyOptions::default())
            .unwrap();
        assert_eq!(reply, raw);
    }

    #[test]
    fn scan_cursor_is_split() {
        let callbacks = ResponseCallbacks::standard();
        let raw = Reply::Array(vec![data("17"), Reply::Array(vec![data("f"), data("v")])]);

        let reply = callbacks
            .apply("HSCAN", raw, &ReplyOptions::default())
            .unwrap();

        assert_eq!(
            reply,
            Reply::Cursor(17, Box::new(Reply::Pairs(vec![(data("f"), data("v"))])))
        );
    }

    #[test]
    fn geo_radius_parts_are_typed() {
        let callbacks = ResponseCallbacks::standard();
        let raw = Reply::Array(vec![Reply::Array(vec![
            data("m"),
            data("0.5"),
            Reply::Int(42),
            Reply::Array(vec![data("2.5"), data("41.0")]),
        ])]);
        let options = ReplyOptions {
            with_dist: true,
            with_hash: true,
            with_coord: true,
            ..Default::default()
        };

        let reply = callbacks.apply("GEORADIUS", raw, &options).unwrap();

        assert_eq!(
            reply,
            Reply::Array(vec![Reply::Array(vec![
                data("m"),
                Reply::Float(0.5),
                Reply::Int(42),
                Reply::Array(vec![Reply::Float(2.5), Reply::Float(41.0)]),
            ])])
        );
    }

    #[test]
    fn chain_keeps_previous_step() {
        let callbacks = ResponseCallbacks::standard().chain(
            "SETNX",
            Arc::new(|reply, _: &ReplyOptions| match reply {
                Reply::Bool(b) => Ok(Reply::Status(b.to_string())),
                other => Ok(other),
            }),
        );

        let reply = callbacks
            .apply("SETNX", Reply::Int(1), &ReplyOptions::default())
            .unwrap();

        assert_eq!(reply, Reply::Status("true".to_string()));
    }
}
