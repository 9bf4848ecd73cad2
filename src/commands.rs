//! The command surface shared by [`SerializedClient`] and [`Pipeline`].
//!
//! Every command is declared once in the `commands!` table below as a request builder that
//! serializes its value arguments. The macro expands each entry into a builder on `Requests`,
//! an `async` method on the client that returns the decoded result, and a method on the
//! pipeline that queues the request.

use std::collections::{HashMap, HashSet};

use bytes::{BufMut, Bytes, BytesMut};

use crate::client::Client;
use crate::cmd::{Cmd, ReplyOptions, Request};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::options::{
    Aggregate, GeoRadiusOptions, GeoUnit, InsertPosition, SetOptions, SortOptions,
};
use crate::pipeline::Pipeline;
use crate::reply::{GeoMember, KeyType};
use crate::serialized::SerializedClient;
use crate::value::Value;

macro_rules! commands {
    (
        $codec:ident;
        $(
            $(#[$attr:meta])*
            fn $name:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty $body:block
        )*
    ) => {
        /// Request builders, one per command.
        pub(crate) struct Requests;

        impl Requests {
            $(
                #[allow(unused_variables)]
                pub(crate) fn $name($codec: &dyn Codec, $($arg: $ty),*) -> Result<Request> $body
            )*
        }

        impl<C: Client> SerializedClient<C> {
            $(
                $(#[$attr])*
                pub async fn $name(&mut self, $($arg: $ty),*) -> Result<$ret> {
                    let request = Requests::$name(self.codec(), $($arg),*)?;
                    self.query(request).await
                }
            )*
        }

        impl<'a, C: Client> Pipeline<'a, C> {
            $(
                $(#[$attr])*
                pub fn $name(&mut self, $($arg: $ty),*) -> Result<&mut Self> {
                    let request = Requests::$name(self.codec(), $($arg),*)?;
                    self.queue(request);
                    Ok(self)
                }
            )*
        }
    };
}

commands! {
    codec;

    // Strings

    fn set(key: &str, value: impl Into<Value>) -> bool {
        Ok(Cmd::new("SET").arg(key).arg(encode(codec, value)?).into())
    }

    /// `SET` with expiry and condition flags. Returns `false` when the condition does not hold.
    fn set_with(key: &str, value: impl Into<Value>, options: SetOptions) -> bool {
        if options.nx && options.xx {
            return Err(Error::shape("SET takes either NX or XX, not both"));
        }
        if options.ex.is_some() && options.px.is_some() {
            return Err(Error::shape("SET takes either EX or PX, not both"));
        }

        let mut cmd = Cmd::new("SET").arg(key).arg(encode(codec, value)?);
        if let Some(seconds) = options.ex {
            cmd = cmd.arg("EX").arg(seconds);
        }
        if let Some(millis) = options.px {
            cmd = cmd.arg("PX").arg(millis);
        }
        Ok(cmd.flag(options.nx, "NX").flag(options.xx, "XX").into())
    }

    fn setnx(key: &str, value: impl Into<Value>) -> bool {
        Ok(Cmd::new("SETNX").arg(key).arg(encode(codec, value)?).into())
    }

    fn setex(key: &str, seconds: u64, value: impl Into<Value>) -> bool {
        Ok(Cmd::new("SETEX").arg(key).arg(seconds).arg(encode(codec, value)?).into())
    }

    fn psetex(key: &str, millis: u64, value: impl Into<Value>) -> bool {
        Ok(Cmd::new("PSETEX").arg(key).arg(millis).arg(encode(codec, value)?).into())
    }

    /// Returns `None` when the key does not exist.
    fn get(key: &str) -> Option<Value> {
        Ok(Cmd::new("GET").arg(key).into())
    }

    fn getset(key: &str, value: impl Into<Value>) -> Option<Value> {
        Ok(Cmd::new("GETSET").arg(key).arg(encode(codec, value)?).into())
    }

    fn mget(keys: &[&str]) -> Vec<Option<Value>> {
        let keys = non_empty("MGET", keys.to_vec())?;
        Ok(Cmd::new("MGET").args(keys).into())
    }

    fn mset(mapping: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Value>)>) -> bool {
        let pairs = encode_mapping(codec, "MSET", mapping)?;
        Ok(Cmd::new("MSET").args(flatten(pairs)).into())
    }

    fn msetnx(mapping: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Value>)>) -> bool {
        let pairs = encode_mapping(codec, "MSETNX", mapping)?;
        Ok(Cmd::new("MSETNX").args(flatten(pairs)).into())
    }

    /// Not supported: byte offsets are meaningless inside an encoded value.
    fn getrange(key: &str, start: i64, end: i64) -> Value {
        Err(Error::not_supported(format!(
            "GETRANGE {} {} {} reads byte offsets of an encoded value",
            key, start, end
        )))
    }

    /// Not supported: byte offsets are meaningless inside an encoded value.
    fn setrange(key: &str, offset: u64, value: impl Into<Value>) -> i64 {
        let _ = value;
        Err(Error::not_supported(format!(
            "SETRANGE {} {} writes byte offsets of an encoded value",
            key, offset
        )))
    }

    fn incr(key: &str) -> i64 {
        numeric_text(codec, "INCR")?;
        Ok(Cmd::new("INCR").arg(key).into())
    }

    fn incrby(key: &str, amount: i64) -> i64 {
        numeric_text(codec, "INCRBY")?;
        Ok(Cmd::new("INCRBY").arg(key).arg(amount).into())
    }

    fn decr(key: &str) -> i64 {
        numeric_text(codec, "DECR")?;
        Ok(Cmd::new("DECR").arg(key).into())
    }

    fn decrby(key: &str, amount: i64) -> i64 {
        numeric_text(codec, "DECRBY")?;
        Ok(Cmd::new("DECRBY").arg(key).arg(amount).into())
    }

    fn incrbyfloat(key: &str, amount: f64) -> f64 {
        numeric_text(codec, "INCRBYFLOAT")?;
        Ok(Cmd::new("INCRBYFLOAT").arg(key).arg(amount).into())
    }

    // Keys

    /// `DEL`. Returns the number of keys removed.
    fn delete(keys: &[&str]) -> i64 {
        let keys = non_empty("DEL", keys.to_vec())?;
        Ok(Cmd::new("DEL").args(keys).into())
    }

    fn exists(keys: &[&str]) -> i64 {
        let keys = non_empty("EXISTS", keys.to_vec())?;
        Ok(Cmd::new("EXISTS").args(keys).into())
    }

    /// `TYPE`.
    fn key_type(key: &str) -> KeyType {
        Ok(Cmd::new("TYPE").arg(key).into())
    }

    fn keys(pattern: &str) -> Vec<String> {
        Ok(Cmd::new("KEYS").arg(pattern).into())
    }

    /// Key patterns match key names, which are never encoded.
    fn scan(cursor: u64, pattern: Option<&str>, count: Option<u64>) -> (u64, Vec<String>) {
        let pattern = pattern.map(|p| Bytes::copy_from_slice(p.as_bytes()));
        Ok(scan_cmd("SCAN", None, cursor, pattern, count).into())
    }

    fn expire(key: &str, seconds: i64) -> bool {
        Ok(Cmd::new("EXPIRE").arg(key).arg(seconds).into())
    }

    fn pexpire(key: &str, millis: i64) -> bool {
        Ok(Cmd::new("PEXPIRE").arg(key).arg(millis).into())
    }

    fn ttl(key: &str) -> i64 {
        Ok(Cmd::new("TTL").arg(key).into())
    }

    fn pttl(key: &str) -> i64 {
        Ok(Cmd::new("PTTL").arg(key).into())
    }

    fn persist(key: &str) -> bool {
        Ok(Cmd::new("PERSIST").arg(key).into())
    }

    fn rename(src: &str, dst: &str) -> bool {
        Ok(Cmd::new("RENAME").arg(src).arg(dst).into())
    }

    fn renamenx(src: &str, dst: &str) -> bool {
        Ok(Cmd::new("RENAMENX").arg(src).arg(dst).into())
    }

    // Hashes

    fn hset(key: &str, field: &str, value: impl Into<Value>) -> i64 {
        Ok(Cmd::new("HSET").arg(key).arg(field).arg(encode(codec, value)?).into())
    }

    fn hsetnx(key: &str, field: &str, value: impl Into<Value>) -> bool {
        Ok(Cmd::new("HSETNX").arg(key).arg(field).arg(encode(codec, value)?).into())
    }

    /// Field names are written as is, values are encoded.
    fn hmset(
        key: &str,
        mapping: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Value>)>,
    ) -> bool {
        let pairs = encode_mapping(codec, "HMSET", mapping)?;
        Ok(Cmd::new("HMSET").arg(key).args(flatten(pairs)).into())
    }

    fn hget(key: &str, field: &str) -> Option<Value> {
        Ok(Cmd::new("HGET").arg(key).arg(field).into())
    }

    fn hmget(key: &str, fields: &[&str]) -> Vec<Option<Value>> {
        let fields = non_empty("HMGET", fields.to_vec())?;
        Ok(Cmd::new("HMGET").arg(key).args(fields).into())
    }

    /// Returns an empty mapping when the key does not exist.
    fn hgetall(key: &str) -> HashMap<String, Value> {
        Ok(Cmd::new("HGETALL").arg(key).into())
    }

    fn hkeys(key: &str) -> Vec<String> {
        Ok(Cmd::new("HKEYS").arg(key).into())
    }

    fn hvals(key: &str) -> Vec<Value> {
        Ok(Cmd::new("HVALS").arg(key).into())
    }

    fn hdel(key: &str, fields: &[&str]) -> i64 {
        let fields = non_empty("HDEL", fields.to_vec())?;
        Ok(Cmd::new("HDEL").arg(key).args(fields).into())
    }

    fn hexists(key: &str, field: &str) -> bool {
        Ok(Cmd::new("HEXISTS").arg(key).arg(field).into())
    }

    fn hlen(key: &str) -> i64 {
        Ok(Cmd::new("HLEN").arg(key).into())
    }

    fn hincrby(key: &str, field: &str, amount: i64) -> i64 {
        numeric_text(codec, "HINCRBY")?;
        Ok(Cmd::new("HINCRBY").arg(key).arg(field).arg(amount).into())
    }

    fn hincrbyfloat(key: &str, field: &str, amount: f64) -> f64 {
        numeric_text(codec, "HINCRBYFLOAT")?;
        Ok(Cmd::new("HINCRBYFLOAT").arg(key).arg(field).arg(amount).into())
    }

    /// The pattern matches field names, which are never encoded.
    fn hscan(
        key: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<u64>,
    ) -> (u64, HashMap<String, Value>) {
        let pattern = pattern.map(|p| Bytes::copy_from_slice(p.as_bytes()));
        Ok(scan_cmd("HSCAN", Some(key), cursor, pattern, count).into())
    }

    // Sets

    fn sadd(key: &str, members: impl IntoIterator<Item = impl Into<Value>>) -> i64 {
        let members = encode_all(codec, "SADD", members)?;
        Ok(Cmd::new("SADD").arg(key).args(members).into())
    }

    fn srem(key: &str, members: impl IntoIterator<Item = impl Into<Value>>) -> i64 {
        let members = encode_all(codec, "SREM", members)?;
        Ok(Cmd::new("SREM").arg(key).args(members).into())
    }

    fn sismember(key: &str, member: impl Into<Value>) -> bool {
        Ok(Cmd::new("SISMEMBER").arg(key).arg(encode(codec, member)?).into())
    }

    fn smembers(key: &str) -> HashSet<Value> {
        Ok(Cmd::new("SMEMBERS").arg(key).into())
    }

    /// `SMEMBERS` returned as a list in server order.
    fn smembers_as_list(key: &str) -> Vec<Value> {
        Ok(as_list(Cmd::new("SMEMBERS").arg(key)))
    }

    fn scard(key: &str) -> i64 {
        Ok(Cmd::new("SCARD").arg(key).into())
    }

    fn spop(key: &str) -> Option<Value> {
        Ok(Cmd::new("SPOP").arg(key).into())
    }

    fn srandmember(key: &str) -> Option<Value> {
        Ok(Cmd::new("SRANDMEMBER").arg(key).into())
    }

    /// A negative `count` may return the same member several times.
    fn srandmember_count(key: &str, count: i64) -> Vec<Value> {
        Ok(Cmd::new("SRANDMEMBER").arg(key).arg(count).into())
    }

    fn smove(src: &str, dst: &str, member: impl Into<Value>) -> bool {
        Ok(Cmd::new("SMOVE").arg(src).arg(dst).arg(encode(codec, member)?).into())
    }

    fn sdiff(keys: &[&str]) -> HashSet<Value> {
        let keys = non_empty("SDIFF", keys.to_vec())?;
        Ok(Cmd::new("SDIFF").args(keys).into())
    }

    fn sdiff_as_list(keys: &[&str]) -> Vec<Value> {
        let keys = non_empty("SDIFF", keys.to_vec())?;
        Ok(as_list(Cmd::new("SDIFF").args(keys)))
    }

    fn sdiffstore(dest: &str, keys: &[&str]) -> i64 {
        let keys = non_empty("SDIFFSTORE", keys.to_vec())?;
        Ok(Cmd::new("SDIFFSTORE").arg(dest).args(keys).into())
    }

    fn sinter(keys: &[&str]) -> HashSet<Value> {
        let keys = non_empty("SINTER", keys.to_vec())?;
        Ok(Cmd::new("SINTER").args(keys).into())
    }

    fn sinter_as_list(keys: &[&str]) -> Vec<Value> {
        let keys = non_empty("SINTER", keys.to_vec())?;
        Ok(as_list(Cmd::new("SINTER").args(keys)))
    }

    fn sinterstore(dest: &str, keys: &[&str]) -> i64 {
        let keys = non_empty("SINTERSTORE", keys.to_vec())?;
        Ok(Cmd::new("SINTERSTORE").arg(dest).args(keys).into())
    }

    fn sunion(keys: &[&str]) -> HashSet<Value> {
        let keys = non_empty("SUNION", keys.to_vec())?;
        Ok(Cmd::new("SUNION").args(keys).into())
    }

    fn sunion_as_list(keys: &[&str]) -> Vec<Value> {
        let keys = non_empty("SUNION", keys.to_vec())?;
        Ok(as_list(Cmd::new("SUNION").args(keys)))
    }

    fn sunionstore(dest: &str, keys: &[&str]) -> i64 {
        let keys = non_empty("SUNIONSTORE", keys.to_vec())?;
        Ok(Cmd::new("SUNIONSTORE").arg(dest).args(keys).into())
    }

    /// A pattern without wildcards is encoded and matches that exact member. A pattern with
    /// wildcards is sent as is and matches the encoded bytes, not the decoded members.
    fn sscan(
        key: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<u64>,
    ) -> (u64, Vec<Value>) {
        let pattern = pattern.map(|p| member_pattern(codec, p)).transpose()?;
        Ok(scan_cmd("SSCAN", Some(key), cursor, pattern, count).into())
    }

    // Sorted sets

    /// Adds `(member, score)` pairs. Only the members are encoded.
    fn zadd(key: &str, members: impl IntoIterator<Item = (impl Into<Value>, f64)>) -> i64 {
        let mut cmd = Cmd::new("ZADD").arg(key);
        let mut added = 0;
        for (member, score) in members {
            cmd = cmd.arg(score).arg(encode(codec, member)?);
            added += 1;
        }
        if added == 0 {
            return Err(Error::shape("ZADD needs at least one member"));
        }
        Ok(cmd.into())
    }

    fn zrem(key: &str, members: impl IntoIterator<Item = impl Into<Value>>) -> i64 {
        let members = encode_all(codec, "ZREM", members)?;
        Ok(Cmd::new("ZREM").arg(key).args(members).into())
    }

    fn zscore(key: &str, member: impl Into<Value>) -> Option<f64> {
        Ok(Cmd::new("ZSCORE").arg(key).arg(encode(codec, member)?).into())
    }

    fn zincrby(key: &str, amount: f64, member: impl Into<Value>) -> f64 {
        Ok(Cmd::new("ZINCRBY").arg(key).arg(amount).arg(encode(codec, member)?).into())
    }

    fn zrank(key: &str, member: impl Into<Value>) -> Option<i64> {
        Ok(Cmd::new("ZRANK").arg(key).arg(encode(codec, member)?).into())
    }

    fn zrevrank(key: &str, member: impl Into<Value>) -> Option<i64> {
        Ok(Cmd::new("ZREVRANK").arg(key).arg(encode(codec, member)?).into())
    }

    fn zcard(key: &str) -> i64 {
        Ok(Cmd::new("ZCARD").arg(key).into())
    }

    fn zcount(key: &str, min: f64, max: f64) -> i64 {
        Ok(Cmd::new("ZCOUNT").arg(key).arg(min).arg(max).into())
    }

    fn zrange(key: &str, start: i64, stop: i64) -> Vec<Value> {
        Ok(Cmd::new("ZRANGE").arg(key).arg(start).arg(stop).into())
    }

    fn zrange_withscores(key: &str, start: i64, stop: i64) -> Vec<(Value, f64)> {
        Ok(with_scores(Cmd::new("ZRANGE").arg(key).arg(start).arg(stop)))
    }

    fn zrevrange(key: &str, start: i64, stop: i64) -> Vec<Value> {
        Ok(Cmd::new("ZREVRANGE").arg(key).arg(start).arg(stop).into())
    }

    fn zrevrange_withscores(key: &str, start: i64, stop: i64) -> Vec<(Value, f64)> {
        Ok(with_scores(Cmd::new("ZREVRANGE").arg(key).arg(start).arg(stop)))
    }

    fn zrangebyscore(key: &str, min: f64, max: f64, limit: Option<(i64, i64)>) -> Vec<Value> {
        Ok(with_limit(Cmd::new("ZRANGEBYSCORE").arg(key).arg(min).arg(max), limit).into())
    }

    fn zrangebyscore_withscores(
        key: &str,
        min: f64,
        max: f64,
        limit: Option<(i64, i64)>,
    ) -> Vec<(Value, f64)> {
        let cmd = Cmd::new("ZRANGEBYSCORE").arg(key).arg(min).arg(max);
        Ok(with_scores(with_limit(cmd, limit)))
    }

    fn zrevrangebyscore(key: &str, max: f64, min: f64, limit: Option<(i64, i64)>) -> Vec<Value> {
        Ok(with_limit(Cmd::new("ZREVRANGEBYSCORE").arg(key).arg(max).arg(min), limit).into())
    }

    fn zrevrangebyscore_withscores(
        key: &str,
        max: f64,
        min: f64,
        limit: Option<(i64, i64)>,
    ) -> Vec<(Value, f64)> {
        let cmd = Cmd::new("ZREVRANGEBYSCORE").arg(key).arg(max).arg(min);
        Ok(with_scores(with_limit(cmd, limit)))
    }

    /// Every member, lowest score first.
    fn zmembers(key: &str) -> Vec<Value> {
        Ok(Cmd::new("ZRANGE").arg(key).arg(0i64).arg(-1i64).into())
    }

    /// Same pattern rules as [`SerializedClient::sscan`].
    fn zscan(
        key: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<u64>,
    ) -> (u64, Vec<(Value, f64)>) {
        let pattern = pattern.map(|p| member_pattern(codec, p)).transpose()?;
        Ok(scan_cmd("ZSCAN", Some(key), cursor, pattern, count).into())
    }

    fn zremrangebyrank(key: &str, start: i64, stop: i64) -> i64 {
        Ok(Cmd::new("ZREMRANGEBYRANK").arg(key).arg(start).arg(stop).into())
    }

    fn zremrangebyscore(key: &str, min: f64, max: f64) -> i64 {
        Ok(Cmd::new("ZREMRANGEBYSCORE").arg(key).arg(min).arg(max).into())
    }

    fn zunionstore(dest: &str, keys: &[&str], aggregate: Option<Aggregate>) -> i64 {
        zstore("ZUNIONSTORE", dest, keys, aggregate)
    }

    fn zinterstore(dest: &str, keys: &[&str], aggregate: Option<Aggregate>) -> i64 {
        zstore("ZINTERSTORE", dest, keys, aggregate)
    }

    // Lists

    fn lpush(key: &str, values: impl IntoIterator<Item = impl Into<Value>>) -> i64 {
        let values = encode_all(codec, "LPUSH", values)?;
        Ok(Cmd::new("LPUSH").arg(key).args(values).into())
    }

    fn rpush(key: &str, values: impl IntoIterator<Item = impl Into<Value>>) -> i64 {
        let values = encode_all(codec, "RPUSH", values)?;
        Ok(Cmd::new("RPUSH").arg(key).args(values).into())
    }

    fn lpushx(key: &str, value: impl Into<Value>) -> i64 {
        Ok(Cmd::new("LPUSHX").arg(key).arg(encode(codec, value)?).into())
    }

    fn rpushx(key: &str, value: impl Into<Value>) -> i64 {
        Ok(Cmd::new("RPUSHX").arg(key).arg(encode(codec, value)?).into())
    }

    fn lpop(key: &str) -> Option<Value> {
        Ok(Cmd::new("LPOP").arg(key).into())
    }

    fn rpop(key: &str) -> Option<Value> {
        Ok(Cmd::new("RPOP").arg(key).into())
    }

    fn llen(key: &str) -> i64 {
        Ok(Cmd::new("LLEN").arg(key).into())
    }

    fn lrange(key: &str, start: i64, stop: i64) -> Vec<Value> {
        Ok(Cmd::new("LRANGE").arg(key).arg(start).arg(stop).into())
    }

    /// Every element of the list.
    fn lmembers(key: &str) -> Vec<Value> {
        Ok(Cmd::new("LRANGE").arg(key).arg(0i64).arg(-1i64).into())
    }

    fn lindex(key: &str, index: i64) -> Option<Value> {
        Ok(Cmd::new("LINDEX").arg(key).arg(index).into())
    }

    fn lset(key: &str, index: i64, value: impl Into<Value>) -> bool {
        Ok(Cmd::new("LSET").arg(key).arg(index).arg(encode(codec, value)?).into())
    }

    fn lrem(key: &str, count: i64, value: impl Into<Value>) -> i64 {
        Ok(Cmd::new("LREM").arg(key).arg(count).arg(encode(codec, value)?).into())
    }

    fn linsert(
        key: &str,
        position: InsertPosition,
        pivot: impl Into<Value>,
        value: impl Into<Value>,
    ) -> i64 {
        Ok(Cmd::new("LINSERT")
            .arg(key)
            .arg(position.to_string())
            .arg(encode(codec, pivot)?)
            .arg(encode(codec, value)?)
            .into())
    }

    fn ltrim(key: &str, start: i64, stop: i64) -> bool {
        Ok(Cmd::new("LTRIM").arg(key).arg(start).arg(stop).into())
    }

    fn rpoplpush(src: &str, dst: &str) -> Option<Value> {
        Ok(Cmd::new("RPOPLPUSH").arg(src).arg(dst).into())
    }

    /// Pops from the first non-empty list of `keys`, waiting up to `timeout` seconds (`0`
    /// waits forever). Returns the list name and the value, or `None` on timeout.
    fn blpop(keys: &[&str], timeout: u64) -> Option<(String, Value)> {
        let keys = non_empty("BLPOP", keys.to_vec())?;
        Ok(Cmd::new("BLPOP").args(keys).arg(timeout).into())
    }

    fn brpop(keys: &[&str], timeout: u64) -> Option<(String, Value)> {
        let keys = non_empty("BRPOP", keys.to_vec())?;
        Ok(Cmd::new("BRPOP").args(keys).arg(timeout).into())
    }

    fn brpoplpush(src: &str, dst: &str, timeout: u64) -> Option<Value> {
        Ok(Cmd::new("BRPOPLPUSH").arg(src).arg(dst).arg(timeout).into())
    }

    // Geo

    /// Adds `(longitude, latitude, member)` triples. Only the members are encoded.
    fn geoadd(key: &str, items: impl IntoIterator<Item = (f64, f64, impl Into<Value>)>) -> i64 {
        let mut cmd = Cmd::new("GEOADD").arg(key);
        let mut added = 0;
        for (longitude, latitude, member) in items {
            cmd = cmd.arg(longitude).arg(latitude).arg(encode(codec, member)?);
            added += 1;
        }
        if added == 0 {
            return Err(Error::shape("GEOADD needs at least one member"));
        }
        Ok(cmd.into())
    }

    fn geodist(
        key: &str,
        member1: impl Into<Value>,
        member2: impl Into<Value>,
        unit: Option<GeoUnit>,
    ) -> Option<f64> {
        Ok(Cmd::new("GEODIST")
            .arg(key)
            .arg(encode(codec, member1)?)
            .arg(encode(codec, member2)?)
            .args(unit.map(|unit| unit.to_string()))
            .into())
    }

    fn geohash(key: &str, members: impl IntoIterator<Item = impl Into<Value>>) -> Vec<Option<String>> {
        let members = encode_all(codec, "GEOHASH", members)?;
        Ok(Cmd::new("GEOHASH").arg(key).args(members).into())
    }

    fn geopos(
        key: &str,
        members: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Vec<Option<(f64, f64)>> {
        let members = encode_all(codec, "GEOPOS", members)?;
        Ok(Cmd::new("GEOPOS").arg(key).args(members).into())
    }

    fn georadius(
        key: &str,
        longitude: f64,
        latitude: f64,
        radius: f64,
        unit: GeoUnit,
        options: GeoRadiusOptions,
    ) -> Vec<GeoMember> {
        let cmd = Cmd::new("GEORADIUS").arg(key).arg(longitude).arg(latitude).arg(radius);
        Ok(radius_request(cmd, unit, &options))
    }

    fn georadiusbymember(
        key: &str,
        member: impl Into<Value>,
        radius: f64,
        unit: GeoUnit,
        options: GeoRadiusOptions,
    ) -> Vec<GeoMember> {
        let cmd = Cmd::new("GEORADIUSBYMEMBER")
            .arg(key)
            .arg(encode(codec, member)?)
            .arg(radius);
        Ok(radius_request(cmd, unit, &options))
    }

    /// Stores the matching members in `dest`, with their distance as score when `store_dist`
    /// is set. Returns the number of members stored.
    fn georadius_store(
        key: &str,
        longitude: f64,
        latitude: f64,
        radius: f64,
        unit: GeoUnit,
        dest: &str,
        store_dist: bool,
    ) -> i64 {
        let cmd = Cmd::new("GEORADIUS")
            .arg(key)
            .arg(longitude)
            .arg(latitude)
            .arg(radius)
            .arg(unit.to_string())
            .arg(if store_dist { "STOREDIST" } else { "STORE" })
            .arg(dest);
        Ok(Request::new(cmd).with_options(ReplyOptions::store()))
    }

    // Sort

    /// Server side sort. Fails with `OperationNotSupported` for `alpha` when the codec does not
    /// preserve lexical order, and for `by` when it does not store numbers as text.
    fn sort(key: &str, options: SortOptions) -> Vec<Value> {
        sort_request(codec, key, options, None)
    }

    /// Like [`SerializedClient::sort`], storing the result in `dest`. Returns its length.
    fn sort_store(key: &str, options: SortOptions, dest: &str) -> i64 {
        sort_request(codec, key, options, Some(dest))
    }

    // Pub/sub

    fn publish(channel: &str, message: impl Into<Value>) -> i64 {
        Ok(Cmd::new("PUBLISH").arg(channel).arg(encode(codec, message)?).into())
    }

    fn pubsub_channels(pattern: Option<&str>) -> Vec<String> {
        let cmd = Cmd::new("PUBSUB").arg("CHANNELS").args(pattern);
        Ok(Request::new(cmd).with_callback("PUBSUB CHANNELS"))
    }

    fn pubsub_numsub(channels: &[&str]) -> Vec<(String, i64)> {
        let cmd = Cmd::new("PUBSUB").arg("NUMSUB").args(channels.to_vec());
        Ok(Request::new(cmd).with_callback("PUBSUB NUMSUB"))
    }

    fn pubsub_numpat() -> i64 {
        let cmd = Cmd::new("PUBSUB").arg("NUMPAT");
        Ok(Request::new(cmd).with_callback("PUBSUB NUMPAT"))
    }
}

fn encode(codec: &dyn Codec, value: impl Into<Value>) -> Result<Bytes> {
    codec.serialize(&value.into())
}

fn encode_all(
    codec: &dyn Codec,
    command: &str,
    values: impl IntoIterator<Item = impl Into<Value>>,
) -> Result<Vec<Bytes>> {
    let encoded = values
        .into_iter()
        .map(|value| encode(codec, value))
        .collect::<Result<Vec<_>>>()?;
    non_empty(command, encoded)
}

fn encode_mapping(
    codec: &dyn Codec,
    command: &str,
    mapping: impl IntoIterator<Item = (impl AsRef<str>, impl Into<Value>)>,
) -> Result<Vec<(Bytes, Bytes)>> {
    let pairs = mapping
        .into_iter()
        .map(|(name, value)| -> Result<(Bytes, Bytes)> {
            let name = Bytes::copy_from_slice(name.as_ref().as_bytes());
            Ok((name, encode(codec, value)?))
        })
        .collect::<Result<Vec<_>>>()?;
    non_empty(command, pairs)
}

fn flatten(pairs: Vec<(Bytes, Bytes)>) -> impl Iterator<Item = Bytes> {
    pairs.into_iter().flat_map(|(name, value)| [name, value])
}

fn non_empty<T>(command: &str, items: Vec<T>) -> Result<Vec<T>> {
    if items.is_empty() {
        return Err(Error::shape(format!(
            "{} needs at least one argument",
            command
        )));
    }
    Ok(items)
}

fn numeric_text(codec: &dyn Codec, command: &str) -> Result<()> {
    if codec.is_numeric_text() {
        return Ok(());
    }
    Err(Error::not_supported(format!(
        "{} needs numbers stored as decimal text, the {} codec does not store them that way",
        command,
        codec.name()
    )))
}

/// Turns a scan pattern into the bytes sent with `MATCH`.
fn member_pattern(codec: &dyn Codec, pattern: &str) -> Result<Bytes> {
    if pattern.contains(['*', '?', '[']) {
        return Ok(Bytes::copy_from_slice(pattern.as_bytes()));
    }
    let encoded = encode(codec, pattern)?;
    Ok(escape_glob(&encoded))
}

/// Escapes glob metacharacters so that `raw` only matches itself.
pub(crate) fn escape_glob(raw: &[u8]) -> Bytes {
    let mut escaped = BytesMut::with_capacity(raw.len() + 2);
    for &byte in raw {
        if matches!(byte, b'*' | b'?' | b'[' | b']' | b'\\') {
            escaped.put_u8(b'\\');
        }
        escaped.put_u8(byte);
    }
    escaped.freeze()
}

fn scan_cmd(
    name: &str,
    key: Option<&str>,
    cursor: u64,
    pattern: Option<Bytes>,
    count: Option<u64>,
) -> Cmd {
    let mut cmd = Cmd::new(name).args(key).arg(cursor);
    if let Some(pattern) = pattern {
        cmd = cmd.arg("MATCH").arg(pattern);
    }
    if let Some(count) = count {
        cmd = cmd.arg("COUNT").arg(count);
    }
    cmd
}

fn as_list(cmd: Cmd) -> Request {
    Request::new(cmd).with_options(ReplyOptions::as_list())
}

fn with_scores(cmd: Cmd) -> Request {
    Request::new(cmd.arg("WITHSCORES")).with_options(ReplyOptions::with_scores())
}

fn with_limit(cmd: Cmd, limit: Option<(i64, i64)>) -> Cmd {
    match limit {
        Some((offset, count)) => cmd.arg("LIMIT").arg(offset).arg(count),
        None => cmd,
    }
}

fn zstore(
    name: &str,
    dest: &str,
    keys: &[&str],
    aggregate: Option<Aggregate>,
) -> Result<Request> {
    let keys = non_empty(name, keys.to_vec())?;
    let mut cmd = Cmd::new(name).arg(dest).arg(keys.len()).args(keys);
    if let Some(aggregate) = aggregate {
        cmd = cmd.arg("AGGREGATE").arg(aggregate.to_string());
    }
    Ok(cmd.into())
}

fn radius_request(cmd: Cmd, unit: GeoUnit, options: &GeoRadiusOptions) -> Request {
    let mut cmd = cmd
        .arg(unit.to_string())
        .flag(options.with_dist, "WITHDIST")
        .flag(options.with_coord, "WITHCOORD")
        .flag(options.with_hash, "WITHHASH");
    if let Some(count) = options.count {
        cmd = cmd.arg("COUNT").arg(count);
    }
    if let Some(order) = options.order {
        cmd = cmd.arg(order.to_string());
    }

    Request::new(cmd).with_options(ReplyOptions {
        with_dist: options.with_dist,
        with_coord: options.with_coord,
        with_hash: options.with_hash,
        ..Default::default()
    })
}

fn sort_request(
    codec: &dyn Codec,
    key: &str,
    options: SortOptions,
    dest: Option<&str>,
) -> Result<Request> {
    if options.alpha && !codec.preserves_lexical_order() {
        return Err(Error::not_supported(format!(
            "SORT with ALPHA compares encoded bytes, which the {} codec does not keep in order",
            codec.name()
        )));
    }
    if options.by.is_some() && !codec.is_numeric_text() {
        return Err(Error::not_supported(format!(
            "SORT with BY needs numeric weights, which the {} codec does not store as text",
            codec.name()
        )));
    }

    let mut cmd = Cmd::new("SORT").arg(key);
    if let Some(by) = &options.by {
        cmd = cmd.arg("BY").arg(by);
    }
    if let Some((offset, count)) = options.limit {
        cmd = cmd.arg("LIMIT").arg(offset).arg(count);
    }
    for pattern in &options.get {
        cmd = cmd.arg("GET").arg(pattern);
    }
    // The server cannot parse binary encoded numbers, so they are compared as bytes.
    let alpha = options.alpha || !codec.is_numeric_text();
    cmd = cmd.flag(options.desc, "DESC").flag(alpha, "ALPHA");

    match dest {
        Some(dest) => Ok(Request::new(cmd.arg("STORE").arg(dest)).with_options(ReplyOptions::store())),
        None => Ok(cmd.into()),
    }
}
