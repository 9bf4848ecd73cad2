//! An in-process implementation of [`Client`] backed by a shared [`Store`].
//!
//! `MemoryClient` answers the commands the serialized client issues the way a Redis server
//! would, replies included, without any network. Clients created from clones of the same
//! store see the same keys and the same publish/subscribe bus.

mod hashes;
mod keys;
mod lists;
mod sets;
mod strings;
mod zsets;

use std::collections::{HashMap, HashSet, VecDeque};
use std::str;
use std::time::Duration;
use std::vec;

use bytes::Bytes;
use glob_match::glob_match;
use thiserror::Error as ThisError;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{self, Instant};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::client::Client;
use crate::cmd::{format_float, Cmd};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::store::{Entry, InnerStoreLocked, Published, Store};

type CommandResult = std::result::Result<Frame, CommandError>;

// Everything `execute` dispatches on, checked when a command is queued inside `MULTI`.
const COMMANDS: &[&str] = &[
    "APPEND", "BLPOP", "BRPOP", "BRPOPLPUSH", "DBSIZE", "DECR", "DECRBY", "DEL", "EXISTS",
    "EXPIRE", "FLUSHDB", "GET", "GETSET", "HDEL", "HEXISTS", "HGET", "HGETALL", "HINCRBY",
    "HINCRBYFLOAT", "HKEYS", "HLEN", "HMGET", "HMSET", "HSCAN", "HSET", "HSETNX", "HVALS", "INCR",
    "INCRBY", "INCRBYFLOAT", "KEYS", "LINDEX", "LINSERT", "LLEN", "LPOP", "LPUSH", "LPUSHX",
    "LRANGE", "LREM", "LSET", "LTRIM", "MGET", "MSET", "MSETNX", "PERSIST", "PEXPIRE", "PING",
    "PSETEX", "PTTL", "PUBLISH", "PUBSUB", "RENAME", "RENAMENX", "RPOP", "RPOPLPUSH", "RPUSH",
    "RPUSHX", "SADD", "SCAN", "SCARD", "SDIFF", "SDIFFSTORE", "SET", "SETEX", "SETNX", "SINTER",
    "SINTERSTORE", "SISMEMBER", "SMEMBERS", "SMOVE", "SORT", "SPOP", "SRANDMEMBER", "SREM",
    "SSCAN", "STRLEN", "SUNION", "SUNIONSTORE", "TTL", "TYPE", "ZADD", "ZCARD", "ZCOUNT",
    "ZINCRBY", "ZINTERSTORE", "ZRANGE", "ZRANGEBYSCORE", "ZRANK", "ZREM", "ZREMRANGEBYRANK",
    "ZREMRANGEBYSCORE", "ZREVRANGE", "ZREVRANGEBYSCORE", "ZREVRANK", "ZSCAN", "ZSCORE",
    "ZUNIONSTORE",
];

// Commands that may hand elements to a blocked pop.
const LIST_WRITES: &[&str] = &[
    "LPUSH", "RPUSH", "LPUSHX", "RPUSHX", "LINSERT", "LSET", "RPOPLPUSH", "BRPOPLPUSH", "RENAME",
    "RENAMENX", "SORT",
];

const SUBSCRIBED_COMMANDS: &[&str] = &["SUBSCRIBE", "PSUBSCRIBE", "UNSUBSCRIBE", "PUNSUBSCRIBE", "PING"];

/// A [`Client`] that executes commands against an in-memory [`Store`].
pub struct MemoryClient {
    id: Uuid,
    store: Store,
    watched: HashMap<String, u64>,
    multi: Option<Vec<Cmd>>,
    // A command was refused while queueing, so `EXEC` must abort.
    multi_failed: bool,
    channels: HashSet<String>,
    patterns: HashSet<String>,
    events: Option<broadcast::Receiver<Published>>,
    pending: VecDeque<Frame>,
}

impl MemoryClient {
    /// A client with a store of its own. Must be called from within a Tokio runtime.
    pub fn new() -> MemoryClient {
        MemoryClient::with_store(Store::new())
    }

    /// A client sharing `store` with every other client created from it.
    pub fn with_store(store: Store) -> MemoryClient {
        MemoryClient {
            id: Uuid::new_v4(),
            store,
            watched: HashMap::new(),
            multi: None,
            multi_failed: false,
            channels: HashSet::new(),
            patterns: HashSet::new(),
            events: None,
            pending: VecDeque::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn subscriptions(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }

    /// Runs one command. Returns the reply followed by any additional frames it produced, as
    /// subscription changes acknowledge every channel separately.
    #[instrument(name = "memory", skip(self, cmd), fields(client_id = %self.id, command = %cmd.name()))]
    async fn run(&mut self, cmd: Cmd) -> Vec<Frame> {
        let name = cmd.name();

        if self.subscriptions() > 0 && !SUBSCRIBED_COMMANDS.contains(&name.as_str()) {
            return vec![error(CommandError::Subscribed(name.to_lowercase()))];
        }

        let reply = match name.as_str() {
            "MULTI" => self.multi(),
            "EXEC" => self.exec(),
            "DISCARD" => self.discard(),
            "WATCH" => self.watch(&cmd),
            "UNWATCH" => {
                self.watched.clear();
                Ok(Frame::ok())
            }
            "SUBSCRIBE" | "PSUBSCRIBE" => return self.subscribe(&cmd, name == "PSUBSCRIBE"),
            "UNSUBSCRIBE" | "PUNSUBSCRIBE" => return self.unsubscribe(&cmd, name == "PUNSUBSCRIBE"),
            _ if self.multi.is_some() => self.enqueue(cmd),
            "BLPOP" | "BRPOP" | "BRPOPLPUSH" => blocking_pop(&self.store, &cmd).await,
            _ => Ok(self.execute_now(&cmd)),
        };

        vec![reply.unwrap_or_else(error)]
    }

    fn execute_now(&self, cmd: &Cmd) -> Frame {
        execute_locked(&mut self.store.lock(), cmd)
    }

    fn multi(&mut self) -> CommandResult {
        if self.multi.is_some() {
            return Err(CommandError::NestedMulti);
        }
        self.multi = Some(Vec::new());
        self.multi_failed = false;
        Ok(Frame::ok())
    }

    fn enqueue(&mut self, cmd: Cmd) -> CommandResult {
        if !COMMANDS.contains(&cmd.name().as_str()) {
            self.multi_failed = true;
            return Err(CommandError::UnknownCommand(cmd.name().to_lowercase()));
        }
        if let Some(queue) = self.multi.as_mut() {
            queue.push(cmd);
        }
        Ok(Frame::Simple("QUEUED".to_string()))
    }

    fn exec(&mut self) -> CommandResult {
        let queue = self.multi.take().ok_or(CommandError::WithoutMulti("EXEC"))?;
        let watched = std::mem::take(&mut self.watched);

        if std::mem::replace(&mut self.multi_failed, false) {
            return Err(CommandError::ExecAbort);
        }

        // The whole transaction runs under one lock, so no other client interleaves.
        let mut store = self.store.lock();
        let changed = watched
            .iter()
            .any(|(key, version)| store.version(key) != *version);
        if changed {
            debug!(keys = watched.len(), "watched key changed, aborting transaction");
            return Ok(Frame::Null);
        }

        let replies = queue
            .iter()
            .map(|cmd| execute_locked(&mut store, cmd))
            .collect();
        Ok(Frame::Array(replies))
    }

    fn discard(&mut self) -> CommandResult {
        self.multi
            .take()
            .ok_or(CommandError::WithoutMulti("DISCARD"))?;
        self.multi_failed = false;
        self.watched.clear();
        Ok(Frame::ok())
    }

    fn watch(&mut self, cmd: &Cmd) -> CommandResult {
        if self.multi.is_some() {
            return Err(CommandError::WatchInMulti);
        }
        let mut parser = CommandParser::new(cmd);
        let keys = parser.remaining_strings_required()?;

        let store = self.store.lock();
        for key in keys {
            let version = store.version(&key);
            self.watched.entry(key).or_insert(version);
        }
        Ok(Frame::ok())
    }

    fn subscribe(&mut self, cmd: &Cmd, pattern: bool) -> Vec<Frame> {
        let mut parser = CommandParser::new(cmd);
        let names = match parser.remaining_strings_required() {
            Ok(names) => names,
            Err(err) => return vec![error(err)],
        };

        if self.events.is_none() {
            self.events = Some(self.store.events());
        }

        let kind = if pattern { "psubscribe" } else { "subscribe" };
        let mut acks = Vec::with_capacity(names.len());
        for name in names {
            let added = if pattern {
                self.patterns.insert(name.clone())
            } else {
                self.channels.insert(name.clone())
            };
            if added {
                self.store.lock().add_subscription(&name, pattern);
            }
            acks.push(subscription_ack(kind, Some(&name), self.subscriptions()));
        }
        acks
    }

    fn unsubscribe(&mut self, cmd: &Cmd, pattern: bool) -> Vec<Frame> {
        let mut parser = CommandParser::new(cmd);
        let mut names = parser.remaining_strings();
        if names.is_empty() {
            let current = if pattern { &self.patterns } else { &self.channels };
            names = current.iter().cloned().collect();
            names.sort();
        }

        let kind = if pattern { "punsubscribe" } else { "unsubscribe" };
        if names.is_empty() {
            return vec![subscription_ack(kind, None, self.subscriptions())];
        }

        let mut acks = Vec::with_capacity(names.len());
        for name in names {
            let removed = if pattern {
                self.patterns.remove(&name)
            } else {
                self.channels.remove(&name)
            };
            if removed {
                self.store.lock().remove_subscription(&name, pattern);
            }
            acks.push(subscription_ack(kind, Some(&name), self.subscriptions()));
        }

        if self.subscriptions() == 0 {
            self.events = None;
        }
        acks
    }

    // Turns a published message into the pushes this client should see.
    fn route(&mut self, published: Published) {
        if self.channels.contains(&published.channel) {
            self.pending.push_back(Frame::Array(vec![
                Frame::bulk("message"),
                Frame::bulk(published.channel.clone()),
                Frame::Bulk(published.payload.clone()),
            ]));
        }

        let mut patterns: Vec<&String> = self
            .patterns
            .iter()
            .filter(|pattern| matches_pattern(pattern.as_bytes(), published.channel.as_bytes()))
            .collect();
        patterns.sort();
        for pattern in patterns {
            self.pending.push_back(Frame::Array(vec![
                Frame::bulk("pmessage"),
                Frame::bulk(pattern.clone()),
                Frame::bulk(published.channel.clone()),
                Frame::Bulk(published.payload.clone()),
            ]));
        }
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        if self.subscriptions() == 0 {
            return;
        }
        let mut store = self.store.lock();
        for channel in &self.channels {
            store.remove_subscription(channel, false);
        }
        for pattern in &self.patterns {
            store.remove_subscription(pattern, true);
        }
    }
}

impl Client for MemoryClient {
    async fn request(&mut self, cmd: Cmd) -> Result<Frame> {
        let mut frames = self.run(cmd).await.into_iter();
        let reply = frames.next().unwrap_or(Frame::Null);
        self.pending.extend(frames);
        Ok(reply)
    }

    async fn request_batch(&mut self, cmds: Vec<Cmd>) -> Result<Vec<Frame>> {
        let mut replies = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            replies.push(self.request(cmd).await?);
        }
        Ok(replies)
    }

    async fn send(&mut self, cmd: Cmd) -> Result<()> {
        let frames = self.run(cmd).await;
        self.pending.extend(frames);
        Ok(())
    }

    async fn next_push(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }

            let events = match self.events.as_mut() {
                Some(events) => events,
                None => match deadline {
                    Some(deadline) => {
                        time::sleep_until(deadline).await;
                        return Ok(None);
                    }
                    None => {
                        return Err(Error::InvalidState(
                            "waiting for messages without any subscription".to_string(),
                        ))
                    }
                },
            };

            let received = match deadline {
                Some(deadline) => match time::timeout_at(deadline, events.recv()).await {
                    Ok(received) => received,
                    Err(_) => return Ok(None),
                },
                None => events.recv().await,
            };

            match received {
                Ok(published) => self.route(published),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(client_id = %self.id, skipped, "subscriber lagging, messages dropped")
                }
                Err(RecvError::Closed) => return Err(Error::ConnectionClosed),
            }
        }
    }
}

// Pops right away when an element is available, otherwise waits for a list write. A timeout of
// zero waits forever.
async fn blocking_pop(store: &Store, cmd: &Cmd) -> CommandResult {
    let timeout = {
        let parts = cmd.parts();
        let raw = parts.last().ok_or_else(|| CommandError::WrongArity(cmd.name()))?;
        parse_float(raw).ok_or(CommandError::InvalidTimeout)?
    };
    if timeout < 0.0 {
        return Err(CommandError::NegativeTimeout);
    }
    let deadline = (timeout > 0.0).then(|| Instant::now() + Duration::from_secs_f64(timeout));

    loop {
        let notified = store.lists_changed().notified();
        tokio::pin!(notified);
        // Registers interest before looking at the lists, so no push is missed in between.
        notified.as_mut().enable();

        let reply = {
            let mut store = store.lock();
            lists::pop_blocking(&mut store, cmd)?
        };
        if reply != Frame::Null {
            return Ok(reply);
        }

        match deadline {
            Some(deadline) => {
                if time::timeout_at(deadline, notified).await.is_err() {
                    return Ok(Frame::Null);
                }
            }
            None => notified.await,
        }
    }
}

/// Executes a data command against a locked store and renders errors as error replies.
fn execute_locked(store: &mut InnerStoreLocked<'_>, cmd: &Cmd) -> Frame {
    let name = cmd.name();
    let mut parser = CommandParser::new(cmd);
    let reply = execute(store, &name, &mut parser).unwrap_or_else(error);

    if LIST_WRITES.contains(&name.as_str()) && !matches!(reply, Frame::Error(_)) {
        store.notify_lists_changed();
    }
    reply
}

fn execute(store: &mut InnerStoreLocked<'_>, name: &str, parser: &mut CommandParser) -> CommandResult {
    match name {
        "PING" => Ok(Frame::Simple("PONG".to_string())),
        "DBSIZE" => Ok(Frame::Integer(store.size() as i64)),
        "FLUSHDB" => {
            store.flush();
            Ok(Frame::ok())
        }
        "PUBLISH" => publish(store, parser),
        "PUBSUB" => pubsub(store, parser),

        "GET" => strings::get(store, parser),
        "SET" => strings::set(store, parser),
        "SETNX" => strings::setnx(store, parser),
        "SETEX" => strings::setex(store, parser, TimeUnit::Seconds),
        "PSETEX" => strings::setex(store, parser, TimeUnit::Millis),
        "GETSET" => strings::getset(store, parser),
        "MGET" => strings::mget(store, parser),
        "MSET" => strings::mset(store, parser),
        "MSETNX" => strings::msetnx(store, parser),
        "APPEND" => strings::append(store, parser),
        "STRLEN" => strings::strlen(store, parser),
        "INCR" => strings::incr_by(store, parser, Some(1)),
        "DECR" => strings::incr_by(store, parser, Some(-1)),
        "INCRBY" => strings::incr_by(store, parser, None),
        "DECRBY" => strings::decr_by(store, parser),
        "INCRBYFLOAT" => strings::incr_by_float(store, parser),

        "DEL" => keys::del(store, parser),
        "EXISTS" => keys::exists(store, parser),
        "TYPE" => keys::key_type(store, parser),
        "KEYS" => keys::keys(store, parser),
        "SCAN" => keys::scan(store, parser),
        "EXPIRE" => keys::expire(store, parser, TimeUnit::Seconds),
        "PEXPIRE" => keys::expire(store, parser, TimeUnit::Millis),
        "TTL" => keys::ttl(store, parser, TimeUnit::Seconds),
        "PTTL" => keys::ttl(store, parser, TimeUnit::Millis),
        "PERSIST" => keys::persist(store, parser),
        "RENAME" => keys::rename(store, parser, false),
        "RENAMENX" => keys::rename(store, parser, true),
        "SORT" => keys::sort(store, parser),

        "HSET" => hashes::hset(store, parser),
        "HMSET" => hashes::hmset(store, parser),
        "HSETNX" => hashes::hsetnx(store, parser),
        "HGET" => hashes::hget(store, parser),
        "HMGET" => hashes::hmget(store, parser),
        "HGETALL" => hashes::hgetall(store, parser),
        "HKEYS" => hashes::hkeys(store, parser),
        "HVALS" => hashes::hvals(store, parser),
        "HDEL" => hashes::hdel(store, parser),
        "HEXISTS" => hashes::hexists(store, parser),
        "HLEN" => hashes::hlen(store, parser),
        "HINCRBY" => hashes::hincrby(store, parser),
        "HINCRBYFLOAT" => hashes::hincrbyfloat(store, parser),
        "HSCAN" => hashes::hscan(store, parser),

        "LPUSH" => lists::push(store, parser, lists::End::Front, false),
        "RPUSH" => lists::push(store, parser, lists::End::Back, false),
        "LPUSHX" => lists::push(store, parser, lists::End::Front, true),
        "RPUSHX" => lists::push(store, parser, lists::End::Back, true),
        "LPOP" => lists::pop(store, parser, lists::End::Front),
        "RPOP" => lists::pop(store, parser, lists::End::Back),
        "LLEN" => lists::llen(store, parser),
        "LRANGE" => lists::lrange(store, parser),
        "LINDEX" => lists::lindex(store, parser),
        "LSET" => lists::lset(store, parser),
        "LREM" => lists::lrem(store, parser),
        "LINSERT" => lists::linsert(store, parser),
        "LTRIM" => lists::ltrim(store, parser),
        "RPOPLPUSH" => lists::rpoplpush(store, parser),
        "BLPOP" | "BRPOP" | "BRPOPLPUSH" => lists::pop_blocking_parsed(store, name, parser),

        "SADD" => sets::sadd(store, parser),
        "SREM" => sets::srem(store, parser),
        "SISMEMBER" => sets::sismember(store, parser),
        "SMEMBERS" => sets::smembers(store, parser),
        "SCARD" => sets::scard(store, parser),
        "SPOP" => sets::spop(store, parser),
        "SRANDMEMBER" => sets::srandmember(store, parser),
        "SMOVE" => sets::smove(store, parser),
        "SDIFF" => sets::combine(store, parser, sets::SetOp::Diff, false),
        "SINTER" => sets::combine(store, parser, sets::SetOp::Inter, false),
        "SUNION" => sets::combine(store, parser, sets::SetOp::Union, false),
        "SDIFFSTORE" => sets::combine(store, parser, sets::SetOp::Diff, true),
        "SINTERSTORE" => sets::combine(store, parser, sets::SetOp::Inter, true),
        "SUNIONSTORE" => sets::combine(store, parser, sets::SetOp::Union, true),
        "SSCAN" => sets::sscan(store, parser),

        "ZADD" => zsets::zadd(store, parser),
        "ZREM" => zsets::zrem(store, parser),
        "ZSCORE" => zsets::zscore(store, parser),
        "ZINCRBY" => zsets::zincrby(store, parser),
        "ZRANK" => zsets::zrank(store, parser, false),
        "ZREVRANK" => zsets::zrank(store, parser, true),
        "ZCARD" => zsets::zcard(store, parser),
        "ZCOUNT" => zsets::zcount(store, parser),
        "ZRANGE" => zsets::zrange(store, parser, false),
        "ZREVRANGE" => zsets::zrange(store, parser, true),
        "ZRANGEBYSCORE" => zsets::zrangebyscore(store, parser, false),
        "ZREVRANGEBYSCORE" => zsets::zrangebyscore(store, parser, true),
        "ZREMRANGEBYRANK" => zsets::zremrangebyrank(store, parser),
        "ZREMRANGEBYSCORE" => zsets::zremrangebyscore(store, parser),
        "ZUNIONSTORE" => zsets::zstore(store, parser, false),
        "ZINTERSTORE" => zsets::zstore(store, parser, true),
        "ZSCAN" => zsets::zscan(store, parser),

        _ => Err(CommandError::UnknownCommand(name.to_lowercase())),
    }
}

fn publish(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let channel = parser.next_string()?;
    let payload = parser.next_bytes()?;
    parser.finish()?;

    let receivers = store.publish(&channel, payload, |pattern, channel| {
        matches_pattern(pattern.as_bytes(), channel.as_bytes())
    });
    Ok(Frame::Integer(receivers as i64))
}

fn pubsub(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let subcommand = parser.next_string()?.to_uppercase();
    match subcommand.as_str() {
        "CHANNELS" => {
            let pattern = parser.next_optional_bytes();
            parser.finish()?;
            let mut channels: Vec<&String> = store
                .active_channels()
                .filter(|channel| match &pattern {
                    Some(pattern) => matches_pattern(pattern, channel.as_bytes()),
                    None => true,
                })
                .collect();
            channels.sort();
            Ok(bulk_array(channels.into_iter().map(|c| Bytes::from(c.clone()))))
        }
        "NUMSUB" => {
            let mut reply = Vec::new();
            for channel in parser.remaining_strings() {
                let count = store.channel_subscribers(&channel);
                reply.push(Frame::bulk(channel));
                reply.push(Frame::Integer(count as i64));
            }
            Ok(Frame::Array(reply))
        }
        "NUMPAT" => {
            parser.finish()?;
            Ok(Frame::Integer(store.pattern_count() as i64))
        }
        _ => Err(CommandError::UnknownSubcommand(subcommand, "PUBSUB")),
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum TimeUnit {
    Seconds,
    Millis,
}

impl TimeUnit {
    pub(crate) fn duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Millis => Duration::from_millis(amount),
        }
    }

    /// Renders a remaining time-to-live, rounded to the nearest unit.
    pub(crate) fn count(self, ttl: Duration) -> i64 {
        match self {
            TimeUnit::Seconds => ((ttl.as_millis() + 500) / 1000) as i64,
            TimeUnit::Millis => ttl.as_millis() as i64,
        }
    }
}

fn subscription_ack(kind: &str, name: Option<&str>, count: usize) -> Frame {
    Frame::Array(vec![
        Frame::bulk(kind.to_string()),
        match name {
            Some(name) => Frame::bulk(name.to_string()),
            None => Frame::Null,
        },
        Frame::Integer(count as i64),
    ])
}

fn error(err: CommandError) -> Frame {
    Frame::Error(err.to_string())
}

/// Glob style matching as used by `KEYS`, `SCAN` and pattern subscriptions.
pub(crate) fn matches_pattern(pattern: &[u8], subject: &[u8]) -> bool {
    let pattern = String::from_utf8_lossy(pattern)
        .replace('{', "\\{")
        .replace('}', "\\}");
    glob_match(&pattern, &String::from_utf8_lossy(subject))
}

pub(crate) fn bulk_array(items: impl IntoIterator<Item = Bytes>) -> Frame {
    Frame::Array(items.into_iter().map(Frame::Bulk).collect())
}

pub(crate) fn float_reply(value: f64) -> Frame {
    Frame::bulk(format_float(value))
}

pub(crate) fn parse_float(raw: &[u8]) -> Option<f64> {
    let text = str::from_utf8(raw).ok()?;
    let value = match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => f64::INFINITY,
        "-inf" => f64::NEG_INFINITY,
        _ => text.parse::<f64>().ok()?,
    };
    (!value.is_nan()).then_some(value)
}

/// Resolves an inclusive `start..=stop` range with negative indexes counted from the end.
/// Returns `None` when the range selects nothing.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// One page of a `SCAN` style iteration over `items`, which must come in a stable order. The
/// cursor is the offset of the next page and `0` once the iteration is complete.
pub(crate) fn scan_page<T>(
    items: Vec<T>,
    parser: &mut CommandParser,
    name: impl Fn(&T) -> &[u8],
) -> std::result::Result<(u64, Vec<T>), CommandError> {
    let cursor = parser.next_integer()?;
    let cursor = usize::try_from(cursor).map_err(|_| CommandError::InvalidCursor)?;

    let mut pattern = None;
    let mut count = 10usize;
    while let Some(option) = parser.next_optional_string() {
        match option.to_uppercase().as_str() {
            "MATCH" => pattern = Some(parser.next_bytes()?),
            "COUNT" => {
                count = usize::try_from(parser.next_integer()?)
                    .ok()
                    .filter(|count| *count > 0)
                    .ok_or(CommandError::Syntax)?
            }
            _ => return Err(CommandError::Syntax),
        }
    }

    let total = items.len();
    let end = cursor.saturating_add(count).min(total);
    let next = if end >= total { 0 } else { end as u64 };

    let page = items
        .into_iter()
        .skip(cursor)
        .take(end.saturating_sub(cursor))
        .filter(|item| match &pattern {
            Some(pattern) => matches_pattern(pattern, name(item)),
            None => true,
        })
        .collect();
    Ok((next, page))
}

pub(crate) fn scan_reply(cursor: u64, items: Vec<Frame>) -> Frame {
    Frame::Array(vec![
        Frame::bulk(cursor.to_string()),
        Frame::Array(items),
    ])
}

macro_rules! typed_access {
    ($get:ident, $get_mut:ident, $get_or_create:ident, $variant:ident, $ty:ty) => {
        #[allow(dead_code)]
        pub(crate) fn $get<'s>(
            store: &'s InnerStoreLocked<'_>,
            key: &str,
        ) -> std::result::Result<Option<&'s $ty>, CommandError> {
            match store.get(key) {
                None => Ok(None),
                Some(Entry::$variant(value)) => Ok(Some(value)),
                Some(_) => Err(CommandError::WrongType),
            }
        }

        #[allow(dead_code)]
        pub(crate) fn $get_mut<'s>(
            store: &'s mut InnerStoreLocked<'_>,
            key: &str,
        ) -> std::result::Result<Option<&'s mut $ty>, CommandError> {
            match store.get(key) {
                None => return Ok(None),
                Some(Entry::$variant(_)) => {}
                Some(_) => return Err(CommandError::WrongType),
            }
            match store.get_mut(key) {
                Some(Entry::$variant(value)) => Ok(Some(value)),
                _ => Ok(None),
            }
        }

        #[allow(dead_code)]
        pub(crate) fn $get_or_create<'s>(
            store: &'s mut InnerStoreLocked<'_>,
            key: &str,
        ) -> std::result::Result<&'s mut $ty, CommandError> {
            match store.get(key) {
                None | Some(Entry::$variant(_)) => {}
                Some(_) => return Err(CommandError::WrongType),
            }
            match store.get_or_insert_with(key, || Entry::$variant(Default::default())) {
                Entry::$variant(value) => Ok(value),
                _ => Err(CommandError::WrongType),
            }
        }
    };
}

typed_access!(string, string_mut, string_or_create, String, Bytes);
typed_access!(list, list_mut, list_or_create, List, VecDeque<Bytes>);
typed_access!(hash, hash_mut, hash_or_create, Hash, HashMap<Bytes, Bytes>);
typed_access!(set, set_mut, set_or_create, Set, HashSet<Bytes>);
typed_access!(zset, zset_mut, zset_or_create, ZSet, HashMap<Bytes, f64>);

/// Reads the arguments of a command one at a time.
pub(crate) struct CommandParser {
    name: String,
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    fn new(cmd: &Cmd) -> CommandParser {
        let mut parts = cmd.parts().to_vec().into_iter();
        // Skip the command name.
        parts.next();
        CommandParser {
            name: cmd.name().to_lowercase(),
            parts,
        }
    }

    pub(crate) fn next_bytes(&mut self) -> std::result::Result<Bytes, CommandError> {
        self.parts
            .next()
            .ok_or_else(|| CommandError::WrongArity(self.name.clone()))
    }

    pub(crate) fn next_string(&mut self) -> std::result::Result<String, CommandError> {
        let bytes = self.next_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub(crate) fn next_integer(&mut self) -> std::result::Result<i64, CommandError> {
        let bytes = self.next_bytes()?;
        str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(CommandError::NotInteger)
    }

    pub(crate) fn next_float(&mut self) -> std::result::Result<f64, CommandError> {
        let bytes = self.next_bytes()?;
        parse_float(&bytes).ok_or(CommandError::NotFloat)
    }

    pub(crate) fn next_optional_bytes(&mut self) -> Option<Bytes> {
        self.parts.next()
    }

    pub(crate) fn next_optional_string(&mut self) -> Option<String> {
        self.parts
            .next()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub(crate) fn remaining(&mut self) -> Vec<Bytes> {
        self.parts.by_ref().collect()
    }

    pub(crate) fn remaining_required(&mut self) -> std::result::Result<Vec<Bytes>, CommandError> {
        let rest = self.remaining();
        if rest.is_empty() {
            return Err(CommandError::WrongArity(self.name.clone()));
        }
        Ok(rest)
    }

    pub(crate) fn remaining_strings(&mut self) -> Vec<String> {
        self.remaining()
            .into_iter()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .collect()
    }

    pub(crate) fn remaining_strings_required(
        &mut self,
    ) -> std::result::Result<Vec<String>, CommandError> {
        let rest = self.remaining_strings();
        if rest.is_empty() {
            return Err(CommandError::WrongArity(self.name.clone()));
        }
        Ok(rest)
    }

    /// Fails when arguments are left over.
    pub(crate) fn finish(&mut self) -> std::result::Result<(), CommandError> {
        match self.parts.next() {
            Some(_) => Err(CommandError::Syntax),
            None => Ok(()),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub(crate) enum CommandError {
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
    #[error("ERR unknown subcommand '{0}'. Try {1} HELP.")]
    UnknownSubcommand(String, &'static str),
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("ERR syntax error")]
    Syntax,
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("ERR value is not an integer or out of range")]
    NotInteger,
    #[error("ERR value is not a valid float")]
    NotFloat,
    #[error("ERR hash value is not an integer")]
    HashNotInteger,
    #[error("ERR hash value is not a float")]
    HashNotFloat,
    #[error("ERR increment or decrement would overflow")]
    Overflow,
    #[error("ERR increment would produce NaN or Infinity")]
    NotFinite,
    #[error("ERR no such key")]
    NoSuchKey,
    #[error("ERR index out of range")]
    OutOfRange,
    #[error("ERR min or max is not a float")]
    InvalidRange,
    #[error("ERR invalid cursor")]
    InvalidCursor,
    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(String),
    #[error("ERR timeout is not a float or out of range")]
    InvalidTimeout,
    #[error("ERR timeout is negative")]
    NegativeTimeout,
    #[error("ERR One or more scores can't be converted into double")]
    SortNotNumber,
    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,
    #[error("ERR {0} without MULTI")]
    WithoutMulti(&'static str),
    #[error("ERR WATCH inside MULTI is not allowed")]
    WatchInMulti,
    #[error("EXECABORT Transaction discarded because of previous errors.")]
    ExecAbort,
    #[error("ERR Can't execute '{0}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING are allowed in this context")]
    Subscribed(String),
}
