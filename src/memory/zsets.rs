use std::cmp::Ordering;
use std::collections::HashMap;

use bytes::Bytes;

use super::{
    float_reply, normalize_range, parse_float, scan_page, scan_reply, zset, zset_mut,
    zset_or_create, CommandError, CommandParser, CommandResult,
};
use crate::frame::Frame;
use crate::store::{Entry, InnerStoreLocked};

type ZSet = HashMap<Bytes, f64>;

/// Members ordered by score, then by member bytes.
fn ordered(zset: &ZSet) -> Vec<(Bytes, f64)> {
    let mut members: Vec<(Bytes, f64)> = zset
        .iter()
        .map(|(member, score)| (member.clone(), *score))
        .collect();
    members.sort_by(compare);
    members
}

fn compare(a: &(Bytes, f64), b: &(Bytes, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}

fn ordered_at(store: &InnerStoreLocked<'_>, key: &str) -> Result<Vec<(Bytes, f64)>, CommandError> {
    Ok(zset(store, key)?.map(ordered).unwrap_or_default())
}

fn members_reply(members: Vec<(Bytes, f64)>, with_scores: bool) -> Frame {
    let mut frames = Vec::with_capacity(members.len() * if with_scores { 2 } else { 1 });
    for (member, score) in members {
        frames.push(Frame::Bulk(member));
        if with_scores {
            frames.push(float_reply(score));
        }
    }
    Frame::Array(frames)
}

/// A score range bound: `1.5`, `(1.5` for exclusive, `-inf` or `+inf`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bound {
    value: f64,
    exclusive: bool,
}

impl Bound {
    fn parse(raw: &[u8]) -> Result<Bound, CommandError> {
        let (exclusive, raw) = match raw.first() {
            Some(b'(') => (true, &raw[1..]),
            _ => (false, raw),
        };
        let value = parse_float(raw).ok_or(CommandError::InvalidRange)?;
        Ok(Bound { value, exclusive })
    }

    fn above(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn below(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

// ZADD key [NX | XX] [CH] score member [score member ...]
pub(super) fn zadd(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let mut args = parser.remaining_required()?.into_iter().peekable();

    let mut nx = false;
    let mut xx = false;
    let mut ch = false;
    while let Some(flag) = args.peek() {
        match flag.to_ascii_uppercase().as_slice() {
            b"NX" => nx = true,
            b"XX" => xx = true,
            b"CH" => ch = true,
            _ => break,
        }
        args.next();
    }
    if nx && xx {
        return Err(CommandError::Syntax);
    }

    let rest: Vec<Bytes> = args.collect();
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(CommandError::Syntax);
    }
    let pairs = rest
        .chunks(2)
        .map(|pair| -> Result<(f64, Bytes), CommandError> {
            let score = parse_float(&pair[0]).ok_or(CommandError::NotFloat)?;
            Ok((score, pair[1].clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let zset = zset_or_create(store, &key)?;
    let mut added = 0;
    let mut changed = 0;
    for (score, member) in pairs {
        match zset.get(&member).copied() {
            Some(_) if nx => {}
            Some(previous) => {
                if previous != score {
                    zset.insert(member, score);
                    changed += 1;
                }
            }
            None if xx => {}
            None => {
                zset.insert(member, score);
                added += 1;
            }
        }
    }
    store.remove_if_empty(&key);

    Ok(Frame::Integer(if ch { added + changed } else { added }))
}

pub(super) fn zrem(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let members = parser.remaining_required()?;

    let removed = match zset_mut(store, &key)? {
        Some(zset) => members
            .iter()
            .filter(|member| zset.remove(*member).is_some())
            .count(),
        None => 0,
    };
    store.remove_if_empty(&key);
    Ok(Frame::Integer(removed as i64))
}

pub(super) fn zscore(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;
    parser.finish()?;

    let score = zset(store, &key)?.and_then(|zset| zset.get(&member).copied());
    Ok(score.map_or(Frame::Null, float_reply))
}

pub(super) fn zincrby(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let increment = parser.next_float()?;
    let member = parser.next_bytes()?;
    parser.finish()?;

    let zset = zset_or_create(store, &key)?;
    let score = zset.get(&member).copied().unwrap_or(0.0) + increment;
    if score.is_nan() {
        return Err(CommandError::NotFinite);
    }
    zset.insert(member, score);
    Ok(float_reply(score))
}

pub(super) fn zrank(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    reverse: bool,
) -> CommandResult {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;
    parser.finish()?;

    let members = ordered_at(store, &key)?;
    let rank = members.iter().position(|(m, _)| *m == member);
    Ok(match rank {
        Some(rank) if reverse => Frame::Integer((members.len() - 1 - rank) as i64),
        Some(rank) => Frame::Integer(rank as i64),
        None => Frame::Null,
    })
}

pub(super) fn zcard(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let len = zset(store, &key)?.map_or(0, HashMap::len);
    Ok(Frame::Integer(len as i64))
}

pub(super) fn zcount(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let min = Bound::parse(&parser.next_bytes()?)?;
    let max = Bound::parse(&parser.next_bytes()?)?;
    parser.finish()?;

    let count = zset(store, &key)?.map_or(0, |zset| {
        zset.values()
            .filter(|score| min.above(**score) && max.below(**score))
            .count()
    });
    Ok(Frame::Integer(count as i64))
}

// ZRANGE key start stop [WITHSCORES], ZREVRANGE key start stop [WITHSCORES]
pub(super) fn zrange(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    reverse: bool,
) -> CommandResult {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;
    let with_scores = match parser.next_optional_string() {
        Some(option) if option.eq_ignore_ascii_case("WITHSCORES") => true,
        Some(_) => return Err(CommandError::Syntax),
        None => false,
    };
    parser.finish()?;

    let mut members = ordered_at(store, &key)?;
    if reverse {
        members.reverse();
    }
    let selected = match normalize_range(start, stop, members.len()) {
        Some((start, stop)) => members.drain(start..=stop).collect(),
        None => Vec::new(),
    };
    Ok(members_reply(selected, with_scores))
}

// ZRANGEBYSCORE key min max [WITHSCORES] [LIMIT offset count], ZREVRANGEBYSCORE key max min ...
pub(super) fn zrangebyscore(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    reverse: bool,
) -> CommandResult {
    let key = parser.next_string()?;
    let first = Bound::parse(&parser.next_bytes()?)?;
    let second = Bound::parse(&parser.next_bytes()?)?;
    let (min, max) = if reverse { (second, first) } else { (first, second) };

    let mut with_scores = false;
    let mut limit = None;
    while let Some(option) = parser.next_optional_string() {
        match option.to_uppercase().as_str() {
            "WITHSCORES" => with_scores = true,
            "LIMIT" => limit = Some((parser.next_integer()?, parser.next_integer()?)),
            _ => return Err(CommandError::Syntax),
        }
    }

    let mut members: Vec<(Bytes, f64)> = ordered_at(store, &key)?
        .into_iter()
        .filter(|(_, score)| min.above(*score) && max.below(*score))
        .collect();
    if reverse {
        members.reverse();
    }

    if let Some((offset, count)) = limit {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        // A negative count means every remaining member.
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        members = members.into_iter().skip(offset).take(count).collect();
    }
    Ok(members_reply(members, with_scores))
}

pub(super) fn zremrangebyrank(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;
    parser.finish()?;

    let members = ordered_at(store, &key)?;
    let doomed: Vec<Bytes> = match normalize_range(start, stop, members.len()) {
        Some((start, stop)) => members[start..=stop]
            .iter()
            .map(|(member, _)| member.clone())
            .collect(),
        None => Vec::new(),
    };
    remove_members(store, &key, doomed)
}

pub(super) fn zremrangebyscore(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let min = Bound::parse(&parser.next_bytes()?)?;
    let max = Bound::parse(&parser.next_bytes()?)?;
    parser.finish()?;

    let doomed: Vec<Bytes> = ordered_at(store, &key)?
        .into_iter()
        .filter(|(_, score)| min.above(*score) && max.below(*score))
        .map(|(member, _)| member)
        .collect();
    remove_members(store, &key, doomed)
}

fn remove_members(store: &mut InnerStoreLocked<'_>, key: &str, members: Vec<Bytes>) -> CommandResult {
    let count = members.len();
    if count > 0 {
        if let Some(zset) = zset_mut(store, key)? {
            for member in &members {
                zset.remove(member);
            }
        }
        store.remove_if_empty(key);
    }
    Ok(Frame::Integer(count as i64))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Aggregate {
    Sum,
    Min,
    Max,
}

impl Aggregate {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Aggregate::Sum => {
                let sum = a + b;
                // inf + -inf
                if sum.is_nan() {
                    0.0
                } else {
                    sum
                }
            }
            Aggregate::Min => a.min(b),
            Aggregate::Max => a.max(b),
        }
    }
}

// Reads a sorted set, or a plain set whose members all score 1.
fn scored(store: &InnerStoreLocked<'_>, key: &str) -> Result<Option<ZSet>, CommandError> {
    match store.get(key) {
        None => Ok(None),
        Some(Entry::ZSet(zset)) => Ok(Some(zset.clone())),
        Some(Entry::Set(set)) => Ok(Some(
            set.iter().map(|member| (member.clone(), 1.0)).collect(),
        )),
        Some(_) => Err(CommandError::WrongType),
    }
}

// ZUNIONSTORE dest numkeys key [key ...] [WEIGHTS weight ...] [AGGREGATE SUM | MIN | MAX]
pub(super) fn zstore(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    intersect: bool,
) -> CommandResult {
    let dest = parser.next_string()?;
    let numkeys = usize::try_from(parser.next_integer()?)
        .ok()
        .filter(|numkeys| *numkeys > 0)
        .ok_or(CommandError::Syntax)?;

    let mut keys = Vec::with_capacity(numkeys);
    for _ in 0..numkeys {
        keys.push(parser.next_string()?);
    }

    let mut weights = vec![1.0; numkeys];
    let mut aggregate = Aggregate::Sum;
    while let Some(option) = parser.next_optional_string() {
        match option.to_uppercase().as_str() {
            "WEIGHTS" => {
                for weight in weights.iter_mut() {
                    *weight = parser.next_float()?;
                }
            }
            "AGGREGATE" => {
                aggregate = match parser.next_string()?.to_uppercase().as_str() {
                    "SUM" => Aggregate::Sum,
                    "MIN" => Aggregate::Min,
                    "MAX" => Aggregate::Max,
                    _ => return Err(CommandError::Syntax),
                }
            }
            _ => return Err(CommandError::Syntax),
        }
    }

    let mut sources = Vec::with_capacity(numkeys);
    for key in &keys {
        sources.push(scored(store, key)?.unwrap_or_default());
    }

    let mut result: ZSet = HashMap::new();
    for (index, (source, weight)) in sources.iter().zip(&weights).enumerate() {
        if intersect && index > 0 {
            result.retain(|member, _| source.contains_key(member));
        }
        for (member, score) in source {
            let weighted = score * weight;
            match result.get_mut(member) {
                Some(current) => *current = aggregate.apply(*current, weighted),
                None if !intersect || index == 0 => {
                    result.insert(member.clone(), weighted);
                }
                None => {}
            }
        }
    }

    let len = result.len();
    if result.is_empty() {
        store.remove(&dest);
    } else {
        store.set(dest, Entry::ZSet(result));
    }
    Ok(Frame::Integer(len as i64))
}

pub(super) fn zscan(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let mut members = ordered_at(store, &key)?;
    members.sort_by(|a, b| a.0.cmp(&b.0));

    let (cursor, page) = scan_page(members, parser, |(member, _)| &member[..])?;
    let page = page
        .into_iter()
        .flat_map(|(member, score)| [Frame::Bulk(member), float_reply(score)])
        .collect();
    Ok(scan_reply(cursor, page))
}
