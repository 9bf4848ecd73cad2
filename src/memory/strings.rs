use std::str::{self, FromStr};

use bytes::{Bytes, BytesMut};
use num_traits::{CheckedAdd, Zero};

use super::{
    parse_float, string, string_mut, CommandError, CommandParser, CommandResult, TimeUnit,
};
use crate::cmd::format_float;
use crate::frame::Frame;
use crate::store::{Entry, InnerStoreLocked};

pub(super) fn get(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    Ok(match string(store, &key)? {
        Some(value) => Frame::Bulk(value.clone()),
        None => Frame::Null,
    })
}

// SET key value [EX seconds | PX milliseconds] [NX | XX]
pub(super) fn set(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;

    let mut ttl = None;
    let mut nx = false;
    let mut xx = false;
    while let Some(option) = parser.next_optional_string() {
        match option.to_uppercase().as_str() {
            "EX" | "PX" if ttl.is_none() => {
                let unit = if option.eq_ignore_ascii_case("EX") {
                    TimeUnit::Seconds
                } else {
                    TimeUnit::Millis
                };
                let amount = parser.next_integer()?;
                let amount = u64::try_from(amount)
                    .ok()
                    .filter(|amount| *amount > 0)
                    .ok_or_else(|| CommandError::InvalidExpire("set".to_string()))?;
                ttl = Some(unit.duration(amount));
            }
            "NX" if !xx => nx = true,
            "XX" if !nx => xx = true,
            _ => return Err(CommandError::Syntax),
        }
    }

    let exists = store.exists(&key);
    if (nx && exists) || (xx && !exists) {
        return Ok(Frame::Null);
    }

    match ttl {
        Some(ttl) => store.set_with_ttl(key, Entry::String(value), ttl),
        None => store.set(key, Entry::String(value)),
    }
    Ok(Frame::ok())
}

pub(super) fn setnx(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;
    parser.finish()?;

    if store.exists(&key) {
        return Ok(Frame::Integer(0));
    }
    store.set(key, Entry::String(value));
    Ok(Frame::Integer(1))
}

pub(super) fn setex(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    unit: TimeUnit,
) -> CommandResult {
    let key = parser.next_string()?;
    let amount = parser.next_integer()?;
    let value = parser.next_bytes()?;
    parser.finish()?;

    let name = match unit {
        TimeUnit::Seconds => "setex",
        TimeUnit::Millis => "psetex",
    };
    let amount = u64::try_from(amount)
        .ok()
        .filter(|amount| *amount > 0)
        .ok_or_else(|| CommandError::InvalidExpire(name.to_string()))?;

    store.set_with_ttl(key, Entry::String(value), unit.duration(amount));
    Ok(Frame::ok())
}

pub(super) fn getset(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let value = parser.next_bytes()?;
    parser.finish()?;

    let previous = string(store, &key)?.cloned();
    store.set(key, Entry::String(value));
    Ok(previous.map_or(Frame::Null, Frame::Bulk))
}

pub(super) fn mget(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let keys = parser.remaining_strings_required()?;

    // Keys holding other types read as missing.
    let values = keys
        .iter()
        .map(|key| match store.get(key) {
            Some(Entry::String(value)) => Frame::Bulk(value.clone()),
            _ => Frame::Null,
        })
        .collect();
    Ok(Frame::Array(values))
}

fn pairs(parser: &mut CommandParser) -> Result<Vec<(String, Bytes)>, CommandError> {
    let rest = parser.remaining_required()?;
    if rest.len() % 2 != 0 {
        return Err(CommandError::WrongArity(parser.name.clone()));
    }

    Ok(rest
        .chunks(2)
        .map(|pair| (String::from_utf8_lossy(&pair[0]).into_owned(), pair[1].clone()))
        .collect())
}

pub(super) fn mset(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    for (key, value) in pairs(parser)? {
        store.set(key, Entry::String(value));
    }
    Ok(Frame::ok())
}

pub(super) fn msetnx(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let pairs = pairs(parser)?;
    if pairs.iter().any(|(key, _)| store.exists(key)) {
        return Ok(Frame::Integer(0));
    }
    for (key, value) in pairs {
        store.set(key, Entry::String(value));
    }
    Ok(Frame::Integer(1))
}

pub(super) fn append(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let suffix = parser.next_bytes()?;
    parser.finish()?;

    let appended = match string_mut(store, &key)? {
        Some(value) => {
            let mut buf = BytesMut::from(&value[..]);
            buf.extend_from_slice(&suffix);
            *value = buf.freeze();
            value.len()
        }
        None => {
            let len = suffix.len();
            store.set(key, Entry::String(suffix));
            len
        }
    };
    Ok(Frame::Integer(appended as i64))
}

pub(super) fn strlen(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let len = string(store, &key)?.map_or(0, |value| value.len());
    Ok(Frame::Integer(len as i64))
}

/// Adds `increment` to a number stored as decimal text. A missing value counts as zero.
pub(super) fn add_to_text<T>(current: Option<&Bytes>, increment: T) -> Result<T, CommandError>
where
    T: FromStr + CheckedAdd + Zero,
{
    let current = match current {
        Some(raw) => str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse::<T>().ok())
            .ok_or(CommandError::NotInteger)?,
        None => T::zero(),
    };
    current
        .checked_add(&increment)
        .ok_or(CommandError::Overflow)
}

/// Adds `increment` to a float stored as decimal text, refusing non finite results.
pub(super) fn add_float_to_text(current: Option<&Bytes>, increment: f64) -> Result<f64, CommandError> {
    let current = match current {
        Some(raw) => parse_float(raw).ok_or(CommandError::NotFloat)?,
        None => 0.0,
    };
    let result = current + increment;
    if !result.is_finite() {
        return Err(CommandError::NotFinite);
    }
    Ok(result)
}

/// `INCR` and `DECR` pass their fixed step, `INCRBY` reads it from the arguments.
pub(super) fn incr_by(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    step: Option<i64>,
) -> CommandResult {
    let key = parser.next_string()?;
    let increment = match step {
        Some(step) => step,
        None => parser.next_integer()?,
    };
    parser.finish()?;
    apply_increment(store, key, increment)
}

pub(super) fn decr_by(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let decrement = parser.next_integer()?;
    parser.finish()?;

    let increment = decrement.checked_neg().ok_or(CommandError::Overflow)?;
    apply_increment(store, key, increment)
}

fn apply_increment(store: &mut InnerStoreLocked<'_>, key: String, increment: i64) -> CommandResult {
    let value = add_to_text(string(store, &key)?, increment)?;
    store_number(store, key, value.to_string());
    Ok(Frame::Integer(value))
}

pub(super) fn incr_by_float(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let increment = parser.next_float()?;
    parser.finish()?;

    let value = add_float_to_text(string(store, &key)?, increment)?;
    let text = format_float(value);
    store_number(store, key, text.clone());
    Ok(Frame::bulk(text))
}

// Replaces the value but keeps the time-to-live, as increments do.
fn store_number(store: &mut InnerStoreLocked<'_>, key: String, text: String) {
    match string_mut(store, &key) {
        Ok(Some(value)) => *value = Bytes::from(text),
        _ => store.set(key, Entry::String(Bytes::from(text))),
    }
}
