use std::collections::VecDeque;

use bytes::Bytes;

use super::{
    bulk_array, list, list_mut, list_or_create, normalize_range, CommandError, CommandParser,
    CommandResult,
};
use crate::cmd::Cmd;
use crate::frame::Frame;
use crate::store::InnerStoreLocked;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum End {
    Front,
    Back,
}

fn push_to(list: &mut VecDeque<Bytes>, end: End, value: Bytes) {
    match end {
        End::Front => list.push_front(value),
        End::Back => list.push_back(value),
    }
}

fn pop_from(list: &mut VecDeque<Bytes>, end: End) -> Option<Bytes> {
    match end {
        End::Front => list.pop_front(),
        End::Back => list.pop_back(),
    }
}

/// `LPUSH`, `RPUSH` and, with `existing_only`, `LPUSHX` and `RPUSHX`.
pub(super) fn push(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    end: End,
    existing_only: bool,
) -> CommandResult {
    let key = parser.next_string()?;
    let values = parser.remaining_required()?;

    let list = if existing_only {
        match list_mut(store, &key)? {
            Some(list) => list,
            None => return Ok(Frame::Integer(0)),
        }
    } else {
        list_or_create(store, &key)?
    };

    for value in values {
        push_to(list, end, value);
    }
    Ok(Frame::Integer(list.len() as i64))
}

pub(super) fn pop(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser, end: End) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let popped = match list_mut(store, &key)? {
        Some(list) => pop_from(list, end),
        None => None,
    };
    store.remove_if_empty(&key);
    Ok(popped.map_or(Frame::Null, Frame::Bulk))
}

pub(super) fn llen(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let len = list(store, &key)?.map_or(0, VecDeque::len);
    Ok(Frame::Integer(len as i64))
}

pub(super) fn lrange(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;
    parser.finish()?;

    let list = match list(store, &key)? {
        Some(list) => list,
        None => return Ok(Frame::Array(Vec::new())),
    };
    let items = match normalize_range(start, stop, list.len()) {
        Some((start, stop)) => list.range(start..=stop).cloned().collect(),
        None => Vec::new(),
    };
    Ok(bulk_array(items))
}

fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let index = if index < 0 { len as i64 + index } else { index };
    usize::try_from(index).ok().filter(|index| *index < len)
}

pub(super) fn lindex(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let index = parser.next_integer()?;
    parser.finish()?;

    let value = list(store, &key)?
        .and_then(|list| resolve_index(index, list.len()).and_then(|index| list.get(index)));
    Ok(value.cloned().map_or(Frame::Null, Frame::Bulk))
}

pub(super) fn lset(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let index = parser.next_integer()?;
    let value = parser.next_bytes()?;
    parser.finish()?;

    let list = list_mut(store, &key)?.ok_or(CommandError::NoSuchKey)?;
    let index = resolve_index(index, list.len()).ok_or(CommandError::OutOfRange)?;
    list[index] = value;
    Ok(Frame::ok())
}

/// Removes up to `count` occurrences: from the head when positive, from the tail when negative,
/// every occurrence when zero.
pub(super) fn lrem(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let count = parser.next_integer()?;
    let value = parser.next_bytes()?;
    parser.finish()?;

    let list = match list_mut(store, &key)? {
        Some(list) => list,
        None => return Ok(Frame::Integer(0)),
    };

    let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
    let mut removed = 0;
    if count >= 0 {
        let mut index = 0;
        while index < list.len() && removed < limit {
            if list[index] == value {
                list.remove(index);
                removed += 1;
            } else {
                index += 1;
            }
        }
    } else {
        let mut index = list.len();
        while index > 0 && removed < limit {
            index -= 1;
            if list[index] == value {
                list.remove(index);
                removed += 1;
            }
        }
    }

    store.remove_if_empty(&key);
    Ok(Frame::Integer(removed as i64))
}

// LINSERT key BEFORE|AFTER pivot value
pub(super) fn linsert(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let after = match parser.next_string()?.to_uppercase().as_str() {
        "BEFORE" => false,
        "AFTER" => true,
        _ => return Err(CommandError::Syntax),
    };
    let pivot = parser.next_bytes()?;
    let value = parser.next_bytes()?;
    parser.finish()?;

    let list = match list_mut(store, &key)? {
        Some(list) => list,
        None => return Ok(Frame::Integer(0)),
    };
    match list.iter().position(|item| *item == pivot) {
        Some(index) => {
            list.insert(if after { index + 1 } else { index }, value);
            Ok(Frame::Integer(list.len() as i64))
        }
        None => Ok(Frame::Integer(-1)),
    }
}

pub(super) fn ltrim(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let start = parser.next_integer()?;
    let stop = parser.next_integer()?;
    parser.finish()?;

    if let Some(list) = list_mut(store, &key)? {
        match normalize_range(start, stop, list.len()) {
            Some((start, stop)) => {
                list.truncate(stop + 1);
                list.drain(..start);
            }
            None => list.clear(),
        }
    }
    store.remove_if_empty(&key);
    Ok(Frame::ok())
}

// Pops the tail of `src` and pushes it to the head of `dst`. Type errors on either list abort
// before anything moves.
fn move_tail(store: &mut InnerStoreLocked<'_>, src: &str, dst: &str) -> CommandResult {
    list(store, dst)?;
    let value = match list_mut(store, src)?.and_then(|list| list.pop_back()) {
        Some(value) => value,
        None => return Ok(Frame::Null),
    };
    store.remove_if_empty(src);
    list_or_create(store, dst)?.push_front(value.clone());
    Ok(Frame::Bulk(value))
}

pub(super) fn rpoplpush(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let src = parser.next_string()?;
    let dst = parser.next_string()?;
    parser.finish()?;
    move_tail(store, &src, &dst)
}

/// One attempt of a blocking pop. `Frame::Null` means nothing was available.
pub(super) fn pop_blocking(store: &mut InnerStoreLocked<'_>, cmd: &Cmd) -> CommandResult {
    let name = cmd.name();
    let mut parser = CommandParser::new(cmd);
    pop_blocking_parsed(store, &name, &mut parser)
}

// BLPOP key [key ...] timeout, BRPOP key [key ...] timeout, BRPOPLPUSH src dst timeout
pub(super) fn pop_blocking_parsed(
    store: &mut InnerStoreLocked<'_>,
    name: &str,
    parser: &mut CommandParser,
) -> CommandResult {
    let mut args = parser.remaining_strings();
    // The timeout is handled by the caller.
    if args.pop().is_none() || args.is_empty() {
        return Err(CommandError::WrongArity(name.to_lowercase()));
    }

    if name == "BRPOPLPUSH" {
        if args.len() != 2 {
            return Err(CommandError::WrongArity(name.to_lowercase()));
        }
        return move_tail(store, &args[0], &args[1]);
    }

    let end = if name == "BLPOP" { End::Front } else { End::Back };
    for key in args {
        if let Some(value) = list_mut(store, &key)?.and_then(|list| pop_from(list, end)) {
            store.remove_if_empty(&key);
            return Ok(Frame::Array(vec![Frame::bulk(key), Frame::Bulk(value)]));
        }
    }
    Ok(Frame::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_indexes() {
        assert_eq!(resolve_index(-1, 3), Some(2));
        assert_eq!(resolve_index(3, 3), None);
        assert_eq!(resolve_index(-4, 3), None);
    }
}
