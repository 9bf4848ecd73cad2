use std::collections::HashSet;

use bytes::Bytes;

use super::{
    bulk_array, scan_page, scan_reply, set, set_mut, set_or_create, CommandError, CommandParser,
    CommandResult,
};
use crate::frame::Frame;
use crate::store::{Entry, InnerStoreLocked};

pub(super) fn sadd(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let members = parser.remaining_required()?;

    let set = set_or_create(store, &key)?;
    let added = members.into_iter().filter(|member| set.insert(member.clone())).count();
    Ok(Frame::Integer(added as i64))
}

pub(super) fn srem(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let members = parser.remaining_required()?;

    let removed = match set_mut(store, &key)? {
        Some(set) => members.iter().filter(|member| set.remove(*member)).count(),
        None => 0,
    };
    store.remove_if_empty(&key);
    Ok(Frame::Integer(removed as i64))
}

pub(super) fn sismember(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let member = parser.next_bytes()?;
    parser.finish()?;

    let found = set(store, &key)?.map_or(false, |set| set.contains(&member));
    Ok(Frame::Integer(found as i64))
}

pub(super) fn smembers(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let members = set(store, &key)?.map(|set| set.iter().cloned().collect::<Vec<_>>());
    Ok(bulk_array(members.unwrap_or_default()))
}

pub(super) fn scard(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let len = set(store, &key)?.map_or(0, HashSet::len);
    Ok(Frame::Integer(len as i64))
}

fn integer(raw: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CommandError::NotInteger)
}

/// Pops a member in set iteration order, or `count` members as a list.
pub(super) fn spop(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let count = match parser.next_optional_bytes() {
        Some(raw) => Some(usize::try_from(integer(&raw)?).map_err(|_| CommandError::NotInteger)?),
        None => None,
    };
    parser.finish()?;

    let popped = match set_mut(store, &key)? {
        Some(set) => take(set, count.unwrap_or(1)),
        None => Vec::new(),
    };
    store.remove_if_empty(&key);

    match count {
        Some(_) => Ok(bulk_array(popped)),
        None => Ok(popped.into_iter().next().map_or(Frame::Null, Frame::Bulk)),
    }
}

fn take(set: &mut HashSet<Bytes>, count: usize) -> Vec<Bytes> {
    let taken: Vec<Bytes> = set.iter().take(count).cloned().collect();
    for member in &taken {
        set.remove(member);
    }
    taken
}

/// Without `count` returns one member. A positive `count` returns that many distinct members,
/// a negative one returns `-count` members that may repeat.
pub(super) fn srandmember(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let count = match parser.next_optional_bytes() {
        Some(raw) => Some(integer(&raw)?),
        None => None,
    };
    parser.finish()?;

    let members: Vec<Bytes> = set(store, &key)?
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();

    let count = match count {
        None => return Ok(members.into_iter().next().map_or(Frame::Null, Frame::Bulk)),
        Some(count) => count,
    };

    let picked: Vec<Bytes> = if count >= 0 {
        members.into_iter().take(count as usize).collect()
    } else if members.is_empty() {
        Vec::new()
    } else {
        members
            .iter()
            .cycle()
            .take(count.unsigned_abs() as usize)
            .cloned()
            .collect()
    };
    Ok(bulk_array(picked))
}

pub(super) fn smove(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let src = parser.next_string()?;
    let dst = parser.next_string()?;
    let member = parser.next_bytes()?;
    parser.finish()?;

    set(store, &dst)?;
    let moved = match set_mut(store, &src)? {
        Some(set) => set.remove(&member),
        None => false,
    };
    if !moved {
        return Ok(Frame::Integer(0));
    }

    store.remove_if_empty(&src);
    set_or_create(store, &dst)?.insert(member);
    Ok(Frame::Integer(1))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum SetOp {
    Diff,
    Inter,
    Union,
}

/// `SDIFF`, `SINTER` and `SUNION`, and with `store_result` their `STORE` forms, which take the
/// destination key first and reply with the size of the result.
pub(super) fn combine(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    op: SetOp,
    store_result: bool,
) -> CommandResult {
    let dest = if store_result {
        Some(parser.next_string()?)
    } else {
        None
    };
    let keys = parser.remaining_strings_required()?;

    let mut sets = Vec::with_capacity(keys.len());
    for key in &keys {
        sets.push(set(store, key)?.cloned().unwrap_or_default());
    }

    let mut sets = sets.into_iter();
    let mut result = sets.next().unwrap_or_default();
    for other in sets {
        match op {
            SetOp::Diff => result.retain(|member| !other.contains(member)),
            SetOp::Inter => result.retain(|member| other.contains(member)),
            SetOp::Union => result.extend(other),
        }
    }

    match dest {
        Some(dest) => {
            let len = result.len();
            if result.is_empty() {
                store.remove(&dest);
            } else {
                store.set(dest, Entry::Set(result));
            }
            Ok(Frame::Integer(len as i64))
        }
        None => Ok(bulk_array(result)),
    }
}

pub(super) fn sscan(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let mut members: Vec<Bytes> = set(store, &key)?
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    members.sort();

    let (cursor, page) = scan_page(members, parser, |member| &member[..])?;
    let page = page.into_iter().map(Frame::Bulk).collect();
    Ok(scan_reply(cursor, page))
}
