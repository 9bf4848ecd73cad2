use bytes::Bytes;

use super::strings::{add_float_to_text, add_to_text};
use super::{
    bulk_array, hash, hash_mut, hash_or_create, scan_page, scan_reply, CommandError,
    CommandParser, CommandResult,
};
use crate::cmd::format_float;
use crate::frame::Frame;
use crate::store::InnerStoreLocked;

fn field_pairs(parser: &mut CommandParser) -> Result<Vec<(Bytes, Bytes)>, CommandError> {
    let rest = parser.remaining_required()?;
    if rest.len() % 2 != 0 {
        return Err(CommandError::WrongArity(parser.name.clone()));
    }
    Ok(rest
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect())
}

/// Returns the number of fields that were added, not updated.
pub(super) fn hset(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let pairs = field_pairs(parser)?;

    let hash = hash_or_create(store, &key)?;
    let added = pairs
        .into_iter()
        .filter(|(field, value)| hash.insert(field.clone(), value.clone()).is_none())
        .count();
    Ok(Frame::Integer(added as i64))
}

pub(super) fn hmset(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let pairs = field_pairs(parser)?;

    hash_or_create(store, &key)?.extend(pairs);
    Ok(Frame::ok())
}

pub(super) fn hsetnx(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let field = parser.next_bytes()?;
    let value = parser.next_bytes()?;
    parser.finish()?;

    if hash(store, &key)?.map_or(false, |hash| hash.contains_key(&field)) {
        return Ok(Frame::Integer(0));
    }
    hash_or_create(store, &key)?.insert(field, value);
    Ok(Frame::Integer(1))
}

pub(super) fn hget(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let field = parser.next_bytes()?;
    parser.finish()?;

    let value = hash(store, &key)?.and_then(|hash| hash.get(&field)).cloned();
    Ok(value.map_or(Frame::Null, Frame::Bulk))
}

pub(super) fn hmget(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let fields = parser.remaining_required()?;

    let hash = hash(store, &key)?;
    let values = fields
        .iter()
        .map(|field| match hash.and_then(|hash| hash.get(field)) {
            Some(value) => Frame::Bulk(value.clone()),
            None => Frame::Null,
        })
        .collect();
    Ok(Frame::Array(values))
}

// Fields are listed in byte order so replies are stable.
fn sorted_fields(store: &InnerStoreLocked<'_>, key: &str) -> Result<Vec<(Bytes, Bytes)>, CommandError> {
    let mut fields: Vec<(Bytes, Bytes)> = match hash(store, key)? {
        Some(hash) => hash
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect(),
        None => Vec::new(),
    };
    fields.sort();
    Ok(fields)
}

pub(super) fn hgetall(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let fields = sorted_fields(store, &key)?;
    Ok(bulk_array(
        fields.into_iter().flat_map(|(field, value)| [field, value]),
    ))
}

pub(super) fn hkeys(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let fields = sorted_fields(store, &key)?;
    Ok(bulk_array(fields.into_iter().map(|(field, _)| field)))
}

pub(super) fn hvals(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let fields = sorted_fields(store, &key)?;
    Ok(bulk_array(fields.into_iter().map(|(_, value)| value)))
}

pub(super) fn hdel(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let fields = parser.remaining_required()?;

    let removed = match hash_mut(store, &key)? {
        Some(hash) => fields
            .iter()
            .filter(|field| hash.remove(*field).is_some())
            .count(),
        None => 0,
    };
    store.remove_if_empty(&key);
    Ok(Frame::Integer(removed as i64))
}

pub(super) fn hexists(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let field = parser.next_bytes()?;
    parser.finish()?;

    let exists = hash(store, &key)?.map_or(false, |hash| hash.contains_key(&field));
    Ok(Frame::Integer(exists as i64))
}

pub(super) fn hlen(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let len = hash(store, &key)?.map_or(0, |hash| hash.len());
    Ok(Frame::Integer(len as i64))
}

pub(super) fn hincrby(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let field = parser.next_bytes()?;
    let increment = parser.next_integer()?;
    parser.finish()?;

    let current = hash(store, &key)?.and_then(|hash| hash.get(&field));
    let value = add_to_text(current, increment).map_err(|err| match err {
        CommandError::NotInteger => CommandError::HashNotInteger,
        err => err,
    })?;

    hash_or_create(store, &key)?.insert(field, Bytes::from(value.to_string()));
    Ok(Frame::Integer(value))
}

pub(super) fn hincrbyfloat(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let field = parser.next_bytes()?;
    let increment = parser.next_float()?;
    parser.finish()?;

    let current = hash(store, &key)?.and_then(|hash| hash.get(&field));
    let value = add_float_to_text(current, increment).map_err(|err| match err {
        CommandError::NotFloat => CommandError::HashNotFloat,
        err => err,
    })?;

    let text = format_float(value);
    hash_or_create(store, &key)?.insert(field, Bytes::from(text.clone()));
    Ok(Frame::bulk(text))
}

pub(super) fn hscan(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let fields = sorted_fields(store, &key)?;

    let (cursor, page) = scan_page(fields, parser, |(field, _)| &field[..])?;
    let page = page
        .into_iter()
        .flat_map(|(field, value)| [Frame::Bulk(field), Frame::Bulk(value)])
        .collect();
    Ok(scan_reply(cursor, page))
}
