use std::cmp::Ordering;
use std::collections::VecDeque;

use bytes::Bytes;

use super::{
    bulk_array, hash, matches_pattern, parse_float, scan_page, scan_reply, CommandError,
    CommandParser, CommandResult, TimeUnit,
};
use crate::frame::Frame;
use crate::store::{Entry, InnerStoreLocked};

pub(super) fn del(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let keys = parser.remaining_strings_required()?;
    let removed = keys
        .iter()
        .filter(|key| store.remove(key).is_some())
        .count();
    Ok(Frame::Integer(removed as i64))
}

/// Counts every key given, so a key named twice counts twice.
pub(super) fn exists(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let keys = parser.remaining_strings_required()?;
    let found = keys.iter().filter(|key| store.exists(key)).count();
    Ok(Frame::Integer(found as i64))
}

pub(super) fn key_type(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let name = store.get(&key).map_or("none", Entry::type_name);
    Ok(Frame::Simple(name.to_string()))
}

pub(super) fn keys(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let pattern = parser.next_bytes()?;
    parser.finish()?;

    let mut keys: Vec<&String> = store
        .keys()
        .filter(|key| matches_pattern(&pattern, key.as_bytes()))
        .collect();
    keys.sort();
    Ok(bulk_array(keys.into_iter().map(|key| Bytes::from(key.clone()))))
}

pub(super) fn scan(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let mut keys: Vec<String> = store.keys().cloned().collect();
    keys.sort();

    let (cursor, page) = scan_page(keys, parser, |key| key.as_bytes())?;
    let page = page.into_iter().map(Frame::bulk).collect();
    Ok(scan_reply(cursor, page))
}

/// A time-to-live that is not positive deletes the key right away.
pub(super) fn expire(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    unit: TimeUnit,
) -> CommandResult {
    let key = parser.next_string()?;
    let amount = parser.next_integer()?;
    parser.finish()?;

    let updated = match u64::try_from(amount) {
        Ok(amount) if amount > 0 => store.expire(&key, unit.duration(amount)),
        _ => store.remove(&key).is_some(),
    };
    Ok(Frame::Integer(updated as i64))
}

/// `-2` for a missing key, `-1` for a key without time-to-live.
pub(super) fn ttl(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    unit: TimeUnit,
) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    let reply = match store.ttl(&key) {
        None => -2,
        Some(None) => -1,
        Some(Some(ttl)) => unit.count(ttl),
    };
    Ok(Frame::Integer(reply))
}

pub(super) fn persist(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    parser.finish()?;

    Ok(Frame::Integer(store.persist(&key) as i64))
}

pub(super) fn rename(
    store: &mut InnerStoreLocked<'_>,
    parser: &mut CommandParser,
    only_new: bool,
) -> CommandResult {
    let src = parser.next_string()?;
    let dst = parser.next_string()?;
    parser.finish()?;

    if !store.exists(&src) {
        return Err(CommandError::NoSuchKey);
    }
    if only_new {
        if store.exists(&dst) {
            return Ok(Frame::Integer(0));
        }
        store.rename(&src, &dst);
        return Ok(Frame::Integer(1));
    }

    if src != dst {
        store.rename(&src, &dst);
    }
    Ok(Frame::ok())
}

#[derive(Debug, Default)]
struct SortArgs {
    by: Option<Bytes>,
    limit: Option<(i64, i64)>,
    get: Vec<Bytes>,
    desc: bool,
    alpha: bool,
    store: Option<String>,
}

fn sort_args(parser: &mut CommandParser) -> Result<SortArgs, CommandError> {
    let mut args = SortArgs::default();
    while let Some(option) = parser.next_optional_string() {
        match option.to_uppercase().as_str() {
            "BY" => args.by = Some(parser.next_bytes()?),
            "LIMIT" => args.limit = Some((parser.next_integer()?, parser.next_integer()?)),
            "GET" => args.get.push(parser.next_bytes()?),
            "ASC" => args.desc = false,
            "DESC" => args.desc = true,
            "ALPHA" => args.alpha = true,
            "STORE" => args.store = Some(parser.next_string()?),
            _ => return Err(CommandError::Syntax),
        }
    }
    Ok(args)
}

// SORT key [BY pattern] [LIMIT offset count] [GET pattern ...] [ASC | DESC] [ALPHA] [STORE dest]
pub(super) fn sort(store: &mut InnerStoreLocked<'_>, parser: &mut CommandParser) -> CommandResult {
    let key = parser.next_string()?;
    let args = sort_args(parser)?;

    let mut elements: Vec<Bytes> = match store.get(&key) {
        None => Vec::new(),
        Some(Entry::List(list)) => list.iter().cloned().collect(),
        Some(Entry::Set(set)) => set.iter().cloned().collect(),
        Some(Entry::ZSet(zset)) => zset.keys().cloned().collect(),
        Some(_) => return Err(CommandError::WrongType),
    };

    // A BY pattern without `*` leaves the elements unsorted.
    let sorted = args.by.as_ref().map_or(true, |by| by.contains(&b'*'));
    if sorted {
        elements = sort_elements(store, elements, &args)?;
    }

    if let Some((offset, count)) = args.limit {
        let offset = usize::try_from(offset).unwrap_or(0);
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        elements = elements.into_iter().skip(offset).take(count).collect();
    }

    let results: Vec<Option<Bytes>> = if args.get.is_empty() {
        elements.into_iter().map(Some).collect()
    } else {
        elements
            .iter()
            .flat_map(|element| args.get.iter().map(move |pattern| (element, pattern)))
            .map(|(element, pattern)| lookup(store, pattern, element))
            .collect()
    };

    match args.store {
        Some(dest) => {
            let count = results.len();
            if count == 0 {
                store.remove(&dest);
            } else {
                let list: VecDeque<Bytes> = results
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect();
                store.set(dest, Entry::List(list));
            }
            Ok(Frame::Integer(count as i64))
        }
        None => Ok(Frame::Array(
            results
                .into_iter()
                .map(|result| result.map_or(Frame::Null, Frame::Bulk))
                .collect(),
        )),
    }
}

fn sort_elements(
    store: &InnerStoreLocked<'_>,
    elements: Vec<Bytes>,
    args: &SortArgs,
) -> Result<Vec<Bytes>, CommandError> {
    let mut keyed = elements
        .into_iter()
        .map(|element| -> Result<(SortKey, Bytes), CommandError> {
            let weight = match &args.by {
                Some(by) => lookup(store, by, &element),
                None => Some(element.clone()),
            };
            let key = if args.alpha {
                SortKey::Text(weight.unwrap_or_default())
            } else {
                match weight {
                    Some(raw) => SortKey::Number(parse_float(&raw).ok_or(CommandError::SortNotNumber)?),
                    None => SortKey::Number(0.0),
                }
            };
            Ok((key, element))
        })
        .collect::<Result<Vec<_>, _>>()?;

    keyed.sort_by(|(a, a_element), (b, b_element)| {
        a.cmp(b).then_with(|| a_element.cmp(b_element))
    });
    if args.desc {
        keyed.reverse();
    }
    Ok(keyed.into_iter().map(|(_, element)| element).collect())
}

#[derive(Debug, PartialEq)]
enum SortKey {
    Number(f64),
    Text(Bytes),
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

/// Resolves a `BY` or `GET` pattern for `element`: `#` is the element itself, the first `*` is
/// replaced by the element, and `key->field` reads a hash field.
fn lookup(store: &InnerStoreLocked<'_>, pattern: &[u8], element: &Bytes) -> Option<Bytes> {
    if pattern == b"#" {
        return Some(element.clone());
    }

    let star = pattern.iter().position(|&byte| byte == b'*')?;
    let arrow = pattern
        .windows(2)
        .position(|window| window == b"->")
        .filter(|arrow| *arrow > star);
    let (key_pattern, field) = match arrow {
        Some(arrow) => (&pattern[..arrow], Some(&pattern[arrow + 2..])),
        None => (pattern, None),
    };

    let mut key = Vec::with_capacity(key_pattern.len() + element.len());
    key.extend_from_slice(&key_pattern[..star]);
    key.extend_from_slice(element);
    key.extend_from_slice(&key_pattern[star + 1..]);
    let key = String::from_utf8_lossy(&key).into_owned();

    match field {
        Some(field) => hash(store, &key).ok().flatten()?.get(field).cloned(),
        None => match store.get(&key) {
            Some(Entry::String(value)) => Some(value.clone()),
            _ => None,
        },
    }
}
