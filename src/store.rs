use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, Notify};
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, trace};

const EVENTS_CAPACITY: usize = 1024;

/// The Store holds the data of [`MemoryClient`](crate::MemoryClient)s: typed entries with
/// optional time-to-live, per key modification stamps used by `WATCH`, and the publish/subscribe
/// bus. Expired keys are removed by a background task. Clones share the same data.
#[derive(Clone)]
pub struct Store {
    inner: Arc<InnerStore>,
}

impl Store {
    /// Creates an empty store. Must be called from within a Tokio runtime.
    pub fn new() -> Store {
        let state = State {
            keys: HashMap::new(),
            ttls: BTreeSet::new(),
            versions: HashMap::new(),
            clock: 0,
            channels: HashMap::new(),
            patterns: HashMap::new(),
        };

        let (events, _) = broadcast::channel(EVENTS_CAPACITY);
        let inner = Arc::new(InnerStore {
            state: Mutex::new(state),
            waker: Arc::new(Notify::new()),
            lists_changed: Notify::new(),
            events,
        });

        tokio::spawn(remove_expired_keys(
            Arc::downgrade(&inner),
            inner.waker.clone(),
        ));

        Self { inner }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Store {
    type Target = InnerStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// A stored value, typed the way the server types keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    ZSet(HashMap<Bytes, f64>),
}

impl Entry {
    /// The name `TYPE` reports for this entry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Entry::String(_) => "string",
            Entry::List(_) => "list",
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::ZSet(_) => "zset",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::String(_) => false,
            Entry::List(list) => list.is_empty(),
            Entry::Hash(hash) => hash.is_empty(),
            Entry::Set(set) => set.is_empty(),
            Entry::ZSet(zset) => zset.is_empty(),
        }
    }
}

/// A message sent with `PUBLISH`.
#[derive(Debug, Clone)]
pub struct Published {
    pub channel: String,
    pub payload: Bytes,
}

pub struct InnerStore {
    state: Mutex<State>,
    waker: Arc<Notify>,
    lists_changed: Notify,
    events: broadcast::Sender<Published>,
}

impl InnerStore {
    pub fn lock(&self) -> InnerStoreLocked<'_> {
        // A panic while holding the lock leaves the data consistent enough to keep serving.
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        InnerStoreLocked {
            state,
            waker: &self.waker,
            lists_changed: &self.lists_changed,
            events: &self.events,
        }
    }

    /// Notified every time an element is pushed to a list.
    pub fn lists_changed(&self) -> &Notify {
        &self.lists_changed
    }

    pub fn events(&self) -> broadcast::Receiver<Published> {
        self.events.subscribe()
    }
}

impl Drop for InnerStore {
    fn drop(&mut self) {
        // Lets the expiration task notice the store is gone.
        self.waker.notify_one();
    }
}

type Key = String;

struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

struct State {
    keys: HashMap<Key, Slot>,
    ttls: BTreeSet<(Instant, Key)>,
    versions: HashMap<Key, u64>,
    clock: u64,
    channels: HashMap<String, usize>,
    patterns: HashMap<String, usize>,
}

pub struct InnerStoreLocked<'a> {
    state: MutexGuard<'a, State>,
    waker: &'a Notify,
    lists_changed: &'a Notify,
    events: &'a broadcast::Sender<Published>,
}

impl<'a> InnerStoreLocked<'a> {
    /// Returns the live entry of `key`. Keys past their expiration are treated as missing even
    /// before the background task removes them.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        self.state
            .keys
            .get(key)
            .filter(|slot| slot.expires_at.map_or(true, |at| at > now))
            .map(|slot| &slot.entry)
    }

    /// Mutable access to the entry of `key`. Marks the key as modified.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Entry> {
        if self.get(key).is_none() {
            return None;
        }
        self.touch(key);
        self.state.keys.get_mut(key).map(|slot| &mut slot.entry)
    }

    /// Mutable access to the entry of `key`, inserting `default()` first when the key is missing.
    pub fn get_or_insert_with(&mut self, key: &str, default: impl FnOnce() -> Entry) -> &mut Entry {
        if self.get(key).is_none() {
            self.set(key.to_string(), default());
        }
        self.touch(key);
        &mut self
            .state
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Slot {
                entry: Entry::String(Bytes::new()),
                expires_at: None,
            })
            .entry
    }

    /// Stores `entry`, replacing the previous value and its time-to-live.
    pub fn set(&mut self, key: Key, entry: Entry) {
        self.clear_ttl(&key);
        self.touch(&key);
        self.state.keys.insert(
            key,
            Slot {
                entry,
                expires_at: None,
            },
        );
    }

    pub fn set_with_ttl(&mut self, key: Key, entry: Entry, ttl: Duration) {
        self.set(key.clone(), entry);
        self.expire(&key, ttl);
    }

    /// Sets the time-to-live of an existing key. Returns `false` when the key does not exist.
    pub fn expire(&mut self, key: &str, ttl: Duration) -> bool {
        if self.get(key).is_none() {
            return false;
        }

        let expires_at = Instant::now() + ttl;
        self.clear_ttl(key);
        self.touch(key);
        if let Some(slot) = self.state.keys.get_mut(key) {
            slot.expires_at = Some(expires_at);
        }
        self.state.ttls.insert((expires_at, key.to_string()));

        let next_to_expire = self.state.ttls.iter().next().map(|(_, key)| key.as_str());
        if next_to_expire == Some(key) {
            self.waker.notify_one();
        }
        true
    }

    /// Removes the time-to-live of `key`. Returns `false` when there was none.
    pub fn persist(&mut self, key: &str) -> bool {
        if self.get(key).is_none() {
            return false;
        }
        let had_ttl = self.clear_ttl(key);
        if had_ttl {
            self.touch(key);
        }
        had_ttl
    }

    /// `None` for a missing key, `Some(None)` for a key without time-to-live.
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        self.get(key)?;
        let now = Instant::now();
        let slot = self.state.keys.get(key)?;
        Some(slot.expires_at.map(|at| at.saturating_duration_since(now)))
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.get(key)?;
        self.clear_ttl(key);
        self.touch(key);
        self.state.keys.remove(key).map(|slot| slot.entry)
    }

    /// Deletes `key` when it holds an empty collection, the way the server never keeps one.
    pub fn remove_if_empty(&mut self, key: &str) {
        if self.get(key).map_or(false, Entry::is_empty) {
            self.remove(key);
        }
    }

    /// Moves the entry of `src`, with its time-to-live, to `dst`.
    pub fn rename(&mut self, src: &str, dst: &str) -> bool {
        let ttl = match self.ttl(src) {
            Some(ttl) => ttl,
            None => return false,
        };
        let entry = match self.remove(src) {
            Some(entry) => entry,
            None => return false,
        };
        match ttl {
            Some(ttl) => self.set_with_ttl(dst.to_string(), entry, ttl),
            None => self.set(dst.to_string(), entry),
        }
        true
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn size(&self) -> usize {
        self.keys().count()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        let now = Instant::now();
        self.state
            .keys
            .iter()
            .filter(move |(_, slot)| slot.expires_at.map_or(true, |at| at > now))
            .map(|(key, _)| key)
    }

    /// Removes every key.
    pub fn flush(&mut self) {
        let keys: Vec<Key> = self.state.keys.keys().cloned().collect();
        for key in &keys {
            self.touch(key);
        }
        self.state.keys.clear();
        self.state.ttls.clear();
    }

    /// Modification stamp of `key`, compared by `WATCH`. Missing keys that were never written
    /// have stamp `0`.
    pub fn version(&self, key: &str) -> u64 {
        self.state.versions.get(key).copied().unwrap_or(0)
    }

    pub fn notify_lists_changed(&self) {
        self.lists_changed.notify_waiters();
    }

    pub fn remove_expired_keys(&mut self) -> Option<Instant> {
        let now = Instant::now();

        let expired_keys: Vec<(Instant, String)> = self
            .state
            .ttls
            .iter()
            .take_while(|(expires_at, _)| expires_at <= &now)
            .cloned()
            .collect();

        for (when, key) in expired_keys {
            trace!(key, "key expired");
            self.state.keys.remove(&key);
            self.state.ttls.remove(&(when, key.clone()));
            self.touch(&key);
        }

        self.state
            .ttls
            .iter()
            .next()
            .map(|&(expires_at, _)| expires_at)
    }

    pub fn add_subscription(&mut self, name: &str, pattern: bool) {
        let counts = self.subscriptions_mut(pattern);
        *counts.entry(name.to_string()).or_default() += 1;
    }

    pub fn remove_subscription(&mut self, name: &str, pattern: bool) {
        let counts = self.subscriptions_mut(pattern);
        if let Some(count) = counts.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                counts.remove(name);
            }
        }
    }

    /// Channels with at least one subscriber.
    pub fn active_channels(&self) -> impl Iterator<Item = &String> {
        self.state.channels.keys()
    }

    pub fn channel_subscribers(&self, channel: &str) -> usize {
        self.state.channels.get(channel).copied().unwrap_or(0)
    }

    /// Number of distinct subscribed patterns.
    pub fn pattern_count(&self) -> usize {
        self.state.patterns.len()
    }

    /// Sends `payload` to every subscriber of `channel`, direct or by pattern. Returns how many
    /// subscriptions received it.
    pub fn publish(&self, channel: &str, payload: Bytes, matches: impl Fn(&str, &str) -> bool) -> usize {
        let receivers = self.channel_subscribers(channel)
            + self
                .state
                .patterns
                .iter()
                .filter(|(pattern, _)| matches(pattern, channel))
                .map(|(_, count)| count)
                .sum::<usize>();

        if receivers > 0 {
            debug!(channel, receivers, "publishing message");
            // Every subscriber holds a receiver, so sending only fails without subscribers.
            let _ = self.events.send(Published {
                channel: channel.to_string(),
                payload,
            });
        }
        receivers
    }

    fn subscriptions_mut(&mut self, pattern: bool) -> &mut HashMap<String, usize> {
        if pattern {
            &mut self.state.patterns
        } else {
            &mut self.state.channels
        }
    }

    fn touch(&mut self, key: &str) {
        self.state.clock += 1;
        let clock = self.state.clock;
        self.state.versions.insert(key.to_string(), clock);
    }

    fn clear_ttl(&mut self, key: &str) -> bool {
        let expires_at = self
            .state
            .keys
            .get_mut(key)
            .and_then(|slot| slot.expires_at.take());
        match expires_at {
            Some(at) => {
                self.state.ttls.remove(&(at, key.to_string()));
                true
            }
            None => false,
        }
    }
}

async fn remove_expired_keys(store: Weak<InnerStore>, waker: Arc<Notify>) {
    loop {
        let next_expiration = match store.upgrade() {
            Some(store) => store.lock().remove_expired_keys(),
            None => break,
        };

        if let Some(next_expiration) = next_expiration {
            tokio::select! {
                _ = sleep_until(next_expiration) => {}
                _ = waker.notified() => {}
            }
        } else {
            waker.notified().await;
        }
    }
    debug!("store dropped, expiration task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;
    use tokio::time::Duration;

    fn string(data: &'static str) -> Entry {
        Entry::String(Bytes::from(data))
    }

    #[tokio::test]
    async fn ttl() {
        time::pause();

        let store = Store::new();

        {
            let mut store = store.lock();

            store.set_with_ttl("key1".to_string(), string("value1"), Duration::from_secs(10));
            store.set_with_ttl("key2".to_string(), string("value2"), Duration::from_secs(20));
        }

        assert_eq!(store.lock().size(), 2);

        time::advance(Duration::from_secs(10)).await;
        time::sleep(Duration::from_millis(1)).await;

        assert_eq!(store.lock().size(), 1);
        assert!(store.lock().exists("key2"));

        time::advance(Duration::from_secs(20)).await;
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.lock().size(), 0);

        {
            let mut store = store.lock();
            store.set_with_ttl("key3".to_string(), string("value3"), Duration::from_secs(20));
        }

        assert_eq!(store.lock().size(), 1);

        time::advance(Duration::from_secs(20)).await;
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.lock().size(), 0);
    }

    #[tokio::test]
    async fn set_clears_ttl() {
        let store = Store::new();
        let mut store = store.lock();

        store.set_with_ttl("k".to_string(), string("a"), Duration::from_secs(10));
        assert!(matches!(store.ttl("k"), Some(Some(_))));

        store.set("k".to_string(), string("b"));
        assert_eq!(store.ttl("k"), Some(None));
        assert_eq!(store.ttl("missing"), None);
    }

    #[tokio::test]
    async fn versions_change_on_write() {
        let store = Store::new();
        let mut store = store.lock();

        assert_eq!(store.version("k"), 0);
        store.set("k".to_string(), string("a"));
        let first = store.version("k");

        assert!(store.get("k").is_some());
        assert_eq!(store.version("k"), first);

        store.remove("k");
        assert!(store.version("k") > first);
    }

    #[tokio::test]
    async fn empty_collections_are_removed() {
        let store = Store::new();
        let mut store = store.lock();

        store.set("l".to_string(), Entry::List(VecDeque::new()));
        store.remove_if_empty("l");

        assert!(!store.exists("l"));
    }

    #[tokio::test]
    async fn rename_keeps_ttl() {
        let store = Store::new();
        let mut store = store.lock();

        store.set_with_ttl("a".to_string(), string("v"), Duration::from_secs(10));
        assert!(store.rename("a", "b"));

        assert!(!store.exists("a"));
        assert!(matches!(store.ttl("b"), Some(Some(_))));
        assert!(!store.rename("a", "c"));
    }

    #[tokio::test]
    async fn publish_counts_subscribers() {
        let store = Store::new();
        let mut events = store.events();

        {
            let mut store = store.lock();
            store.add_subscription("news", false);
            store.add_subscription("n*", true);
        }

        let receivers = store
            .lock()
            .publish("news", Bytes::from("1"), |pattern, channel| {
                glob_match::glob_match(pattern, channel)
            });

        assert_eq!(receivers, 2);
        assert_eq!(events.recv().await.unwrap().channel, "news");

        store.lock().remove_subscription("news", false);
        assert_eq!(store.lock().channel_subscribers("news"), 0);
    }
}
