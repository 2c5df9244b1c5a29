//! In-memory cache store.
//!
//! One [`CacheStore`] holds every cached query of a session, keyed by
//! [`CacheKey`]. Values are type-erased so resources of different shapes share
//! the store; typed reads go through [`CacheEntry::data_as`].
//!
//! Entries only change through [`CacheStore::set`] and
//! [`CacheStore::invalidate`]. Both notify the key's subscribers synchronously,
//! in subscription order, after the store lock has been released, so a
//! callback may call back into the store.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{Error, FetchError};
use crate::key::{CacheKey, KeyPattern};
use crate::lock::mutex_lock;

const SOURCE: &str = "store";

/// Default grace period before an unobserved entry may be collected.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Type-erased cached value.
pub type AnyData = Arc<dyn Any + Send + Sync>;

type Callback = Arc<dyn Fn(&CacheEntry) + Send + Sync>;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Known key, never fetched
  Idle,
  /// A fetch is in flight (data from a previous fetch may still be present)
  Fetching,
  /// Data is within its freshness window
  Fresh,
  /// Data is present but outdated or invalidated
  Stale,
  /// The last fetch failed; previous data, if any, is retained
  Error,
}

/// One cached query result and its bookkeeping.
#[derive(Clone)]
pub struct CacheEntry {
  key: CacheKey,
  data: Option<AnyData>,
  status: QueryStatus,
  error: Option<FetchError>,
  fetched_at: Option<Instant>,
  stale_at: Option<Instant>,
  subscriber_count: usize,
  generation: u64,
  gc_time: Duration,
  unobserved_since: Option<Instant>,
}

impl CacheEntry {
  fn new(key: CacheKey) -> Self {
    Self {
      key,
      data: None,
      status: QueryStatus::Idle,
      error: None,
      fetched_at: None,
      stale_at: None,
      subscriber_count: 0,
      generation: 0,
      gc_time: DEFAULT_GC_TIME,
      unobserved_since: Some(Instant::now()),
    }
  }

  pub fn key(&self) -> &CacheKey {
    &self.key
  }

  /// Stored status, without applying the freshness window.
  pub fn status(&self) -> QueryStatus {
    self.status
  }

  /// Status as of `now`: a `Fresh` entry past its `stale_at` reports `Stale`.
  pub fn current_status(&self, now: Instant) -> QueryStatus {
    match (self.status, self.stale_at) {
      (QueryStatus::Fresh, Some(stale_at)) if now >= stale_at => QueryStatus::Stale,
      (status, _) => status,
    }
  }

  pub fn data(&self) -> Option<&AnyData> {
    self.data.as_ref()
  }

  /// The cached value as `T`.
  pub fn data_as<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>, Error> {
    match self.data.clone() {
      Some(d) => d.downcast::<T>().map(Some).map_err(|_| Error::TypeMismatch {
        key: self.key.clone(),
      }),
      None => Ok(None),
    }
  }

  pub fn error(&self) -> Option<&FetchError> {
    self.error.as_ref()
  }

  pub fn fetched_at(&self) -> Option<Instant> {
    self.fetched_at
  }

  pub fn subscriber_count(&self) -> usize {
    self.subscriber_count
  }

  /// Bumped by every invalidation that reaches this entry.
  pub fn generation(&self) -> u64 {
    self.generation
  }

  // State transitions. Only reachable through `CacheStore::set`.

  /// Enter `Fetching`. Data is kept; the previous error is cleared.
  pub fn begin_fetch(&mut self) {
    self.status = QueryStatus::Fetching;
    self.error = None;
    self.touch(Instant::now());
  }

  /// Store a fetch result.
  ///
  /// `started_generation` is the entry's generation when the fetch began: if an
  /// invalidation happened in between the data lands as `Stale`.
  pub fn resolve(&mut self, data: AnyData, now: Instant, stale_time: Duration, started_generation: u64) {
    self.data = Some(data);
    self.error = None;
    self.fetched_at = Some(now);
    self.stale_at = Some(now + stale_time);
    self.status = if self.generation == started_generation {
      QueryStatus::Fresh
    } else {
      QueryStatus::Stale
    };
    self.touch(now);
  }

  /// Record a failed fetch, keeping whatever data was there.
  pub fn reject(&mut self, error: FetchError) {
    self.status = QueryStatus::Error;
    self.error = Some(error);
    self.touch(Instant::now());
  }

  /// Move a `Fresh` entry whose window has elapsed to `Stale`.
  pub fn expire(&mut self, now: Instant) {
    if self.current_status(now) == QueryStatus::Stale {
      self.status = QueryStatus::Stale;
    }
  }

  pub fn set_gc_time(&mut self, gc_time: Duration) {
    self.gc_time = gc_time;
  }

  /// Restart the grace period of an unobserved entry.
  fn touch(&mut self, now: Instant) {
    if self.subscriber_count == 0 {
      self.unobserved_since = Some(now);
    }
  }

  fn invalidate(&mut self) {
    self.generation += 1;
    self.error = None;
    self.status = match self.status {
      QueryStatus::Fresh | QueryStatus::Stale | QueryStatus::Error => QueryStatus::Stale,
      // A settling fetch sees the new generation and lands as stale
      QueryStatus::Fetching => QueryStatus::Fetching,
      QueryStatus::Idle => QueryStatus::Idle,
    };
  }

  fn reset(&mut self) {
    self.data = None;
    self.error = None;
    self.fetched_at = None;
    self.stale_at = None;
    self.status = QueryStatus::Idle;
    self.generation += 1;
  }

  fn collectable(&self, now: Instant) -> bool {
    self.subscriber_count == 0
      && self.status != QueryStatus::Fetching
      && self
        .unobserved_since
        .is_some_and(|since| now.saturating_duration_since(since) >= self.gc_time)
  }
}

impl fmt::Debug for CacheEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheEntry")
      .field("key", &self.key)
      .field("status", &self.status)
      .field("has_data", &self.data.is_some())
      .field("error", &self.error)
      .field("fetched_at", &self.fetched_at)
      .field("subscriber_count", &self.subscriber_count)
      .field("generation", &self.generation)
      .finish_non_exhaustive()
  }
}

struct Slot {
  entry: CacheEntry,
  subscribers: Vec<(u64, Callback)>,
}

impl Slot {
  fn new(key: CacheKey) -> Self {
    Self {
      entry: CacheEntry::new(key),
      subscribers: Vec::new(),
    }
  }

  fn callbacks(&self) -> Vec<Callback> {
    self.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
  }
}

#[derive(Default)]
struct StoreInner {
  slots: HashMap<CacheKey, Slot>,
  next_subscriber: u64,
  closed: bool,
}

/// Pending notifications, delivered once the lock is gone.
type Outbox = Vec<(CacheEntry, Vec<Callback>)>;

fn deliver(outbox: Outbox) {
  for (entry, callbacks) in outbox {
    for cb in callbacks {
      cb(&entry);
    }
  }
}

/// Process-wide cache of query results.
#[derive(Default)]
pub struct CacheStore {
  inner: Mutex<StoreInner>,
}

impl CacheStore {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Snapshot of the entry for `key`, if one exists.
  pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
    let inner = mutex_lock(&self.inner, SOURCE, "get");
    inner.slots.get(key).map(|slot| slot.entry.clone())
  }

  /// Apply `updater` to the entry for `key` (creating it if absent) and notify
  /// the key's subscribers. Returns the updated entry.
  ///
  /// After [`CacheStore::shutdown`] the update is applied to a detached entry
  /// and dropped, so fetches settling late do not repopulate the store.
  pub fn set<F>(&self, key: &CacheKey, updater: F) -> CacheEntry
  where
    F: FnOnce(&mut CacheEntry),
  {
    let (entry, callbacks) = {
      let mut inner = mutex_lock(&self.inner, SOURCE, "set");
      if inner.closed {
        let mut detached = CacheEntry::new(key.clone());
        updater(&mut detached);
        debug!(%key, "dropping update after shutdown");
        return detached;
      }
      let slot = inner
        .slots
        .entry(key.clone())
        .or_insert_with(|| Slot::new(key.clone()));
      updater(&mut slot.entry);
      (slot.entry.clone(), slot.callbacks())
    };

    deliver(vec![(entry.clone(), callbacks)]);
    entry
  }

  /// Register `callback` for every change to `key`.
  ///
  /// The entry is created (as `Idle`) if needed. Dropping the returned
  /// [`Subscription`] unsubscribes.
  pub fn subscribe<F>(self: &Arc<Self>, key: &CacheKey, callback: F) -> Subscription
  where
    F: Fn(&CacheEntry) + Send + Sync + 'static,
  {
    let mut inner = mutex_lock(&self.inner, SOURCE, "subscribe");
    let id = inner.next_subscriber;
    inner.next_subscriber += 1;

    let slot = inner
      .slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()));
    slot.subscribers.push((id, Arc::new(callback)));
    slot.entry.subscriber_count += 1;
    slot.entry.unobserved_since = None;

    Subscription {
      store: Arc::downgrade(self),
      key: key.clone(),
      id,
      active: true,
    }
  }

  fn unsubscribe(&self, key: &CacheKey, id: u64) {
    let mut inner = mutex_lock(&self.inner, SOURCE, "unsubscribe");
    if let Some(slot) = inner.slots.get_mut(key) {
      let before = slot.subscribers.len();
      slot.subscribers.retain(|(sub_id, _)| *sub_id != id);
      if slot.subscribers.len() < before {
        slot.entry.subscriber_count -= 1;
        if slot.entry.subscriber_count == 0 {
          slot.entry.unobserved_since = Some(Instant::now());
        }
      }
    }
  }

  /// Mark every entry matching `pattern` stale without dropping its data.
  /// Returns the keys that matched.
  pub fn invalidate(&self, pattern: &KeyPattern) -> Vec<CacheKey> {
    let mut outbox = Outbox::new();
    {
      let mut inner = mutex_lock(&self.inner, SOURCE, "invalidate");
      for slot in inner.slots.values_mut() {
        if pattern.matches(&slot.entry.key) {
          slot.entry.invalidate();
          outbox.push((slot.entry.clone(), slot.callbacks()));
        }
      }
    }

    let matched: Vec<CacheKey> = outbox.iter().map(|(e, _)| e.key.clone()).collect();
    debug!(%pattern, matched = matched.len(), "invalidated cache entries");
    deliver(outbox);
    matched
  }

  /// Drop every entry matching `pattern`.
  ///
  /// Entries that still have subscribers are reset to `Idle` instead, so
  /// their observers keep a valid subscription. Returns the number of matches.
  pub fn remove(&self, pattern: &KeyPattern) -> usize {
    let mut outbox = Outbox::new();
    let mut removed = 0;
    {
      let mut inner = mutex_lock(&self.inner, SOURCE, "remove");
      inner.slots.retain(|key, slot| {
        if !pattern.matches(key) {
          return true;
        }
        removed += 1;
        if slot.subscribers.is_empty() {
          return false;
        }
        slot.entry.reset();
        outbox.push((slot.entry.clone(), slot.callbacks()));
        true
      });
    }
    deliver(outbox);
    removed
  }

  /// Evict entries nobody has observed for longer than their grace period.
  pub fn collect_garbage(&self, now: Instant) -> usize {
    let mut inner = mutex_lock(&self.inner, SOURCE, "collect_garbage");
    let before = inner.slots.len();
    inner.slots.retain(|_, slot| !slot.entry.collectable(now));
    let evicted = before - inner.slots.len();
    if evicted > 0 {
      debug!(evicted, "collected unobserved cache entries");
    }
    evicted
  }

  /// All keys currently held.
  pub fn keys(&self) -> Vec<CacheKey> {
    let inner = mutex_lock(&self.inner, SOURCE, "keys");
    inner.slots.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    mutex_lock(&self.inner, SOURCE, "len").slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Release every subscription and drop all entries. Later updates through
  /// [`CacheStore::set`] are discarded.
  pub fn shutdown(&self) {
    let mut inner = mutex_lock(&self.inner, SOURCE, "shutdown");
    inner.closed = true;
    let dropped = inner.slots.len();
    inner.slots.clear();
    debug!(dropped, "cache store shut down");
  }
}

/// A live registration of a callback on one key.
///
/// Unsubscribes on drop. Holds the store weakly, so an outstanding
/// subscription never keeps a shut-down store alive.
pub struct Subscription {
  store: Weak<CacheStore>,
  key: CacheKey,
  id: u64,
  active: bool,
}

impl Subscription {
  pub fn key(&self) -> &CacheKey {
    &self.key
  }

  pub fn unsubscribe(mut self) {
    self.release();
  }

  fn release(&mut self) {
    if !self.active {
      return;
    }
    self.active = false;
    if let Some(store) = self.store.upgrade() {
      store.unsubscribe(&self.key, self.id);
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.release();
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("key", &self.key)
      .field("id", &self.id)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::AdapterError;
  use crate::key::Operation;
  use std::sync::Mutex as StdMutex;

  fn key(resource: &str) -> CacheKey {
    CacheKey::new(resource, Operation::List)
  }

  fn data<T: Any + Send + Sync>(value: T) -> AnyData {
    Arc::new(value)
  }

  #[test]
  fn test_get_is_pure() {
    let store = CacheStore::new();
    assert!(store.get(&key("tanks")).is_none());
    assert!(store.is_empty());
  }

  #[test]
  fn test_set_creates_once() {
    let store = CacheStore::new();
    let k = key("tanks");

    store.set(&k, |e| e.begin_fetch());
    store.set(&k, |e| e.resolve(data(vec![1, 2, 3]), Instant::now(), Duration::from_secs(60), 0));

    assert_eq!(store.len(), 1);
    let entry = store.get(&k).unwrap();
    assert_eq!(entry.status(), QueryStatus::Fresh);
    assert_eq!(*entry.data_as::<Vec<i32>>().unwrap().unwrap(), vec![1, 2, 3]);
    assert!(matches!(entry.data_as::<String>(), Err(Error::TypeMismatch { .. })));
  }

  #[test]
  fn test_subscribers_notified_in_order() {
    let store = CacheStore::new();
    let k = key("tanks");
    let seen = Arc::new(StdMutex::new(Vec::new()));

    let first = {
      let seen = Arc::clone(&seen);
      store.subscribe(&k, move |e| seen.lock().unwrap().push(("first", e.status())))
    };
    let second = {
      let seen = Arc::clone(&seen);
      store.subscribe(&k, move |e| seen.lock().unwrap().push(("second", e.status())))
    };
    assert_eq!(store.get(&k).unwrap().subscriber_count(), 2);

    store.set(&k, |e| e.begin_fetch());
    assert_eq!(
      *seen.lock().unwrap(),
      vec![("first", QueryStatus::Fetching), ("second", QueryStatus::Fetching)]
    );

    drop(first);
    assert_eq!(store.get(&k).unwrap().subscriber_count(), 1);
    second.unsubscribe();
    assert_eq!(store.get(&k).unwrap().subscriber_count(), 0);

    store.set(&k, |e| e.begin_fetch());
    assert_eq!(seen.lock().unwrap().len(), 2);
  }

  #[test]
  fn test_callback_may_reenter_store() {
    let store = CacheStore::new();
    let k = key("tanks");
    let observed = Arc::new(StdMutex::new(None));

    let reader = Arc::clone(&store);
    let sink = Arc::clone(&observed);
    let k2 = k.clone();
    let _sub = store.subscribe(&k, move |_| {
      *sink.lock().unwrap() = reader.get(&k2).map(|e| e.status());
    });

    store.set(&k, |e| e.begin_fetch());
    assert_eq!(*observed.lock().unwrap(), Some(QueryStatus::Fetching));
  }

  #[test]
  fn test_invalidate_keeps_data() {
    let store = CacheStore::new();
    let sales_paid = crate::key::build_key(
      "fuel-sales",
      Operation::List,
      Some(&serde_json::json!({"status": "paid"})),
    )
    .unwrap();
    let sales_all = key("fuel-sales");
    let tanks = key("tanks");

    for k in [&sales_paid, &sales_all, &tanks] {
      store.set(k, |e| e.resolve(data(1u32), Instant::now(), Duration::from_secs(60), 0));
    }

    let matched = store.invalidate(&KeyPattern::operation("fuel-sales", Operation::List));
    assert_eq!(matched.len(), 2);

    for k in [&sales_paid, &sales_all] {
      let entry = store.get(k).unwrap();
      assert_eq!(entry.status(), QueryStatus::Stale);
      assert!(entry.data().is_some());
      assert_eq!(entry.generation(), 1);
    }
    assert_eq!(store.get(&tanks).unwrap().status(), QueryStatus::Fresh);
  }

  #[test]
  fn test_invalidate_clears_error_and_spares_idle() {
    let store = CacheStore::new();
    let failing = key("tanks");
    let idle = CacheKey::new("tanks", Operation::Detail);

    store.set(&failing, |e| {
      e.reject(FetchError {
        key: failing.clone(),
        attempts: 1,
        source: AdapterError::status(500, "boom"),
      })
    });
    store.set(&idle, |_| {});

    store.invalidate(&KeyPattern::resource("tanks"));

    let entry = store.get(&failing).unwrap();
    assert_eq!(entry.status(), QueryStatus::Stale);
    assert!(entry.error().is_none());
    assert_eq!(store.get(&idle).unwrap().status(), QueryStatus::Idle);
  }

  #[test]
  fn test_fetch_settling_after_invalidation_lands_stale() {
    let store = CacheStore::new();
    let k = key("tanks");

    let started = store.set(&k, |e| e.begin_fetch()).generation();
    store.invalidate(&KeyPattern::resource("tanks"));
    assert_eq!(store.get(&k).unwrap().status(), QueryStatus::Fetching);

    store.set(&k, |e| e.resolve(data(1u8), Instant::now(), Duration::from_secs(60), started));
    assert_eq!(store.get(&k).unwrap().status(), QueryStatus::Stale);
  }

  #[tokio::test(start_paused = true)]
  async fn test_freshness_window() {
    let store = CacheStore::new();
    let k = key("tanks");
    store.set(&k, |e| e.resolve(data(1u8), Instant::now(), Duration::from_secs(10), 0));

    let entry = store.get(&k).unwrap();
    assert_eq!(entry.current_status(Instant::now()), QueryStatus::Fresh);

    tokio::time::advance(Duration::from_secs(11)).await;
    let entry = store.get(&k).unwrap();
    assert_eq!(entry.status(), QueryStatus::Fresh);
    assert_eq!(entry.current_status(Instant::now()), QueryStatus::Stale);

    store.set(&k, |e| e.expire(Instant::now()));
    assert_eq!(store.get(&k).unwrap().status(), QueryStatus::Stale);
  }

  #[tokio::test(start_paused = true)]
  async fn test_garbage_collection_respects_subscribers_and_grace() {
    let store = CacheStore::new();
    let watched = key("tanks");
    let orphan = key("shifts");

    let sub = store.subscribe(&watched, |_| {});
    store.set(&orphan, |e| e.set_gc_time(Duration::from_secs(30)));
    store.set(&watched, |e| e.set_gc_time(Duration::from_secs(30)));

    assert_eq!(store.collect_garbage(Instant::now()), 0);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(store.collect_garbage(Instant::now()), 1);
    assert!(store.get(&orphan).is_none());
    assert!(store.get(&watched).is_some());

    drop(sub);
    assert_eq!(store.collect_garbage(Instant::now()), 0);
    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(store.collect_garbage(Instant::now()), 1);
    assert!(store.is_empty());
  }

  #[test]
  fn test_remove_resets_subscribed_entries() {
    let store = CacheStore::new();
    let watched = CacheKey::new("tanks", Operation::Detail);
    let unwatched = key("tanks");
    let _sub = store.subscribe(&watched, |_| {});

    for k in [&watched, &unwatched] {
      store.set(k, |e| e.resolve(data(1u8), Instant::now(), Duration::from_secs(60), 0));
    }

    assert_eq!(store.remove(&KeyPattern::resource("tanks")), 2);
    assert!(store.get(&unwatched).is_none());
    let entry = store.get(&watched).unwrap();
    assert_eq!(entry.status(), QueryStatus::Idle);
    assert!(entry.data().is_none());
  }

  #[test]
  fn test_shutdown_releases_everything() {
    let store = CacheStore::new();
    let sub = store.subscribe(&key("tanks"), |_| {});
    store.shutdown();
    assert!(store.is_empty());
    // Unsubscribing after shutdown is harmless
    drop(sub);
  }

  #[test]
  fn test_set_after_shutdown_is_dropped() {
    let store = CacheStore::new();
    let k = key("tanks");
    store.shutdown();

    let entry = store.set(&k, |e| e.resolve(data(1u8), Instant::now(), Duration::from_secs(60), 0));
    assert_eq!(entry.status(), QueryStatus::Fresh);
    assert!(store.get(&k).is_none());
    assert!(store.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_settled_fetch_restarts_grace_period() {
    let store = CacheStore::new();
    let k = key("tanks");
    let gc_time = Duration::from_secs(2);
    store.set(&k, |e| e.set_gc_time(gc_time));

    tokio::time::advance(Duration::from_millis(1_500)).await;
    store.set(&k, |e| e.begin_fetch());
    store.set(&k, |e| e.resolve(data(1u8), Instant::now(), Duration::from_secs(1), 0));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(store.collect_garbage(Instant::now()), 0);
    assert!(store.get(&k).is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(store.collect_garbage(Instant::now()), 1);
    assert!(store.get(&k).is_none());
  }
}
