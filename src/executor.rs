//! Query executor: resolves a cache key against the store, fetching when needed.
//!
//! 1. Fresh entry: return cached data, no network call
//! 2. Fetch already in flight for the key: attach to it
//! 3. Stale entry with data: return the data now, revalidate in the background
//! 4. Anything else: fetch (with retries) and wait for the result
//!
//! Every fetch runs on its own spawned task, so it completes and updates the
//! cache even if all callers waiting on it have gone away.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AdapterError, Error, FetchError, Result};
use crate::key::CacheKey;
use crate::lock::mutex_lock;
use crate::store::{AnyData, CacheEntry, CacheStore, QueryStatus, DEFAULT_GC_TIME};

const SOURCE: &str = "executor";

/// Upper bound for a single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Per-binding fetch policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
  /// How long fetched data counts as fresh
  pub stale_time: Duration,
  /// Retries after the first attempt, for transient failures only
  pub retry_count: u32,
  /// Base delay, doubled on every retry
  pub retry_delay: Duration,
  /// Grace period before an unobserved entry is evicted
  pub gc_time: Duration,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      stale_time: Duration::from_secs(60),
      retry_count: 3,
      retry_delay: Duration::from_secs(1),
      gc_time: DEFAULT_GC_TIME,
    }
  }
}

impl QueryOptions {
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
    self.retry_count = retry_count;
    self.retry_delay = retry_delay;
    self
  }

  pub fn with_gc_time(mut self, gc_time: Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  /// Delay before retry number `attempt` (0-based).
  pub fn backoff(&self, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    self.retry_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
  }
}

/// Where the data handed back by [`QueryExecutor::ensure`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the adapter for this call (or a call it attached to)
  Network,
  /// Served from cache within its freshness window
  CacheFresh,
  /// Served from cache while a background refresh is pending
  CacheStale,
}

/// Data plus where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  fn new(data: T, source: CacheSource) -> Self {
    Self { data, source }
  }

  /// The data is stale and a refresh is under way. Informational only.
  pub fn is_stale(&self) -> bool {
    self.source == CacheSource::CacheStale
  }
}

type SharedFetch = Shared<BoxFuture<'static, Result<AnyData, FetchError>>>;

struct InFlight {
  id: u64,
  fetch: SharedFetch,
}

type InFlightMap = Arc<Mutex<HashMap<CacheKey, InFlight>>>;

enum Plan {
  Attach(SharedFetch),
  Started {
    fetch: SharedFetch,
    stale: Option<AnyData>,
  },
}

/// Resolves cache keys, guaranteeing at most one in-flight fetch per key.
///
/// Subscribers see the `Fetching` transition while the in-flight map is
/// locked, so their callbacks must not call into the executor synchronously.
pub struct QueryExecutor {
  store: Arc<CacheStore>,
  in_flight: InFlightMap,
  next_fetch: AtomicU64,
}

impl QueryExecutor {
  pub fn new(store: Arc<CacheStore>) -> Self {
    Self {
      store,
      in_flight: Arc::new(Mutex::new(HashMap::new())),
      next_fetch: AtomicU64::new(0),
    }
  }

  pub fn store(&self) -> &Arc<CacheStore> {
    &self.store
  }

  /// Return data for `key`, fetching through `fetch` unless it is fresh.
  ///
  /// `fetch` may be called more than once when transient failures are
  /// retried. A failed fetch rejects here and leaves the entry in `Error`
  /// with its previous data.
  pub async fn ensure<T, F, Fut>(
    &self,
    key: &CacheKey,
    fetch: F,
    options: &QueryOptions,
  ) -> Result<CacheResult<Arc<T>>>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, AdapterError>> + Send + 'static,
  {
    self.run(key, fetch, options, false).await
  }

  /// Fetch `key` even if its data is fresh. Still attaches to an in-flight
  /// fetch instead of starting a second one.
  pub async fn refetch<T, F, Fut>(
    &self,
    key: &CacheKey,
    fetch: F,
    options: &QueryOptions,
  ) -> Result<CacheResult<Arc<T>>>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, AdapterError>> + Send + 'static,
  {
    self.run(key, fetch, options, true).await
  }

  /// Whether a fetch for `key` is currently in flight.
  pub fn is_fetching(&self, key: &CacheKey) -> bool {
    mutex_lock(&self.in_flight, SOURCE, "is_fetching").contains_key(key)
  }

  /// Forget every in-flight fetch. Fetches already running finish on their
  /// own task; callers attached to them still get their result.
  pub fn shutdown(&self) {
    let mut in_flight = mutex_lock(&self.in_flight, SOURCE, "shutdown");
    let pending = in_flight.len();
    in_flight.clear();
    debug!(pending, "query executor shut down");
  }

  async fn run<T, F, Fut>(
    &self,
    key: &CacheKey,
    fetch: F,
    options: &QueryOptions,
    force: bool,
  ) -> Result<CacheResult<Arc<T>>>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, AdapterError>> + Send + 'static,
  {
    let now = Instant::now();
    self.store.collect_garbage(now);

    let plan = {
      let mut in_flight = mutex_lock(&self.in_flight, SOURCE, "ensure");
      if let Some(pending) = in_flight.get(key) {
        debug!(%key, "attaching to in-flight fetch");
        Plan::Attach(pending.fetch.clone())
      } else {
        let entry = self.store.get(key);
        let status = entry.as_ref().map(|e| e.current_status(now));

        if !force && status == Some(QueryStatus::Fresh) {
          if let Some(data) = entry.as_ref().map(CacheEntry::data_as::<T>).transpose()?.flatten() {
            debug!(%key, "cache hit");
            return Ok(CacheResult::new(data, CacheSource::CacheFresh));
          }
        }

        let stale = match (&entry, status) {
          (Some(e), Some(QueryStatus::Stale)) if !force => e.data().cloned(),
          _ => None,
        };
        let generation = entry.as_ref().map_or(0, CacheEntry::generation);
        let id = self.next_fetch.fetch_add(1, Ordering::Relaxed);
        let fetch = self.spawnable_fetch(key, fetch, options, id, generation);
        in_flight.insert(
          key.clone(),
          InFlight {
            id,
            fetch: fetch.clone(),
          },
        );
        // Entered while the slot is held, so an attaching caller can never
        // settle the fetch before the entry reads `Fetching`.
        let gc_time = options.gc_time;
        self.store.set(key, |e| {
          e.begin_fetch();
          e.set_gc_time(gc_time);
        });
        Plan::Started { fetch, stale }
      }
    };

    match plan {
      Plan::Attach(fetch) => self.settle(key, fetch.await),
      Plan::Started { fetch, stale } => {
        debug!(%key, background = stale.is_some(), "fetch started");
        tokio::spawn(fetch.clone().map(|_| ()));

        match stale {
          Some(data) => {
            let data = data.downcast::<T>().map_err(|_| Error::TypeMismatch { key: key.clone() })?;
            Ok(CacheResult::new(data, CacheSource::CacheStale))
          }
          None => self.settle(key, fetch.await),
        }
      }
    }
  }

  fn settle<T>(
    &self,
    key: &CacheKey,
    result: std::result::Result<AnyData, FetchError>,
  ) -> Result<CacheResult<Arc<T>>>
  where
    T: Send + Sync + 'static,
  {
    let data = result?;
    let data = data.downcast::<T>().map_err(|_| Error::TypeMismatch { key: key.clone() })?;
    Ok(CacheResult::new(data, CacheSource::Network))
  }

  /// Build the shared fetch future: retry loop, store update, in-flight cleanup.
  fn spawnable_fetch<T, F, Fut>(
    &self,
    key: &CacheKey,
    fetch: F,
    options: &QueryOptions,
    id: u64,
    generation: u64,
  ) -> SharedFetch
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, AdapterError>> + Send + 'static,
  {
    let key = key.clone();
    let store = Arc::clone(&self.store);
    let in_flight = Arc::clone(&self.in_flight);
    let options = options.clone();

    async move {
      let mut attempt = 0;
      let result = loop {
        match fetch().await {
          Ok(value) => break Ok(Arc::new(value) as AnyData),
          Err(source) if source.is_transient() && attempt < options.retry_count => {
            let delay = options.backoff(attempt);
            warn!(%key, attempt = attempt + 1, ?delay, error = %source, "transient fetch failure, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
          }
          Err(source) => {
            break Err(FetchError {
              key: key.clone(),
              attempts: attempt + 1,
              source,
            })
          }
        }
      };

      match &result {
        Ok(data) => {
          let data = Arc::clone(data);
          store.set(&key, |e| e.resolve(data, Instant::now(), options.stale_time, generation));
        }
        Err(err) => {
          warn!(%key, error = %err, "fetch failed");
          store.set(&key, |e| e.reject(err.clone()));
        }
      }

      // The store is updated before the in-flight slot is released, so a
      // caller arriving in between attaches instead of fetching again.
      let mut pending = mutex_lock(&in_flight, SOURCE, "settle");
      if pending.get(&key).is_some_and(|p| p.id == id) {
        pending.remove(&key);
      }

      result
    }
    .boxed()
    .shared()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::key::{build_key, KeyPattern, Operation};
  use std::sync::atomic::AtomicU32;

  fn counting_fetch(
    calls: &Arc<AtomicU32>,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, std::result::Result<Vec<u32>, AdapterError>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
      let calls = Arc::clone(&calls);
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(delay).await;
        Ok(vec![n; n as usize])
      }
      .boxed()
    }
  }

  fn fast_retry() -> QueryOptions {
    QueryOptions::default().with_retry(3, Duration::from_millis(100))
  }

  #[test]
  fn test_backoff_is_exponential_and_capped() {
    let options = QueryOptions::default().with_retry(10, Duration::from_secs(1));
    assert_eq!(options.backoff(0), Duration::from_secs(1));
    assert_eq!(options.backoff(1), Duration::from_secs(2));
    assert_eq!(options.backoff(3), Duration::from_secs(8));
    assert_eq!(options.backoff(9), MAX_RETRY_DELAY);
    assert_eq!(options.backoff(40), MAX_RETRY_DELAY);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_ensure_fetches_once() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default();

    let results = futures::future::join_all((0..5).map(|_| {
      executor.ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::from_millis(50)), &options)
    }))
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = results[0].as_ref().unwrap().data.clone();
    for result in &results {
      let result = result.as_ref().unwrap();
      assert!(Arc::ptr_eq(&first, &result.data));
      assert_eq!(result.source, CacheSource::Network);
    }
    assert!(!executor.is_fetching(&key));
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_entry_skips_network() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default();

    let first = executor
      .ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::ZERO), &options)
      .await
      .unwrap();
    let second = executor
      .ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::ZERO), &options)
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert!(Arc::ptr_eq(&first.data, &second.data));
    assert_eq!(executor.store().get(&key).unwrap().status(), QueryStatus::Fresh);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stale_while_revalidate() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default().with_stale_time(Duration::from_secs(10));

    executor
      .ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::ZERO), &options)
      .await
      .unwrap();
    tokio::time::advance(Duration::from_secs(11)).await;

    let stale = executor
      .ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::from_millis(20)), &options)
      .await
      .unwrap();
    assert!(stale.is_stale());
    assert_eq!(*stale.data, vec![1]);
    assert_eq!(executor.store().get(&key).unwrap().status(), QueryStatus::Fetching);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let entry = executor.store().get(&key).unwrap();
    assert_eq!(entry.status(), QueryStatus::Fresh);
    assert_eq!(*entry.data_as::<Vec<u32>>().unwrap().unwrap(), vec![2, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_transient_failures_are_retried() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&calls);
    let result = executor
      .ensure(
        &key,
        move || {
          let counter = Arc::clone(&counter);
          async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
              Err(AdapterError::status(503, "unavailable"))
            } else {
              Ok("tanks".to_string())
            }
          }
        },
        &fast_retry(),
      )
      .await
      .unwrap();

    assert_eq!(*result.data, "tanks");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_permanent_failure_is_not_retried() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&calls);
    let err = executor
      .ensure::<String, _, _>(
        &key,
        move || {
          counter.fetch_add(1, Ordering::SeqCst);
          async { Err::<String, _>(AdapterError::status(404, "missing")) }
        },
        &fast_retry(),
      )
      .await
      .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match err {
      Error::Fetch(fetch) => assert_eq!(fetch.attempts, 1),
      other => panic!("unexpected error: {other:?}"),
    }
    let entry = executor.store().get(&key).unwrap();
    assert_eq!(entry.status(), QueryStatus::Error);
    assert!(entry.error().is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_exhausted_retries_keep_previous_data() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = build_key("tanks", Operation::Detail, Some(&"T1")).unwrap();
    let options = fast_retry();

    executor
      .ensure(&key, || async { Ok::<_, AdapterError>(42u32) }, &options)
      .await
      .unwrap();
    executor.store().invalidate(&KeyPattern::exact(&key));

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let stale = executor
      .ensure::<u32, _, _>(
        &key,
        move || {
          counter.fetch_add(1, Ordering::SeqCst);
          async { Err::<u32, _>(AdapterError::status(500, "down")) }
        },
        &options,
      )
      .await
      .unwrap();
    assert!(stale.is_stale());
    assert_eq!(*stale.data, 42);

    // 100 + 200 + 400 ms of backoff
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let entry = executor.store().get(&key).unwrap();
    assert_eq!(entry.status(), QueryStatus::Error);
    assert_eq!(entry.error().unwrap().attempts, 4);
    assert_eq!(*entry.data_as::<u32>().unwrap().unwrap(), 42);
  }

  #[tokio::test(start_paused = true)]
  async fn test_refetch_ignores_freshness() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default();

    executor
      .ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::ZERO), &options)
      .await
      .unwrap();
    let again = executor
      .refetch::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::ZERO), &options)
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(*again.data, vec![2, 2]);
  }

  #[tokio::test]
  async fn test_type_mismatch_is_reported() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let options = QueryOptions::default();

    executor
      .ensure(&key, || async { Ok::<_, AdapterError>(1u32) }, &options)
      .await
      .unwrap();
    let err = executor
      .ensure(&key, || async { Ok::<_, AdapterError>("one".to_string()) }, &options)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
  }

  #[tokio::test(start_paused = true)]
  async fn test_entry_is_fetching_once_registered_in_flight() {
    let executor = QueryExecutor::new(CacheStore::new());
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default();

    let pending = executor.ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::from_millis(50)), &options);
    tokio::pin!(pending);
    assert!(futures::poll!(&mut pending).is_pending());

    assert!(executor.is_fetching(&key));
    assert_eq!(executor.store().get(&key).unwrap().status(), QueryStatus::Fetching);

    pending.await.unwrap();
    assert!(!executor.is_fetching(&key));
    assert_eq!(executor.store().get(&key).unwrap().status(), QueryStatus::Fresh);
  }

  #[tokio::test(start_paused = true)]
  async fn test_shutdown_forgets_in_flight_fetches() {
    let store = CacheStore::new();
    let executor = QueryExecutor::new(Arc::clone(&store));
    let key = CacheKey::new("tanks", Operation::List);
    let calls = Arc::new(AtomicU32::new(0));
    let options = QueryOptions::default();

    let pending = executor.ensure::<Vec<u32>, _, _>(&key, counting_fetch(&calls, Duration::from_millis(50)), &options);
    tokio::pin!(pending);
    assert!(futures::poll!(&mut pending).is_pending());

    executor.shutdown();
    store.shutdown();
    assert!(!executor.is_fetching(&key));

    // the attached caller still gets its data; the store stays empty
    assert_eq!(*pending.await.unwrap().data, vec![1]);
    assert!(store.is_empty());
  }
}
