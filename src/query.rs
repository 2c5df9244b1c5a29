//! Consumer-facing handles: query observers and mutation handles.
//!
//! A [`QueryObserver`] is what a view holds while it is on screen. It keeps a
//! subscription on its cache key, receives every change to the entry over a
//! channel, and asks for a refetch whenever the entry goes stale.
//!
//! ```ignore
//! let mut tanks = bindings.tanks.list(TankFilter::default())?;
//!
//! // In event loop tick
//! if tanks.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! let snapshot = tanks.snapshot();
//! match snapshot.status {
//!     QueryStatus::Fetching if snapshot.data.is_none() => render_spinner(),
//!     _ => render_rows(snapshot.data.as_deref()),
//! }
//! ```

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{FetchError, MutationError};
use crate::key::CacheKey;
use crate::lock::mutex_lock;
use crate::store::{CacheEntry, CacheStore, QueryStatus, Subscription};

const SOURCE: &str = "query";

/// Schedules a fetch for an observer's key. `true` forces it past freshness.
pub(crate) type Revalidate = Arc<dyn Fn(bool) + Send + Sync>;

/// Point-in-time view of a query, as a UI would render it.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
  pub data: Option<Arc<T>>,
  pub status: QueryStatus,
  pub error: Option<FetchError>,
  /// Data shown is outdated and a refresh is pending or due
  pub is_stale: bool,
}

impl<T> QuerySnapshot<T> {
  fn idle() -> Self {
    Self {
      data: None,
      status: QueryStatus::Idle,
      error: None,
      is_stale: false,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Fetching && self.data.is_none()
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

/// Live view of one cache key.
///
/// Dropping the observer releases its subscription. An observer created with
/// [`QueryObserver::idle`] has no key, never fetches, and always reports `Idle`.
pub struct QueryObserver<T> {
  key: Option<CacheKey>,
  current: Option<CacheEntry>,
  rx: Option<mpsc::UnboundedReceiver<CacheEntry>>,
  revalidate: Option<Revalidate>,
  _subscription: Option<Subscription>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
  /// Observer for a query that cannot run yet (e.g. no id selected).
  pub fn idle() -> Self {
    Self {
      key: None,
      current: None,
      rx: None,
      revalidate: None,
      _subscription: None,
      _marker: PhantomData,
    }
  }

  /// Subscribe to `key` and schedule the initial fetch.
  pub(crate) fn attach(store: &Arc<CacheStore>, key: CacheKey, revalidate: Revalidate) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let on_change = Arc::clone(&revalidate);
    let subscription = store.subscribe(&key, move |entry| {
      // Ignore send errors - the observer may be mid-drop
      let _ = tx.send(entry.clone());
      if entry.status() == QueryStatus::Stale {
        on_change(false);
      }
    });

    let observer = Self {
      current: store.get(&key),
      key: Some(key),
      rx: Some(rx),
      revalidate: Some(Arc::clone(&revalidate)),
      _subscription: Some(subscription),
      _marker: PhantomData,
    };
    revalidate(false);
    observer
  }

  pub fn key(&self) -> Option<&CacheKey> {
    self.key.as_ref()
  }

  pub fn is_idle(&self) -> bool {
    self.key.is_none()
  }

  /// Current state of the query.
  pub fn snapshot(&self) -> QuerySnapshot<T> {
    let Some(entry) = &self.current else {
      return QuerySnapshot::idle();
    };

    let status = entry.current_status(Instant::now());
    let data = entry.data_as::<T>().ok().flatten();
    QuerySnapshot {
      is_stale: data.is_some() && matches!(status, QueryStatus::Stale | QueryStatus::Fetching),
      data,
      status,
      error: entry.error().cloned(),
    }
  }

  pub fn status(&self) -> QueryStatus {
    self.snapshot().status
  }

  pub fn data(&self) -> Option<Arc<T>> {
    self.snapshot().data
  }

  pub fn error(&self) -> Option<FetchError> {
    self.current.as_ref().and_then(|e| e.error().cloned())
  }

  /// Drain pending change notifications without blocking.
  ///
  /// Returns `true` if the state changed. Also the point where an elapsed
  /// freshness window is noticed: a fresh entry past its stale time triggers a
  /// background refetch here. Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let Some(rx) = &mut self.rx else {
      return false;
    };

    let mut changed = false;
    while let Ok(entry) = rx.try_recv() {
      self.current = Some(entry);
      changed = true;
    }

    if let (Some(entry), Some(revalidate)) = (&self.current, &self.revalidate) {
      if entry.status() == QueryStatus::Fresh
        && entry.current_status(Instant::now()) == QueryStatus::Stale
      {
        revalidate(false);
      }
    }

    changed
  }

  /// Wait for the next change notification.
  ///
  /// Returns `false` immediately for an idle observer, which can never change.
  pub async fn changed(&mut self) -> bool {
    let Some(rx) = &mut self.rx else {
      return false;
    };
    match rx.recv().await {
      Some(entry) => {
        self.current = Some(entry);
        true
      }
      None => false,
    }
  }

  /// Wait until the query holds fresh data or has failed, and return that
  /// snapshot. Stale data counts as unsettled: a refetch is always scheduled
  /// for it.
  pub async fn settled(&mut self) -> QuerySnapshot<T> {
    loop {
      self.poll();
      let snapshot = self.snapshot();
      let pending = matches!(
        snapshot.status,
        QueryStatus::Idle | QueryStatus::Fetching | QueryStatus::Stale
      );
      if self.is_idle() || !pending {
        return snapshot;
      }
      if !self.changed().await {
        return self.snapshot();
      }
    }
  }

  /// Fetch again even if the data is fresh.
  pub fn refetch(&self) {
    if let Some(revalidate) = &self.revalidate {
      revalidate(true);
    }
  }
}

impl<T> std::fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryObserver")
      .field("key", &self.key)
      .field("current", &self.current)
      .finish_non_exhaustive()
  }
}

/// The state of a mutation
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Mutation has not been started
  Idle,
  /// Mutation is waiting on the backend
  Loading,
  /// Mutation completed successfully
  Success(T),
  /// Mutation failed with an error
  Error(MutationError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&MutationError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type MutateFn<I, R> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<R, MutationError>> + Send + Sync>;

/// A create/update/delete bound to one resource, with its last outcome.
///
/// Clones share state, so a form and a status bar can hold the same handle.
pub struct MutationHandle<I, R> {
  state: Arc<Mutex<QueryState<R>>>,
  run: MutateFn<I, R>,
}

impl<I, R> Clone for MutationHandle<I, R> {
  fn clone(&self) -> Self {
    Self {
      state: Arc::clone(&self.state),
      run: Arc::clone(&self.run),
    }
  }
}

impl<I, R> MutationHandle<I, R>
where
  I: Send + 'static,
  R: Clone + Send + 'static,
{
  pub(crate) fn new<F>(run: F) -> Self
  where
    F: Fn(I) -> BoxFuture<'static, Result<R, MutationError>> + Send + Sync + 'static,
  {
    Self {
      state: Arc::new(Mutex::new(QueryState::Idle)),
      run: Arc::new(run),
    }
  }

  /// Run the mutation. The error is both returned and kept in [`state`](Self::state).
  pub async fn mutate(&self, input: I) -> Result<R, MutationError> {
    *mutex_lock(&self.state, SOURCE, "mutate") = QueryState::Loading;

    let result = (self.run)(input).await;

    *mutex_lock(&self.state, SOURCE, "mutate") = match &result {
      Ok(value) => QueryState::Success(value.clone()),
      Err(e) => QueryState::Error(e.clone()),
    };
    result
  }

  pub fn state(&self) -> QueryState<R> {
    mutex_lock(&self.state, SOURCE, "state").clone()
  }

  pub fn is_loading(&self) -> bool {
    self.state().is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state().is_error()
  }

  pub fn is_success(&self) -> bool {
    self.state().is_success()
  }

  /// Forget the last outcome.
  pub fn reset(&self) {
    *mutex_lock(&self.state, SOURCE, "reset") = QueryState::Idle;
  }
}
