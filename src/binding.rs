//! Binding factory.
//!
//! [`QueryClient`] owns the session's cache store, executor and mutation
//! coordinator. [`QueryClient::create_bindings`] turns an adapter plus its
//! invalidation rules into a [`Binding`]: list/detail observers and
//! create/update/delete handles with uniform caching behaviour. Resources
//! differ only in the adapter and rules they supply.

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::ResourceAdapter;
use crate::error::{AdapterError, InvalidKeyError, MutationError, Result};
use crate::executor::{CacheResult, QueryExecutor, QueryOptions};
use crate::key::{build_key, CacheKey, KeyPattern, Operation};
use crate::mutation::{id_value, InvalidationRules, MutationCoordinator, MutationKind};
use crate::query::{MutationHandle, QueryObserver, Revalidate};
use crate::store::{CacheEntry, CacheStore};

/// Owner of one session's cache. Clones share the same cache.
#[derive(Clone)]
pub struct QueryClient {
  store: Arc<CacheStore>,
  executor: Arc<QueryExecutor>,
  coordinator: MutationCoordinator,
  defaults: QueryOptions,
}

impl QueryClient {
  pub fn new(defaults: QueryOptions) -> Self {
    let store = CacheStore::new();
    Self {
      executor: Arc::new(QueryExecutor::new(Arc::clone(&store))),
      coordinator: MutationCoordinator::new(Arc::clone(&store)),
      store,
      defaults,
    }
  }

  pub fn defaults(&self) -> &QueryOptions {
    &self.defaults
  }

  /// Build the accessor bundle for one resource.
  pub fn create_bindings<A: ResourceAdapter>(
    &self,
    resource: &str,
    adapter: A,
    rules: InvalidationRules,
    options: QueryOptions,
  ) -> Binding<A> {
    Binding {
      inner: Arc::new(BindingInner {
        resource: resource.to_string(),
        adapter: Arc::new(adapter),
        rules,
        options,
        executor: Arc::clone(&self.executor),
        coordinator: self.coordinator.clone(),
      }),
    }
  }

  /// Mark everything matching `pattern` stale.
  pub fn invalidate(&self, pattern: &KeyPattern) -> Vec<CacheKey> {
    self.store.invalidate(pattern)
  }

  /// Snapshot of one entry, for diagnostics.
  pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.store.get(key)
  }

  pub fn cached_keys(&self) -> Vec<CacheKey> {
    self.store.keys()
  }

  /// Release all subscriptions and drop every cached entry. Fetches still
  /// running when this is called settle without touching the cache.
  pub fn shutdown(&self) {
    self.executor.shutdown();
    self.store.shutdown();
  }
}

struct BindingInner<A: ResourceAdapter> {
  resource: String,
  adapter: Arc<A>,
  rules: InvalidationRules,
  options: QueryOptions,
  executor: Arc<QueryExecutor>,
  coordinator: MutationCoordinator,
}

/// Cached accessors for one resource.
pub struct Binding<A: ResourceAdapter> {
  inner: Arc<BindingInner<A>>,
}

impl<A: ResourceAdapter> Clone for Binding<A> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

type List<A> = Vec<<A as ResourceAdapter>::Entity>;
type Detail<A> = Option<<A as ResourceAdapter>::Entity>;

impl<A: ResourceAdapter> Binding<A> {
  pub fn resource(&self) -> &str {
    &self.inner.resource
  }

  pub fn options(&self) -> &QueryOptions {
    &self.inner.options
  }

  pub fn rules(&self) -> &InvalidationRules {
    &self.inner.rules
  }

  pub fn list_key(&self, filter: &A::Filter) -> Result<CacheKey, InvalidKeyError> {
    build_key(&self.inner.resource, Operation::List, Some(filter))
  }

  pub fn detail_key(&self, id: &A::Id) -> Result<CacheKey, InvalidKeyError> {
    build_key(&self.inner.resource, Operation::Detail, Some(id))
  }

  /// Observe the list matching `filter`. Must be called inside a Tokio runtime.
  pub fn list(&self, filter: A::Filter) -> Result<QueryObserver<List<A>>, InvalidKeyError> {
    let key = self.list_key(&filter)?;
    Ok(self.observe(key, self.list_fetcher(filter)))
  }

  /// Observe one record. A missing or blank id yields an idle observer and
  /// no request. Must be called inside a Tokio runtime.
  pub fn by_id(&self, id: Option<A::Id>) -> Result<QueryObserver<Detail<A>>, InvalidKeyError> {
    let Some(id) = id.filter(|id| !is_blank_id(id)) else {
      return Ok(QueryObserver::idle());
    };
    let key = self.detail_key(&id)?;
    Ok(self.observe(key, self.detail_fetcher(id)))
  }

  /// Resolve the list matching `filter` without subscribing to it.
  pub async fn fetch_list(&self, filter: A::Filter) -> Result<CacheResult<Arc<List<A>>>> {
    let key = self.list_key(&filter)?;
    self
      .inner
      .executor
      .ensure(&key, self.list_fetcher(filter), &self.inner.options)
      .await
  }

  /// Resolve one record without subscribing to it.
  pub async fn fetch_by_id(&self, id: A::Id) -> Result<CacheResult<Arc<Detail<A>>>> {
    let key = self.detail_key(&id)?;
    self
      .inner
      .executor
      .ensure(&key, self.detail_fetcher(id), &self.inner.options)
      .await
  }

  /// Warm the cache for `filter` in the background.
  pub fn prefetch_list(&self, filter: A::Filter) -> Result<(), InvalidKeyError> {
    let key = self.list_key(&filter)?;
    spawn_ensure(
      Arc::clone(&self.inner.executor),
      key,
      Arc::new(self.list_fetcher(filter)),
      self.inner.options.clone(),
      false,
    );
    Ok(())
  }

  /// Mark every cached read of this resource stale.
  pub fn invalidate_all(&self) -> Vec<CacheKey> {
    self
      .inner
      .executor
      .store()
      .invalidate(&KeyPattern::resource(self.inner.resource.clone()))
  }

  pub fn create(&self) -> MutationHandle<A::Create, A::Entity> {
    let inner = Arc::clone(&self.inner);
    MutationHandle::new(move |input: A::Create| {
      let inner = Arc::clone(&inner);
      async move {
        let call = inner.adapter.create(input);
        inner
          .coordinator
          .mutate(&inner.resource, MutationKind::Create, None, call, &inner.rules)
          .await
      }
      .boxed()
    })
  }

  pub fn update(&self) -> MutationHandle<(A::Id, A::Update), A::Entity> {
    let inner = Arc::clone(&self.inner);
    MutationHandle::new(move |(id, patch): (A::Id, A::Update)| {
      let inner = Arc::clone(&inner);
      async move {
        let call = inner.adapter.update(&id, patch);
        inner
          .coordinator
          .mutate(&inner.resource, MutationKind::Update, id_value(&id), call, &inner.rules)
          .await
      }
      .boxed()
    })
  }

  pub fn delete(&self) -> MutationHandle<A::Id, ()> {
    let inner = Arc::clone(&self.inner);
    MutationHandle::new(move |id: A::Id| {
      let inner = Arc::clone(&inner);
      async move {
        let call = inner.adapter.delete(&id);
        inner
          .coordinator
          .mutate(&inner.resource, MutationKind::Delete, id_value(&id), call, &inner.rules)
          .await
      }
      .boxed()
    })
  }

  /// Shorthand for `self.update().mutate((id, patch))`.
  pub async fn update_one(&self, id: A::Id, patch: A::Update) -> Result<A::Entity, MutationError> {
    self.update().mutate((id, patch)).await
  }

  fn list_fetcher(
    &self,
    filter: A::Filter,
  ) -> impl Fn() -> futures::future::BoxFuture<'static, std::result::Result<List<A>, AdapterError>>
       + Send
       + Sync
       + 'static {
    let adapter = Arc::clone(&self.inner.adapter);
    move || {
      let adapter = Arc::clone(&adapter);
      let filter = filter.clone();
      async move { adapter.list(&filter).await }.boxed()
    }
  }

  fn detail_fetcher(
    &self,
    id: A::Id,
  ) -> impl Fn() -> futures::future::BoxFuture<'static, std::result::Result<Detail<A>, AdapterError>>
       + Send
       + Sync
       + 'static {
    let adapter = Arc::clone(&self.inner.adapter);
    move || {
      let adapter = Arc::clone(&adapter);
      let id = id.clone();
      async move { adapter.get_by_id(&id).await }.boxed()
    }
  }

  fn observe<T, F, Fut>(&self, key: CacheKey, fetch: F) -> QueryObserver<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, AdapterError>> + Send + 'static,
  {
    let executor = Arc::clone(&self.inner.executor);
    let store = Arc::clone(executor.store());
    let fetch = Arc::new(fetch);
    let options = self.inner.options.clone();
    let revalidate_key = key.clone();

    let revalidate: Revalidate = Arc::new(move |force| {
      spawn_ensure(
        Arc::clone(&executor),
        revalidate_key.clone(),
        Arc::clone(&fetch),
        options.clone(),
        force,
      );
    });

    QueryObserver::attach(&store, key, revalidate)
  }
}

/// Run `ensure` (or `refetch` when forced) on a background task.
fn spawn_ensure<T, F, Fut>(
  executor: Arc<QueryExecutor>,
  key: CacheKey,
  fetch: Arc<F>,
  options: QueryOptions,
  force: bool,
) where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = std::result::Result<T, AdapterError>> + Send + 'static,
{
  let Ok(runtime) = tokio::runtime::Handle::try_current() else {
    warn!(%key, "no async runtime; query not scheduled");
    return;
  };

  runtime.spawn(async move {
    let fetch = move || (*fetch)();
    let result = if force {
      executor.refetch(&key, fetch, &options).await
    } else {
      executor.ensure(&key, fetch, &options).await
    };
    if let Err(e) = result {
      debug!(%key, error = %e, "background query settled with error");
    }
  });
}

/// Ids that serialize to nothing or to a blank string identify no record.
fn is_blank_id<I: serde::Serialize>(id: &I) -> bool {
  match id_value(id) {
    None => true,
    Some(Value::String(s)) => s.trim().is_empty(),
    Some(_) => false,
  }
}
