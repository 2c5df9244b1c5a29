//! The per-resource backend interface consumed by the cache layer.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AdapterError;

/// CRUD access to one resource type on the backend.
///
/// Implementations are stateless with respect to caching and must reject on
/// backend errors rather than returning empty results. `get_by_id` returns
/// `Ok(None)` for a record that does not exist.
#[async_trait]
pub trait ResourceAdapter: Send + Sync + 'static {
  type Entity: Clone + Send + Sync + 'static;
  /// Record identifier; its JSON form is the param of detail cache keys
  type Id: Serialize + Clone + Send + Sync + 'static;
  /// List filter; its JSON form is the param of list cache keys
  type Filter: Serialize + Clone + Default + Send + Sync + 'static;
  type Create: Send + 'static;
  type Update: Send + 'static;

  async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Entity>, AdapterError>;

  async fn get_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>, AdapterError>;

  async fn create(&self, input: Self::Create) -> Result<Self::Entity, AdapterError>;

  async fn update(&self, id: &Self::Id, patch: Self::Update) -> Result<Self::Entity, AdapterError>;

  async fn delete(&self, id: &Self::Id) -> Result<(), AdapterError>;
}
