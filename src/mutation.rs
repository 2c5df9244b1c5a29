//! Mutation coordinator and invalidation rules.
//!
//! A mutation runs its adapter call first. Only when the backend confirms it
//! are the resource's invalidation rules resolved into key patterns and
//! applied to the store; a rejected mutation leaves the cache untouched.
//!
//! Mutations are not serialized against each other. Two in-flight mutations on
//! the same resource invalidate in the order their calls settle.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AdapterError, MutationError};
use crate::key::{canonicalize, CacheKey, KeyPattern, Operation};
use crate::store::CacheStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
  Create,
  Update,
  Delete,
}

impl MutationKind {
  pub const ALL: [MutationKind; 3] = [Self::Create, Self::Update, Self::Delete];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Create => "create",
      Self::Update => "update",
      Self::Delete => "delete",
    }
  }
}

impl fmt::Display for MutationKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Which params of the target keys to invalidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetScope {
  /// Every key of the target operation
  AnyParams,
  /// Only the key whose params equal the mutated record's id. Resolves to
  /// nothing when the mutation has no id (a create).
  MutatedId,
}

/// One edge of the invalidation graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationTarget {
  pub resource: String,
  /// `None` targets every operation of the resource
  pub operation: Option<Operation>,
  pub scope: TargetScope,
}

impl InvalidationTarget {
  /// Every list of `resource`.
  pub fn lists(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      operation: Some(Operation::List),
      scope: TargetScope::AnyParams,
    }
  }

  /// Every detail entry of `resource`.
  pub fn details(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      operation: Some(Operation::Detail),
      scope: TargetScope::AnyParams,
    }
  }

  /// The detail entry of the record being mutated.
  pub fn mutated_detail(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      operation: Some(Operation::Detail),
      scope: TargetScope::MutatedId,
    }
  }

  /// Every cached read of `resource`.
  pub fn everything(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      operation: None,
      scope: TargetScope::AnyParams,
    }
  }

  fn resolve(&self, id: Option<&Value>) -> Option<KeyPattern> {
    let params = match (&self.scope, id) {
      (TargetScope::AnyParams, _) => None,
      (TargetScope::MutatedId, Some(id)) => Some(id.clone()),
      (TargetScope::MutatedId, None) => return None,
    };
    Some(KeyPattern {
      resource: self.resource.clone(),
      operation: self.operation.clone(),
      params,
    })
  }
}

/// Declarative map from mutation kind to the targets it makes stale.
///
/// Built once per resource and shared immutably afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationRules {
  rules: HashMap<MutationKind, Vec<InvalidationTarget>>,
}

impl InvalidationRules {
  pub fn new() -> Self {
    Self::default()
  }

  /// Rules every resource starts from: any write makes its lists stale, and
  /// update/delete also make the mutated record's detail stale.
  pub fn standard(resource: &str) -> Self {
    Self::new()
      .on_all(InvalidationTarget::lists(resource))
      .on(MutationKind::Update, InvalidationTarget::mutated_detail(resource))
      .on(MutationKind::Delete, InvalidationTarget::mutated_detail(resource))
  }

  pub fn on(mut self, kind: MutationKind, target: InvalidationTarget) -> Self {
    let targets = self.rules.entry(kind).or_default();
    if !targets.contains(&target) {
      targets.push(target);
    }
    self
  }

  pub fn on_all(self, target: InvalidationTarget) -> Self {
    MutationKind::ALL
      .into_iter()
      .fold(self, |rules, kind| rules.on(kind, target.clone()))
  }

  pub fn targets(&self, kind: MutationKind) -> &[InvalidationTarget] {
    self.rules.get(&kind).map(Vec::as_slice).unwrap_or_default()
  }

  /// Key patterns to invalidate for a `kind` mutation of the record `id`.
  pub fn resolve(&self, kind: MutationKind, id: Option<&Value>) -> Vec<KeyPattern> {
    self
      .targets(kind)
      .iter()
      .filter_map(|target| target.resolve(id))
      .collect()
  }
}

/// Canonical JSON form of a record id, matching how detail keys store it.
pub fn id_value<I: Serialize + ?Sized>(id: &I) -> Option<Value> {
  serde_json::to_value(id).ok().and_then(canonicalize)
}

/// Runs mutations and applies invalidation on success.
#[derive(Clone)]
pub struct MutationCoordinator {
  store: Arc<CacheStore>,
}

impl MutationCoordinator {
  pub fn new(store: Arc<CacheStore>) -> Self {
    Self { store }
  }

  /// Run `call` and, if it succeeds, invalidate what `rules` declare for
  /// `(resource, kind)`. `id` is the mutated record's id, when known.
  ///
  /// Never retries; the adapter's error comes back unchanged inside the
  /// [`MutationError`].
  pub async fn mutate<R, Fut>(
    &self,
    resource: &str,
    kind: MutationKind,
    id: Option<Value>,
    call: Fut,
    rules: &InvalidationRules,
  ) -> Result<R, MutationError>
  where
    Fut: Future<Output = Result<R, AdapterError>>,
  {
    let result = call.await;

    match result {
      Ok(value) => {
        let invalidated = self.apply(rules.resolve(kind, id.as_ref()));
        info!(resource, %kind, invalidated = invalidated.len(), "mutation applied");
        Ok(value)
      }
      Err(source) => {
        warn!(resource, %kind, error = %source, "mutation rejected");
        Err(MutationError {
          resource: resource.to_string(),
          kind,
          source,
        })
      }
    }
  }

  fn apply(&self, patterns: Vec<KeyPattern>) -> Vec<CacheKey> {
    patterns
      .iter()
      .flat_map(|pattern| self.store.invalidate(pattern))
      .collect()
  }
}
