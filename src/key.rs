//! Query key registry.
//!
//! A [`CacheKey`] is the tuple `[resource, operation, params?]`. Params are
//! serialized to JSON and canonicalized (object keys sorted, `null` members
//! dropped) so that two keys built from equal values compare equal no matter
//! how the values were assembled.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::InvalidKeyError;

/// The kind of read a key caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
  /// A filtered collection
  List,
  /// A single record by id
  Detail,
  /// Any other read a resource exposes (e.g. "active", "summary")
  Named(Cow<'static, str>),
}

impl Operation {
  pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
    Self::Named(name.into())
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::List => "list",
      Self::Detail => "detail",
      Self::Named(name) => name,
    }
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

struct KeyInner {
  resource: String,
  operation: Operation,
  params: Option<Value>,
  /// Serialized `params`, the basis for equality and hashing
  canonical: String,
}

/// Canonical identifier of one cached query result. Immutable and cheap to clone.
#[derive(Clone)]
pub struct CacheKey(Arc<KeyInner>);

impl CacheKey {
  /// Key without parameters.
  pub fn new(resource: impl Into<String>, operation: Operation) -> Self {
    Self(Arc::new(KeyInner {
      resource: resource.into(),
      operation,
      params: None,
      canonical: String::new(),
    }))
  }

  pub fn resource(&self) -> &str {
    &self.0.resource
  }

  pub fn operation(&self) -> &Operation {
    &self.0.operation
  }

  pub fn params(&self) -> Option<&Value> {
    self.0.params.as_ref()
  }
}

impl PartialEq for CacheKey {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
      || (self.0.resource == other.0.resource
        && self.0.operation == other.0.operation
        && self.0.canonical == other.0.canonical)
  }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.resource.hash(state);
    self.0.operation.hash(state);
    self.0.canonical.hash(state);
  }
}

impl fmt::Debug for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "CacheKey({self})")
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{:?}, {:?}", self.0.resource, self.0.operation.as_str())?;
    if !self.0.canonical.is_empty() {
      write!(f, ", {}", self.0.canonical)?;
    }
    f.write_str("]")
  }
}

/// Build the cache key for `(resource, operation, params)`.
///
/// Fails when `params` cannot be represented as JSON (for example a map with
/// non-string keys, a non-finite float, or a `Serialize` impl that errors).
/// Params that reduce to
/// nothing (`None`, `null`, an object whose members are all `null`) produce
/// the same key as no params at all.
pub fn build_key<P>(
  resource: &str,
  operation: Operation,
  params: Option<&P>,
) -> Result<CacheKey, InvalidKeyError>
where
  P: Serialize + ?Sized,
{
  let params = match params {
    Some(p) => {
      let invalid = |reason: String| InvalidKeyError {
        resource: resource.to_string(),
        operation: operation.as_str().to_string(),
        reason,
      };
      let value = serde_json::to_value(p).map_err(|e| invalid(e.to_string()))?;
      if contains_non_finite(p) {
        return Err(invalid("params contain a non-finite number".to_string()));
      }
      canonicalize(value)
    }
    None => None,
  };

  let canonical = match &params {
    Some(value) => value.to_string(),
    None => String::new(),
  };

  Ok(CacheKey(Arc::new(KeyInner {
    resource: resource.to_string(),
    operation,
    params,
    canonical,
  })))
}

// serde_json writes NaN and infinities as `null`, which would then be stripped;
// serde_yaml keeps them as numbers.
fn contains_non_finite<P: Serialize + ?Sized>(params: &P) -> bool {
  fn walk(value: &serde_yaml::Value) -> bool {
    use serde_yaml::Value as Yaml;
    match value {
      Yaml::Number(n) => n.is_nan() || n.is_infinite(),
      Yaml::Sequence(items) => items.iter().any(walk),
      Yaml::Mapping(map) => map.iter().any(|(k, v)| walk(k) || walk(v)),
      Yaml::Tagged(tagged) => walk(&tagged.value),
      _ => false,
    }
  }
  serde_yaml::to_value(params).is_ok_and(|v| walk(&v))
}

/// Canonical JSON form of `params`, or `None` when it carries nothing.
pub(crate) fn canonicalize(value: Value) -> Option<Value> {
  match strip_nulls(value) {
    Value::Null => None,
    Value::Object(map) if map.is_empty() => None,
    other => Some(other),
  }
}

fn strip_nulls(value: Value) -> Value {
  match value {
    Value::Object(map) => {
      // serde_json's default Map is ordered by key, which gives us sorting for free
      let cleaned: Map<String, Value> = map
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, strip_nulls(v)))
        .collect();
      Value::Object(cleaned)
    }
    Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
    other => other,
  }
}

/// Selects cache keys for invalidation or removal.
///
/// `operation: None` matches every operation of the resource; `params: None`
/// matches any params.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPattern {
  pub resource: String,
  pub operation: Option<Operation>,
  pub params: Option<Value>,
}

impl KeyPattern {
  /// Every key of a resource.
  pub fn resource(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      operation: None,
      params: None,
    }
  }

  /// Every key of one operation of a resource, whatever the params.
  pub fn operation(resource: impl Into<String>, operation: Operation) -> Self {
    Self {
      resource: resource.into(),
      operation: Some(operation),
      params: None,
    }
  }

  /// Exactly one key.
  pub fn exact(key: &CacheKey) -> Self {
    Self {
      resource: key.resource().to_string(),
      operation: Some(key.operation().clone()),
      params: Some(key.params().cloned().unwrap_or(Value::Null)),
    }
  }

  pub fn matches(&self, key: &CacheKey) -> bool {
    if self.resource != key.resource() {
      return false;
    }
    if let Some(op) = &self.operation {
      if op != key.operation() {
        return false;
      }
    }
    match &self.params {
      None => true,
      Some(Value::Null) => key.params().is_none(),
      Some(expected) => key.params() == Some(expected),
    }
  }
}

impl fmt::Display for KeyPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let op = self.operation.as_ref().map(Operation::as_str).unwrap_or("*");
    match &self.params {
      Some(p) => write!(f, "[{:?}, {:?}, {}]", self.resource, op, p),
      None => write!(f, "[{:?}, {:?}, *]", self.resource, op),
    }
  }
}
