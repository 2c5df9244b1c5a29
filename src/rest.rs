//! PostgREST-style HTTP adapter.
//!
//! Each resource maps to one table under `/rest/v1/`. Filters become
//! `column=eq.value` query pairs, writes ask for the affected rows back with
//! `Prefer: return=representation`.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::adapter::ResourceAdapter;
use crate::error::AdapterError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection to the backend, shared by every table adapter.
#[derive(Clone)]
pub struct RestBackend {
  client: reqwest::Client,
  base_url: Url,
  api_key: String,
}

impl RestBackend {
  pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, AdapterError> {
    let mut base_url =
      Url::parse(base_url).map_err(|e| AdapterError::Transport(format!("invalid backend url {base_url}: {e}")))?;
    // Url::join drops the last segment unless the path ends in a slash
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let client = reqwest::Client::builder()
      .timeout(DEFAULT_TIMEOUT)
      .build()
      .map_err(|e| AdapterError::Transport(format!("failed to build http client: {e}")))?;

    Ok(Self {
      client,
      base_url,
      api_key: api_key.into(),
    })
  }

  /// Adapter for `table`, optionally ordered by `order` (e.g. `created_at.desc`).
  pub fn table<E, F, C, U>(&self, table: &str, order: Option<&str>) -> RestAdapter<E, F, C, U> {
    RestAdapter {
      backend: self.clone(),
      table: table.to_string(),
      order: order.map(String::from),
      _marker: PhantomData,
    }
  }

  fn table_url(&self, table: &str, query: &[(String, String)]) -> Result<Url, AdapterError> {
    let mut url = self
      .base_url
      .join(&format!("rest/v1/{table}"))
      .map_err(|e| AdapterError::Transport(format!("invalid table url for {table}: {e}")))?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    self
      .client
      .request(method, url)
      .header("apikey", &self.api_key)
      .bearer_auth(&self.api_key)
  }
}

/// Table adapter for entity `E`, filter `F`, create input `C`, patch `U`.
pub struct RestAdapter<E, F, C, U> {
  backend: RestBackend,
  table: String,
  order: Option<String>,
  _marker: PhantomData<fn() -> (E, F, C, U)>,
}

impl<E, F, C, U> RestAdapter<E, F, C, U> {
  pub fn table(&self) -> &str {
    &self.table
  }
}

#[derive(Deserialize)]
struct PostgrestError {
  message: String,
  #[serde(default)]
  details: Option<String>,
}

/// Human-readable message from an error body.
fn error_message(body: &str) -> String {
  match serde_json::from_str::<PostgrestError>(body) {
    Ok(PostgrestError {
      message,
      details: Some(details),
    }) if !details.is_empty() => format!("{message} ({details})"),
    Ok(err) => err.message,
    Err(_) => body.trim().to_string(),
  }
}

/// Render a filter as PostgREST query pairs. `null` members are skipped,
/// arrays become `in.(..)` lists.
pub fn filter_params<F: Serialize>(filter: &F) -> Result<Vec<(String, String)>, AdapterError> {
  let value = serde_json::to_value(filter).map_err(|e| AdapterError::Decode(e.to_string()))?;
  let map = match value {
    Value::Object(map) => map,
    Value::Null => return Ok(Vec::new()),
    other => {
      return Err(AdapterError::Decode(format!(
        "filter must serialize to an object, got {other}"
      )))
    }
  };

  Ok(
    map
      .into_iter()
      .filter(|(_, v)| !v.is_null())
      .map(|(column, v)| {
        let condition = match v {
          Value::Array(items) => {
            let items: Vec<String> = items.iter().map(scalar).collect();
            format!("in.({})", items.join(","))
          }
          other => format!("eq.{}", scalar(&other)),
        };
        (column, condition)
      })
      .collect(),
  )
}

fn scalar(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn id_param(id: &str) -> (String, String) {
  ("id".to_string(), format!("eq.{id}"))
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AdapterError> {
  let response = request
    .send()
    .await
    .map_err(|e| AdapterError::Transport(e.to_string()))?;

  let status = response.status();
  if !status.is_success() {
    let body = response.text().await.unwrap_or_default();
    return Err(AdapterError::status(status.as_u16(), error_message(&body)));
  }

  response
    .json::<T>()
    .await
    .map_err(|e| AdapterError::Decode(e.to_string()))
}

#[async_trait]
impl<E, F, C, U> ResourceAdapter for RestAdapter<E, F, C, U>
where
  E: DeserializeOwned + Clone + Send + Sync + 'static,
  F: Serialize + Clone + Default + Send + Sync + 'static,
  C: Serialize + Send + Sync + 'static,
  U: Serialize + Send + Sync + 'static,
{
  type Entity = E;
  type Id = String;
  type Filter = F;
  type Create = C;
  type Update = U;

  async fn list(&self, filter: &F) -> Result<Vec<E>, AdapterError> {
    let mut query = vec![("select".to_string(), "*".to_string())];
    query.extend(filter_params(filter)?);
    if let Some(order) = &self.order {
      query.push(("order".to_string(), order.clone()));
    }
    let url = self.backend.table_url(&self.table, &query)?;
    send(self.backend.request(Method::GET, url)).await
  }

  async fn get_by_id(&self, id: &String) -> Result<Option<E>, AdapterError> {
    let query = [("select".to_string(), "*".to_string()), id_param(id)];
    let url = self.backend.table_url(&self.table, &query)?;
    let rows: Vec<E> = send(self.backend.request(Method::GET, url)).await?;
    Ok(rows.into_iter().next())
  }

  async fn create(&self, input: C) -> Result<E, AdapterError> {
    let url = self.backend.table_url(&self.table, &[])?;
    let request = self
      .backend
      .request(Method::POST, url)
      .header("Prefer", "return=representation")
      .json(&input);
    let rows: Vec<E> = send(request).await?;
    rows
      .into_iter()
      .next()
      .ok_or_else(|| AdapterError::Decode(format!("{} insert returned no rows", self.table)))
  }

  async fn update(&self, id: &String, patch: U) -> Result<E, AdapterError> {
    let url = self.backend.table_url(&self.table, &[id_param(id)])?;
    let request = self
      .backend
      .request(Method::PATCH, url)
      .header("Prefer", "return=representation")
      .json(&patch);
    let rows: Vec<E> = send(request).await?;
    rows
      .into_iter()
      .next()
      .ok_or_else(|| AdapterError::status(404, format!("{} {id} not found", self.table)))
  }

  async fn delete(&self, id: &String) -> Result<(), AdapterError> {
    let url = self.backend.table_url(&self.table, &[id_param(id)])?;
    let response = self
      .backend
      .request(Method::DELETE, url)
      .send()
      .await
      .map_err(|e| AdapterError::Transport(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
      Ok(())
    } else {
      let body = response.text().await.unwrap_or_default();
      Err(AdapterError::status(status.as_u16(), error_message(&body)))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[derive(Serialize)]
  struct SaleFilter {
    status: Option<String>,
    shift_id: Option<String>,
    tank_id: Vec<String>,
    min_liters: Option<f64>,
  }

  #[test]
  fn test_filter_params() {
    let filter = SaleFilter {
      status: Some("paid".into()),
      shift_id: None,
      tank_id: vec!["T1".into(), "T2".into()],
      min_liters: Some(10.5),
    };
    let params = filter_params(&filter).unwrap();
    assert_eq!(
      params,
      vec![
        ("min_liters".to_string(), "eq.10.5".to_string()),
        ("status".to_string(), "eq.paid".to_string()),
        ("tank_id".to_string(), "in.(T1,T2)".to_string()),
      ]
    );

    assert!(filter_params(&()).unwrap().is_empty());
    assert!(filter_params(&json!(3)).is_err());
  }

  #[test]
  fn test_table_url() {
    let backend = RestBackend::new("https://station.example.co", "anon").unwrap();
    let url = backend
      .table_url("fuel_sales", &[("select".into(), "*".into()), id_param("S1")])
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://station.example.co/rest/v1/fuel_sales?select=*&id=eq.S1"
    );

    let nested = RestBackend::new("https://example.co/api", "anon").unwrap();
    let url = nested.table_url("tanks", &[]).unwrap();
    assert_eq!(url.as_str(), "https://example.co/api/rest/v1/tanks");
  }

  #[test]
  fn test_invalid_base_url() {
    assert!(matches!(
      RestBackend::new("not a url", "anon"),
      Err(AdapterError::Transport(_))
    ));
  }

  #[test]
  fn test_error_message() {
    let body = r#"{"code":"23514","message":"new row violates check constraint","details":"capacity exceeded"}"#;
    assert_eq!(
      error_message(body),
      "new row violates check constraint (capacity exceeded)"
    );
    assert_eq!(error_message(r#"{"message":"denied"}"#), "denied");
    assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
  }
}
