use color_eyre::{eyre::eyre, Result};
use fuelsync::QueryOptions;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  /// Default station filter for station-scoped lists
  pub station_id: Option<String>,
  #[serde(default)]
  pub cache: CacheSettings,
  /// Per-resource overrides, keyed by resource name (e.g. "fuel-prices")
  #[serde(default)]
  pub resources: BTreeMap<String, CacheOverrides>,
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  pub url: String,
}

/// Cache timings in milliseconds, as written in the file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
  pub stale_time_ms: u64,
  pub retry_count: u32,
  pub retry_delay_ms: u64,
  pub gc_time_ms: u64,
}

impl Default for CacheSettings {
  fn default() -> Self {
    let defaults = QueryOptions::default();
    Self {
      stale_time_ms: defaults.stale_time.as_millis() as u64,
      retry_count: defaults.retry_count,
      retry_delay_ms: defaults.retry_delay.as_millis() as u64,
      gc_time_ms: defaults.gc_time.as_millis() as u64,
    }
  }
}

impl CacheSettings {
  pub fn to_options(&self) -> QueryOptions {
    QueryOptions {
      stale_time: Duration::from_millis(self.stale_time_ms),
      retry_count: self.retry_count,
      retry_delay: Duration::from_millis(self.retry_delay_ms),
      gc_time: Duration::from_millis(self.gc_time_ms),
    }
  }

  fn merged(&self, overrides: &CacheOverrides) -> Self {
    Self {
      stale_time_ms: overrides.stale_time_ms.unwrap_or(self.stale_time_ms),
      retry_count: overrides.retry_count.unwrap_or(self.retry_count),
      retry_delay_ms: overrides.retry_delay_ms.unwrap_or(self.retry_delay_ms),
      gc_time_ms: overrides.gc_time_ms.unwrap_or(self.gc_time_ms),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheOverrides {
  pub stale_time_ms: Option<u64>,
  pub retry_count: Option<u32>,
  pub retry_delay_ms: Option<u64>,
  pub gc_time_ms: Option<u64>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fuelsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fuelsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/fuelsync/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fuelsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fuelsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Query options for `resource`: the `cache` section with that resource's
  /// overrides applied field by field.
  pub fn options_for(&self, resource: &str) -> QueryOptions {
    match self.resources.get(resource) {
      Some(overrides) => self.cache.merged(overrides).to_options(),
      None => self.cache.to_options(),
    }
  }

  /// Get the backend API key from environment variables.
  ///
  /// Checks FUELSYNC_API_KEY first, then SUPABASE_ANON_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("FUELSYNC_API_KEY")
      .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
      .map_err(|_| {
        eyre!("Backend API key not found. Set FUELSYNC_API_KEY or SUPABASE_ANON_KEY environment variable.")
      })
  }
}
