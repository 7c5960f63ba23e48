//! Run configuration and filter configuration loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::types::Impact;

pub const DEFAULT_API_BASE_URL: &str = "https://status.epicgames.com/api/v2";
pub const DEFAULT_STATE_FILE: &str = "seen_incidents.json";
pub const DEFAULT_FILTER_FILE: &str = "config.json";
pub const DEFAULT_MAX_TRACKED: usize = 100;

/// Env var naming a filter config file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";
/// Env var with a comma-separated list of services to watch.
pub const WATCH_SERVICES_ENV: &str = "WATCH_SERVICES";

/// Tunables for one poll run. Built once by the binary, then passed down.
#[derive(Debug, Clone)]
pub struct PollerConfig {
  /// Statuspage v2 API root, e.g. `https://status.example.com/api/v2`.
  pub api_base_url: String,
  /// Where tracked state is persisted between runs.
  pub state_path: PathBuf,
  /// Ceiling on tracked event ids after cleanup.
  pub max_tracked: usize,
  /// Also fetch upcoming (not yet started) maintenances.
  pub include_upcoming: bool,
  /// Per-request timeout for status API and Telegram calls.
  pub http_timeout: Duration,
  /// Mark events seen even when the notification could not be delivered.
  pub force_commit: bool,
  pub telegram: TelegramConfig,
}

impl Default for PollerConfig {
  fn default() -> Self {
    Self {
      api_base_url: DEFAULT_API_BASE_URL.to_string(),
      state_path: PathBuf::from(DEFAULT_STATE_FILE),
      max_tracked: DEFAULT_MAX_TRACKED,
      include_upcoming: true,
      http_timeout: Duration::from_secs(30),
      force_commit: false,
      telegram: TelegramConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
  pub token: Option<String>,
  pub chat_id: Option<String>,
}

impl TelegramConfig {
  /// `(token, chat_id)` when both are set and non-blank.
  pub fn credentials(&self) -> Option<(&str, &str)> {
    fn present(v: &Option<String>) -> Option<&str> {
      v.as_deref().filter(|s| !s.trim().is_empty())
    }
    Some((present(&self.token)?, present(&self.chat_id)?))
  }

  pub fn is_configured(&self) -> bool {
    self.credentials().is_some()
  }
}

// ---------------------------------------------------------------------------
// Filter configuration
// ---------------------------------------------------------------------------

/// Which event kinds to surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTypes {
  Incidents,
  Maintenance,
  #[default]
  All,
}

/// Declarative event filter. The default lets everything through.
///
/// A key set to `null` reads the same as a missing key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
  /// Services to watch; empty means all.
  #[serde(deserialize_with = "null_as_default")]
  pub services: Vec<String>,
  /// Incidents below this impact are dropped. Maintenances are exempt.
  #[serde(deserialize_with = "null_as_default")]
  pub min_impact: Impact,
  #[serde(deserialize_with = "null_as_default")]
  pub event_types: EventTypes,
  /// Matching events bypass every check except exclusion.
  #[serde(deserialize_with = "null_as_default")]
  pub always_include_keywords: Vec<String>,
  #[serde(deserialize_with = "null_as_default")]
  pub exclude_keywords: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl FilterConfig {
  pub fn for_services<I, S>(services: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      services: services.into_iter().map(Into::into).collect(),
      ..Self::default()
    }
  }

  /// True when any rule could drop an event.
  pub fn is_restrictive(&self) -> bool {
    !self.services.is_empty()
      || self.min_impact != Impact::None
      || self.event_types != EventTypes::All
      || !self.exclude_keywords.is_empty()
  }
}

/// Read and parse a filter config file.
pub fn read_filter_file(path: &Path) -> Result<FilterConfig, ConfigError> {
  if !path.exists() {
    return Err(ConfigError::NotFound(path.to_path_buf()));
  }
  let contents = std::fs::read_to_string(path)?;
  let config = serde_json::from_str(&contents)?;
  Ok(config)
}

/// Load the filter config using the process environment.
///
/// Priority: explicit path, `CONFIG_FILE`, `./config.json` (if present),
/// `WATCH_SERVICES`, unrestricted default.
pub fn load_filter_config(explicit: Option<&Path>) -> FilterConfig {
  resolve_filter_config(explicit, Path::new(DEFAULT_FILTER_FILE), |key| {
    std::env::var(key).ok()
  })
}

/// Same as [`load_filter_config`] with the default path and env lookup injected.
pub fn resolve_filter_config<F>(explicit: Option<&Path>, default_path: &Path, env: F) -> FilterConfig
where
  F: Fn(&str) -> Option<String>,
{
  let path = explicit
    .map(Path::to_path_buf)
    .or_else(|| env(CONFIG_FILE_ENV).filter(|p| !p.is_empty()).map(PathBuf::from))
    .or_else(|| default_path.exists().then(|| default_path.to_path_buf()));

  if let Some(path) = path {
    return match read_filter_file(&path) {
      Ok(config) => {
        debug!(path = %path.display(), "loaded filter config");
        config
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "invalid filter config, using defaults");
        FilterConfig::default()
      }
    };
  }

  match env(WATCH_SERVICES_ENV) {
    Some(raw) => FilterConfig::for_services(parse_service_list(&raw)),
    None => FilterConfig::default(),
  }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_service_list(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}
