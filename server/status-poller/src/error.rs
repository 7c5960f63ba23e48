//! Structured error types for the poller.
//!
//! Only `StateError` can end a run early (state could not be persisted).
//! Fetch, notify and config errors are converted into a degraded outcome at
//! the collaborator boundary and logged.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("http: {0}")]
  Http(#[from] reqwest::Error),

  #[error("unexpected status {status} from {url}")]
  Status { url: String, status: u16 },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("http: {0}")]
  Http(#[from] reqwest::Error),

  #[error("telegram rejected message with status {0}")]
  Status(u16),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StateError {
  #[error("state io at {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("state json: {0}")]
  Json(#[from] serde_json::Error),
}

impl StateError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}

#[derive(Debug, Error)]
pub enum PollerError {
  #[error(transparent)]
  State(#[from] StateError),
}
