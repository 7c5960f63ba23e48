//! Status API client. Transport failures degrade to an empty batch.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::normalize;
use crate::types::{Event, EventKind};

/// The three feeds a Statuspage v2 API exposes for our purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  UnresolvedIncidents,
  ActiveMaintenances,
  UpcomingMaintenances,
}

impl Category {
  pub fn path(self) -> &'static str {
    match self {
      Self::UnresolvedIncidents => "incidents/unresolved.json",
      Self::ActiveMaintenances => "scheduled-maintenances/active.json",
      Self::UpcomingMaintenances => "scheduled-maintenances/upcoming.json",
    }
  }

  /// Top-level key holding the event array in the response body.
  pub fn key(self) -> &'static str {
    match self {
      Self::UnresolvedIncidents => "incidents",
      Self::ActiveMaintenances | Self::UpcomingMaintenances => "scheduled_maintenances",
    }
  }

  pub fn kind(self) -> EventKind {
    match self {
      Self::UnresolvedIncidents => EventKind::Incident,
      Self::ActiveMaintenances | Self::UpcomingMaintenances => EventKind::Maintenance,
    }
  }
}

/// Source of status events. Must not fail: errors become an empty batch.
#[async_trait]
pub trait StatusSource: Send + Sync {
  async fn fetch(&self, category: Category) -> Vec<Event>;
}

/// Fetch every category, in fixed order: incidents, active maintenances,
/// then upcoming maintenances when requested. Requests run concurrently.
pub async fn fetch_all<S>(source: &S, include_upcoming: bool) -> Vec<Event>
where
  S: StatusSource + ?Sized,
{
  let (mut events, active, upcoming) = tokio::join!(
    source.fetch(Category::UnresolvedIncidents),
    source.fetch(Category::ActiveMaintenances),
    async {
      if include_upcoming {
        source.fetch(Category::UpcomingMaintenances).await
      } else {
        Vec::new()
      }
    },
  );
  events.extend(active);
  events.extend(upcoming);
  events
}

/// HTTP client for a Statuspage v2 API.
#[derive(Debug, Clone)]
pub struct StatusPageClient {
  http: reqwest::Client,
  base_url: String,
}

impl StatusPageClient {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }

  pub fn endpoint(&self, category: Category) -> String {
    format!("{}/{}", self.base_url, category.path())
  }

  async fn try_fetch(&self, category: Category) -> Result<Vec<Event>, FetchError> {
    let url = self.endpoint(category);
    let response = self.http.get(&url).send().await?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        url,
        status: status.as_u16(),
      });
    }

    let bytes = response.bytes().await?;
    let body: serde_json::Value = serde_json::from_slice(&bytes)?;
    let events = normalize::parse_batch(&body, category.key(), category.kind());
    debug!(url = %url, count = events.len(), "fetched events");
    Ok(events)
  }
}

#[async_trait]
impl StatusSource for StatusPageClient {
  async fn fetch(&self, category: Category) -> Vec<Event> {
    match self.try_fetch(category).await {
      Ok(events) => events,
      Err(e) => {
        warn!(url = %self.endpoint(category), error = %e, "fetch failed, treating as empty");
        Vec::new()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  struct CannedSource {
    calls: Mutex<Vec<Category>>,
  }

  impl CannedSource {
    fn new() -> Self {
      Self {
        calls: Mutex::new(Vec::new()),
      }
    }
  }

  fn event(id: &str, kind: EventKind) -> Event {
    let raw: crate::types::RawEvent = serde_json::from_value(serde_json::json!({ "id": id })).unwrap();
    normalize::normalize(&raw, kind)
  }

  #[async_trait]
  impl StatusSource for CannedSource {
    async fn fetch(&self, category: Category) -> Vec<Event> {
      self.calls.lock().unwrap().push(category);
      match category {
        Category::UnresolvedIncidents => vec![event("i1", EventKind::Incident), event("i2", EventKind::Incident)],
        Category::ActiveMaintenances => vec![event("m1", EventKind::Maintenance)],
        Category::UpcomingMaintenances => vec![event("m2", EventKind::Maintenance)],
      }
    }
  }

  #[test]
  fn endpoints_follow_statuspage_layout() {
    let client = StatusPageClient::new("https://status.example.com/api/v2/", Duration::from_secs(5)).unwrap();
    assert_eq!(
      client.endpoint(Category::UnresolvedIncidents),
      "https://status.example.com/api/v2/incidents/unresolved.json"
    );
    assert_eq!(
      client.endpoint(Category::ActiveMaintenances),
      "https://status.example.com/api/v2/scheduled-maintenances/active.json"
    );
    assert_eq!(
      client.endpoint(Category::UpcomingMaintenances),
      "https://status.example.com/api/v2/scheduled-maintenances/upcoming.json"
    );
  }

  #[test]
  fn category_keys_and_kinds() {
    assert_eq!(Category::UnresolvedIncidents.key(), "incidents");
    assert_eq!(Category::UpcomingMaintenances.key(), "scheduled_maintenances");
    assert_eq!(Category::ActiveMaintenances.kind(), EventKind::Maintenance);
    assert_eq!(Category::UnresolvedIncidents.kind(), EventKind::Incident);
  }

  #[tokio::test]
  async fn fetch_all_keeps_category_order() {
    let source = CannedSource::new();
    let ids: Vec<String> = fetch_all(&source, true).await.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["i1", "i2", "m1", "m2"]);
  }

  #[tokio::test]
  async fn fetch_all_can_skip_upcoming() {
    let source = CannedSource::new();
    let ids: Vec<String> = fetch_all(&source, false).await.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["i1", "i2", "m1"]);
    assert!(!source.calls.lock().unwrap().contains(&Category::UpcomingMaintenances));
  }

  #[tokio::test]
  async fn unreachable_api_yields_empty_batch() {
    // Nothing listens on the discard port locally; the connection is refused.
    let client = StatusPageClient::new("http://127.0.0.1:9/api/v2", Duration::from_secs(2)).unwrap();
    assert!(client.fetch(Category::UnresolvedIncidents).await.is_empty());
  }
}
