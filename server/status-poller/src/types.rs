//! Core types for the poller (Statuspage JSON contract + internal models).

use serde::{Deserialize, Serialize};

use crate::fingerprint::{self, Fingerprint};

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the status API sends)
// ---------------------------------------------------------------------------

/// One incident or scheduled maintenance as returned by the status API.
/// Every field is optional; unknown fields are silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub impact: Option<String>,
  #[serde(default)]
  pub shortlink: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
  #[serde(default)]
  pub updated_at: Option<String>,
  #[serde(default)]
  pub incident_updates: Option<Vec<RawUpdate>>,
  #[serde(default)]
  pub scheduled_maintenance_updates: Option<Vec<RawUpdate>>,
  #[serde(default)]
  pub components: Option<Vec<RawComponent>>,
  #[serde(default)]
  pub scheduled_for: Option<String>,
  #[serde(default)]
  pub scheduled_until: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUpdate {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub body: Option<String>,
  #[serde(default)]
  pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawComponent {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Event kind + impact (normalized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  Incident,
  Maintenance,
}

impl EventKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Incident => "incident",
      Self::Maintenance => "maintenance",
    }
  }
}

/// Incident severity. Declaration order is the comparison order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
  #[default]
  None,
  Minor,
  Major,
  Critical,
}

impl Impact {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "none" => Some(Self::None),
      "minor" => Some(Self::Minor),
      "major" => Some(Self::Major),
      "critical" => Some(Self::Critical),
      _ => None,
    }
  }

  /// Like `from_str_loose`, but unknown values rank lowest.
  pub fn rank_of(s: &str) -> Self {
    Self::from_str_loose(s).unwrap_or(Self::None)
  }
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

/// One revision of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
  pub id: String,
  pub status: String,
  pub body: String,
  pub created_at: String,
}

/// An affected service or sub-system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
  pub id: String,
  pub name: String,
  pub status: String,
}

/// Canonical event after normalization. Built fresh on every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
  pub id: String,
  pub name: String,
  pub status: String,
  /// Raw impact text; only meaningful for incidents.
  pub impact: String,
  pub shortlink: String,
  pub created_at: String,
  pub updated_at: String,
  /// Newest first, as ordered by the API.
  pub updates: Vec<Update>,
  pub components: Vec<Component>,
  pub kind: EventKind,
  pub scheduled_for: Option<String>,
  pub scheduled_until: Option<String>,
}

impl Event {
  pub fn fingerprint(&self) -> Fingerprint {
    fingerprint::compute(self)
  }

  pub fn latest_update(&self) -> Option<&Update> {
    self.updates.first()
  }

  pub fn component_names(&self) -> Vec<&str> {
    self.components.iter().map(|c| c.name.as_str()).collect()
  }

  pub fn is_incident(&self) -> bool {
    self.kind == EventKind::Incident
  }

  pub fn is_maintenance(&self) -> bool {
    self.kind == EventKind::Maintenance
  }

  pub fn impact_level(&self) -> Impact {
    Impact::rank_of(&self.impact)
  }

  /// Lowercased `name` followed by component names, used for keyword matching.
  pub fn search_text(&self) -> String {
    let mut text = self.name.clone();
    for name in self.component_names() {
      text.push(' ');
      text.push_str(name);
    }
    text.to_lowercase()
  }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Per-run counters, logged at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
  pub fetched_incidents: usize,
  pub fetched_maintenances: usize,
  pub filtered_incidents: usize,
  pub filtered_maintenances: usize,
  pub new_notified: usize,
  pub updated_notified: usize,
  pub send_failures: usize,
  pub resolved: usize,
  pub evicted: usize,
  pub tracked: usize,
}
