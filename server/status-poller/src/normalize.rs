//! Normalize raw status API payloads into canonical internal Event models.
//!
//! Normalization never fails: missing or null fields take defaults. Only a
//! batch element with the wrong shape (not an object, non-string fields) is
//! dropped.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::types::*;

const UNKNOWN_NAME: &str = "Unknown Event";
const UNKNOWN: &str = "unknown";

/// Convert one raw payload into an Event of the declared kind.
pub fn normalize(raw: &RawEvent, kind: EventKind) -> Event {
  // Maintenances normally carry their history under `incident_updates` too.
  let raw_updates = match kind {
    EventKind::Incident => raw.incident_updates.as_deref(),
    EventKind::Maintenance => raw
      .scheduled_maintenance_updates
      .as_deref()
      .or(raw.incident_updates.as_deref()),
  }
  .unwrap_or_default();

  let updates = raw_updates
    .iter()
    .map(|u| Update {
      id: text(&u.id, ""),
      status: text(&u.status, ""),
      body: text(&u.body, ""),
      created_at: text(&u.created_at, ""),
    })
    .collect();

  let components = raw
    .components
    .as_deref()
    .unwrap_or_default()
    .iter()
    .map(|c| Component {
      id: text(&c.id, ""),
      name: text(&c.name, ""),
      status: text(&c.status, ""),
    })
    .collect();

  Event {
    id: text(&raw.id, ""),
    name: text(&raw.name, UNKNOWN_NAME),
    status: text(&raw.status, UNKNOWN),
    impact: text(&raw.impact, UNKNOWN),
    shortlink: text(&raw.shortlink, ""),
    created_at: text(&raw.created_at, ""),
    updated_at: text(&raw.updated_at, ""),
    updates,
    components,
    kind,
    scheduled_for: raw.scheduled_for.clone(),
    scheduled_until: raw.scheduled_until.clone(),
  }
}

/// Extract `body[key]` as a list of events. A missing key yields an empty list;
/// elements that do not deserialize are skipped with a warning.
pub fn parse_batch(body: &Value, key: &str, kind: EventKind) -> Vec<Event> {
  let Some(items) = body.get(key).and_then(Value::as_array) else {
    return Vec::new();
  };

  items
    .iter()
    .filter_map(|item| match RawEvent::deserialize(item) {
      Ok(raw) => Some(normalize(&raw, kind)),
      Err(e) => {
        warn!(kind = kind.as_str(), error = %e, "skipping malformed event payload");
        None
      }
    })
    .collect()
}

fn text(value: &Option<String>, default: &str) -> String {
  value.clone().unwrap_or_else(|| default.to_string())
}
