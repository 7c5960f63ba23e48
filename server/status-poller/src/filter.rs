//! Event filter: keyword exclusion/inclusion, event type, impact threshold, services.

use crate::config::{EventTypes, FilterConfig};
use crate::types::{Event, EventKind, Impact};

/// Decide whether an event should be surfaced. First matching rule wins.
pub fn matches(event: &Event, config: &FilterConfig) -> bool {
  let text = event.search_text();

  if contains_any(&text, &config.exclude_keywords) {
    return false;
  }
  if contains_any(&text, &config.always_include_keywords) {
    return true;
  }

  match (config.event_types, event.kind) {
    (EventTypes::Incidents, EventKind::Maintenance) => return false,
    (EventTypes::Maintenance, EventKind::Incident) => return false,
    _ => {}
  }

  if event.is_incident() && config.min_impact > Impact::None && event.impact_level() < config.min_impact {
    return false;
  }

  if !config.services.is_empty() {
    return contains_any(&text, &config.services);
  }

  true
}

/// Keep the events that pass the filter, in their original order.
pub fn apply(events: Vec<Event>, config: &FilterConfig) -> Vec<Event> {
  events.into_iter().filter(|e| matches(e, config)).collect()
}

/// Case-insensitive substring match of any needle; `haystack` is already lowercase.
fn contains_any(haystack: &str, needles: &[String]) -> bool {
  needles
    .iter()
    .any(|needle| haystack.contains(&needle.to_lowercase()))
}
