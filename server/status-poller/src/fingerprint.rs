//! Change-detection fingerprint for status events.

use serde::{Deserialize, Serialize};

use crate::types::Event;

/// `"{status}:{newest update id}"`. Equal fingerprints mean the event has not
/// changed in a way worth notifying about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Compute the fingerprint from the status and the newest update id only.
/// `updated_at` and every other field are deliberately ignored.
pub fn compute(event: &Event) -> Fingerprint {
  let latest = event.latest_update().map(|u| u.id.as_str()).unwrap_or("");
  Fingerprint(format!("{}:{}", event.status, latest))
}
