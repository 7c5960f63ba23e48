//! Tracked state: which events were already notified, and at which fingerprint.
//!
//! `TrackedState` holds the in-memory logic (classification, upsert, bounded
//! eviction). `JsonFileState` adds persistence to a JSON file, replaced
//! atomically on save.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StateError;
use crate::fingerprint::Fingerprint;
use crate::types::Event;

/// Storage backend for tracked events. Any implementation is interchangeable.
pub trait StateBackend {
  /// The event id has never been recorded.
  fn is_new_event(&self, event: &Event) -> bool;

  /// The event id is recorded, but with a different fingerprint.
  fn is_updated_event(&self, event: &Event) -> bool;

  /// Record the event and its current fingerprint.
  fn mark_seen(&mut self, event: &Event);

  /// Report ids absent from `current_events`, then bound history to `max_tracked`.
  fn cleanup(&mut self, current_events: &[Event], max_tracked: usize) -> CleanupReport;

  /// Persist the current state.
  fn save(&mut self) -> Result<(), StateError>;

  fn tracked_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
  /// Tracked ids not present in the current feed. Informational only.
  pub resolved: usize,
  /// Ids dropped to stay within the size bound.
  pub evicted: usize,
}

// ---------------------------------------------------------------------------
// Insertion-ordered id set
// ---------------------------------------------------------------------------

/// Set of ids that remembers insertion order, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenIds {
  order: VecDeque<String>,
  members: HashSet<String>,
}

impl SeenIds {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.members.contains(id)
  }

  /// Append `id` unless present. Existing ids keep their position.
  pub fn insert(&mut self, id: &str) -> bool {
    if self.members.contains(id) {
      return false;
    }
    self.members.insert(id.to_string());
    self.order.push_back(id.to_string());
    true
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  /// Oldest first.
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.order.iter().map(String::as_str)
  }

  /// Drop the oldest ids until at most `max` remain. Returns the dropped ids.
  pub fn retain_newest(&mut self, max: usize) -> Vec<String> {
    let mut evicted = Vec::new();
    while self.order.len() > max {
      if let Some(oldest) = self.order.pop_front() {
        self.members.remove(&oldest);
        evicted.push(oldest);
      }
    }
    evicted
  }
}

impl<S: AsRef<str>> FromIterator<S> for SeenIds {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    let mut ids = Self::new();
    for id in iter {
      ids.insert(id.as_ref());
    }
    ids
  }
}

// ---------------------------------------------------------------------------
// In-memory tracked state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedState {
  seen_ids: SeenIds,
  fingerprints: HashMap<String, Fingerprint>,
}

impl TrackedState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build from persisted parts. Fingerprints without a seen id are dropped.
  pub fn from_parts<I, S>(seen_ids: I, fingerprints: HashMap<String, Fingerprint>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut state = Self {
      seen_ids: seen_ids.into_iter().collect(),
      fingerprints,
    };
    state.prune_orphans();
    state
  }

  pub fn is_new(&self, event: &Event) -> bool {
    !self.seen_ids.contains(&event.id)
  }

  pub fn is_updated(&self, event: &Event) -> bool {
    if !self.seen_ids.contains(&event.id) {
      return false;
    }
    self.fingerprints.get(&event.id) != Some(&event.fingerprint())
  }

  pub fn mark_seen(&mut self, event: &Event) {
    self.seen_ids.insert(&event.id);
    self.fingerprints.insert(event.id.clone(), event.fingerprint());
  }

  pub fn cleanup(&mut self, current_events: &[Event], max_tracked: usize) -> CleanupReport {
    let current: HashSet<&str> = current_events.iter().map(|e| e.id.as_str()).collect();
    let resolved = self.seen_ids.iter().filter(|id| !current.contains(id)).count();
    if resolved > 0 {
      info!(resolved, "tracked events no longer in the feed");
    }

    let evicted = self.seen_ids.retain_newest(max_tracked);
    if !evicted.is_empty() {
      debug!(evicted = evicted.len(), max_tracked, "evicted oldest tracked events");
    }
    self.prune_orphans();

    CleanupReport {
      resolved,
      evicted: evicted.len(),
    }
  }

  pub fn seen_ids(&self) -> &SeenIds {
    &self.seen_ids
  }

  pub fn fingerprint_of(&self, id: &str) -> Option<&Fingerprint> {
    self.fingerprints.get(id)
  }

  pub fn fingerprints(&self) -> &HashMap<String, Fingerprint> {
    &self.fingerprints
  }

  pub fn len(&self) -> usize {
    self.seen_ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.seen_ids.is_empty()
  }

  fn prune_orphans(&mut self) {
    let seen = &self.seen_ids;
    self.fingerprints.retain(|id, _| seen.contains(id));
  }
}

// ---------------------------------------------------------------------------
// JSON file backend
// ---------------------------------------------------------------------------

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
  #[serde(default)]
  seen_ids: Vec<String>,
  #[serde(default)]
  last_updates: BTreeMap<String, Fingerprint>,
  #[serde(default)]
  last_checked: Option<DateTime<Utc>>,
}

/// State persisted as pretty-printed JSON at `path`.
#[derive(Debug)]
pub struct JsonFileState {
  path: PathBuf,
  tracked: TrackedState,
  last_checked: Option<DateTime<Utc>>,
}

impl JsonFileState {
  /// Load state from `path`. A missing file starts empty; an unreadable or
  /// corrupt one is logged and also starts empty.
  pub fn load(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let persisted = match read_persisted(&path) {
      Ok(Some(p)) => p,
      Ok(None) => {
        debug!(path = %path.display(), "no state file, starting fresh");
        PersistedState::default()
      }
      Err(e) => {
        warn!(path = %path.display(), error = %e, "state file unreadable, starting fresh");
        PersistedState::default()
      }
    };

    if let Some(at) = persisted.last_checked {
      debug!(last_checked = %at.to_rfc3339(), "previous run");
    }

    Self {
      tracked: TrackedState::from_parts(persisted.seen_ids, persisted.last_updates.into_iter().collect()),
      last_checked: persisted.last_checked,
      path,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn tracked(&self) -> &TrackedState {
    &self.tracked
  }

  /// When the state was last saved, as recorded in the file.
  pub fn last_checked(&self) -> Option<DateTime<Utc>> {
    self.last_checked
  }
}

impl StateBackend for JsonFileState {
  fn is_new_event(&self, event: &Event) -> bool {
    self.tracked.is_new(event)
  }

  fn is_updated_event(&self, event: &Event) -> bool {
    self.tracked.is_updated(event)
  }

  fn mark_seen(&mut self, event: &Event) {
    self.tracked.mark_seen(event);
  }

  fn cleanup(&mut self, current_events: &[Event], max_tracked: usize) -> CleanupReport {
    self.tracked.cleanup(current_events, max_tracked)
  }

  fn save(&mut self) -> Result<(), StateError> {
    let now = Utc::now();
    let persisted = PersistedState {
      seen_ids: self.tracked.seen_ids().iter().map(String::from).collect(),
      last_updates: self
        .tracked
        .fingerprints()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
      last_checked: Some(now),
    };
    let json = serde_json::to_vec_pretty(&persisted)?;
    write_atomic(&self.path, &json)?;
    self.last_checked = Some(now);
    debug!(path = %self.path.display(), tracked = self.tracked.len(), "state saved");
    Ok(())
  }

  fn tracked_count(&self) -> usize {
    self.tracked.len()
  }
}

fn read_persisted(path: &Path) -> Result<Option<PersistedState>, StateError> {
  if !path.exists() {
    return Ok(None);
  }
  let bytes = std::fs::read(path).map_err(|e| StateError::io(path, e))?;
  let persisted = serde_json::from_slice(&bytes)?;
  Ok(Some(persisted))
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StateError> {
  let dir = match path.parent() {
    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
    _ => PathBuf::from("."),
  };
  std::fs::create_dir_all(&dir).map_err(|e| StateError::io(&dir, e))?;

  let file_name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| "state".to_string());
  let tmp = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

  if let Err(e) = write_synced(&tmp, contents) {
    let _ = std::fs::remove_file(&tmp);
    return Err(StateError::io(&tmp, e));
  }
  if let Err(e) = std::fs::rename(&tmp, path) {
    let _ = std::fs::remove_file(&tmp);
    return Err(StateError::io(path, e));
  }
  Ok(())
}

/// Write and flush to disk before the file is renamed into place.
fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
  let mut file = std::fs::File::create(path)?;
  file.write_all(contents)?;
  file.sync_all()
}
