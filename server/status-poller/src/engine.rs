//! Orchestrator: fetch, filter, classify, notify, record, persist.

use tracing::{debug, info};

use crate::config::{FilterConfig, PollerConfig};
use crate::error::PollerError;
use crate::fetch::{self, StatusSource};
use crate::filter;
use crate::notify::Notifier;
use crate::state::StateBackend;
use crate::types::*;

/// One poll run over a status source, a notifier and a state backend.
pub struct Poller<S, N, B> {
  source: S,
  notifier: N,
  state: B,
  filter: FilterConfig,
  config: PollerConfig,
}

impl<S, N, B> Poller<S, N, B>
where
  S: StatusSource,
  N: Notifier,
  B: StateBackend,
{
  pub fn new(source: S, notifier: N, state: B, filter: FilterConfig, config: PollerConfig) -> Self {
    Self {
      source,
      notifier,
      state,
      filter,
      config,
    }
  }

  /// Fetch every feed and process the result.
  pub async fn run(&mut self) -> Result<RunSummary, PollerError> {
    let fetched = fetch::fetch_all(&self.source, self.config.include_upcoming).await;
    self.process(fetched).await
  }

  /// Process an already-fetched batch, in order. Only a failure to persist
  /// state is returned as an error.
  pub async fn process(&mut self, fetched: Vec<Event>) -> Result<RunSummary, PollerError> {
    let mut summary = RunSummary {
      fetched_incidents: fetched.iter().filter(|e| e.is_incident()).count(),
      fetched_maintenances: fetched.iter().filter(|e| e.is_maintenance()).count(),
      ..RunSummary::default()
    };
    info!(
      incidents = summary.fetched_incidents,
      maintenances = summary.fetched_maintenances,
      "fetched events"
    );

    let events = filter::apply(fetched, &self.filter);
    summary.filtered_incidents = events.iter().filter(|e| e.is_incident()).count();
    summary.filtered_maintenances = events.iter().filter(|e| e.is_maintenance()).count();
    if self.filter.is_restrictive() {
      info!(
        incidents = summary.filtered_incidents,
        maintenances = summary.filtered_maintenances,
        "after filtering"
      );
    }

    for event in &events {
      if self.state.is_new_event(event) {
        info!(kind = event.kind.as_str(), name = %event.name, "new event");
        let sent = self.notifier.send_new(event).await;
        if self.commit(event, sent, &mut summary) {
          summary.new_notified += 1;
        }
      } else if self.state.is_updated_event(event) {
        info!(kind = event.kind.as_str(), name = %event.name, "updated event");
        let sent = self.notifier.send_update(event).await;
        if self.commit(event, sent, &mut summary) {
          summary.updated_notified += 1;
        }
      } else {
        debug!(id = %event.id, "unchanged");
      }
    }

    let report = self.state.cleanup(&events, self.config.max_tracked);
    summary.resolved = report.resolved;
    summary.evicted = report.evicted;

    self.state.save()?;
    summary.tracked = self.state.tracked_count();

    info!(
      new = summary.new_notified,
      updated = summary.updated_notified,
      failed = summary.send_failures,
      tracked = summary.tracked,
      "run complete"
    );
    Ok(summary)
  }

  /// Record the event if it was delivered, or regardless when forcing.
  fn commit(&mut self, event: &Event, sent: bool, summary: &mut RunSummary) -> bool {
    if !sent {
      summary.send_failures += 1;
    }
    if sent || self.config.force_commit {
      self.state.mark_seen(event);
      return true;
    }
    debug!(id = %event.id, "not delivered, will retry next run");
    false
  }

  pub fn state(&self) -> &B {
    &self.state
  }

  pub fn notifier(&self) -> &N {
    &self.notifier
  }

  pub fn into_state(self) -> B {
    self.state
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::StateError;
  use crate::fetch::Category;
  use crate::state::{CleanupReport, TrackedState};
  use async_trait::async_trait;
  use std::sync::Mutex;

  /// In-memory backend that counts saves.
  #[derive(Default)]
  struct MemoryState {
    tracked: TrackedState,
    saves: usize,
    fail_save: bool,
  }

  impl StateBackend for MemoryState {
    fn is_new_event(&self, event: &Event) -> bool {
      self.tracked.is_new(event)
    }
    fn is_updated_event(&self, event: &Event) -> bool {
      self.tracked.is_updated(event)
    }
    fn mark_seen(&mut self, event: &Event) {
      self.tracked.mark_seen(event)
    }
    fn cleanup(&mut self, current_events: &[Event], max_tracked: usize) -> CleanupReport {
      self.tracked.cleanup(current_events, max_tracked)
    }
    fn save(&mut self) -> Result<(), StateError> {
      if self.fail_save {
        return Err(StateError::io("/nowhere", std::io::Error::other("disk full")));
      }
      self.saves += 1;
      Ok(())
    }
    fn tracked_count(&self) -> usize {
      self.tracked.len()
    }
  }

  struct NoSource;

  #[async_trait]
  impl StatusSource for NoSource {
    async fn fetch(&self, _category: Category) -> Vec<Event> {
      Vec::new()
    }
  }

  #[derive(Default)]
  struct Recorder {
    accept: bool,
    sent: Mutex<Vec<(MessageTag, String)>>,
  }

  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  enum MessageTag {
    New,
    Update,
  }

  impl Recorder {
    fn accepting() -> Self {
      Self {
        accept: true,
        ..Self::default()
      }
    }

    fn calls(&self) -> Vec<(MessageTag, String)> {
      self.sent.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Notifier for Recorder {
    async fn send_new(&self, event: &Event) -> bool {
      self.sent.lock().unwrap().push((MessageTag::New, event.id.clone()));
      self.accept
    }
    async fn send_update(&self, event: &Event) -> bool {
      self.sent.lock().unwrap().push((MessageTag::Update, event.id.clone()));
      self.accept
    }
  }

  fn make_event(id: &str, status: &str, update_ids: &[&str]) -> Event {
    Event {
      id: id.into(),
      name: format!("Event {}", id),
      status: status.into(),
      impact: "minor".into(),
      shortlink: String::new(),
      created_at: String::new(),
      updated_at: String::new(),
      updates: update_ids
        .iter()
        .map(|u| Update {
          id: (*u).into(),
          status: status.into(),
          body: String::new(),
          created_at: String::new(),
        })
        .collect(),
      components: Vec::new(),
      kind: EventKind::Incident,
      scheduled_for: None,
      scheduled_until: None,
    }
  }

  fn poller(notifier: Recorder, config: PollerConfig) -> Poller<NoSource, Recorder, MemoryState> {
    Poller::new(NoSource, notifier, MemoryState::default(), FilterConfig::default(), config)
  }

  #[tokio::test]
  async fn new_then_update_then_quiet() {
    let mut p = poller(Recorder::accepting(), PollerConfig::default());

    let s1 = p.process(vec![make_event("A", "investigating", &["u1"])]).await.unwrap();
    assert_eq!((s1.new_notified, s1.updated_notified), (1, 0));

    let s2 = p.process(vec![make_event("A", "resolved", &["u2", "u1"])]).await.unwrap();
    assert_eq!((s2.new_notified, s2.updated_notified), (0, 1));

    let s3 = p.process(vec![make_event("A", "resolved", &["u2", "u1"])]).await.unwrap();
    assert_eq!((s3.new_notified, s3.updated_notified), (0, 0));

    assert_eq!(
      p.notifier().calls(),
      vec![(MessageTag::New, "A".to_string()), (MessageTag::Update, "A".to_string())]
    );
    assert_eq!(p.state().saves, 3);
  }

  #[tokio::test]
  async fn failed_send_is_retried_next_run() {
    let mut p = poller(Recorder::default(), PollerConfig::default());
    let batch = vec![make_event("A", "investigating", &["u1"])];

    let s1 = p.process(batch.clone()).await.unwrap();
    assert_eq!(s1.new_notified, 0);
    assert_eq!(s1.send_failures, 1);
    assert_eq!(s1.tracked, 0);

    p.process(batch).await.unwrap();
    assert_eq!(p.notifier().calls().len(), 2);
    assert!(p.notifier().calls().iter().all(|(tag, _)| *tag == MessageTag::New));
  }

  #[tokio::test]
  async fn force_commit_marks_despite_failure() {
    let config = PollerConfig {
      force_commit: true,
      ..PollerConfig::default()
    };
    let mut p = poller(Recorder::default(), config);
    let batch = vec![make_event("A", "investigating", &["u1"])];

    let s1 = p.process(batch.clone()).await.unwrap();
    assert_eq!(s1.new_notified, 1);
    assert_eq!(s1.send_failures, 1);
    assert_eq!(s1.tracked, 1);

    let s2 = p.process(batch).await.unwrap();
    assert_eq!(s2.new_notified + s2.updated_notified, 0);
    assert_eq!(p.notifier().calls().len(), 1);
  }

  #[tokio::test]
  async fn filtered_events_are_never_notified_or_tracked() {
    let mut p = Poller::new(
      NoSource,
      Recorder::accepting(),
      MemoryState::default(),
      FilterConfig {
        exclude_keywords: vec!["Event B".into()],
        ..FilterConfig::default()
      },
      PollerConfig::default(),
    );
    let s = p
      .process(vec![
        make_event("A", "investigating", &[]),
        make_event("B", "investigating", &[]),
      ])
      .await
      .unwrap();
    assert_eq!(s.fetched_incidents, 2);
    assert_eq!(s.filtered_incidents, 1);
    assert_eq!(p.state().tracked_count(), 1);
    assert!(p.state().tracked.seen_ids().contains("A"));
  }

  #[tokio::test]
  async fn history_is_bounded_after_run() {
    let config = PollerConfig {
      max_tracked: 3,
      ..PollerConfig::default()
    };
    let mut p = poller(Recorder::accepting(), config);
    let batch: Vec<Event> = (0..5).map(|i| make_event(&format!("e{}", i), "investigating", &[])).collect();

    let s = p.process(batch).await.unwrap();
    assert_eq!(s.new_notified, 5);
    assert_eq!(s.evicted, 2);
    assert_eq!(s.tracked, 3);
    assert_eq!(p.state().tracked.seen_ids().iter().collect::<Vec<_>>(), vec!["e2", "e3", "e4"]);
  }

  #[tokio::test]
  async fn save_failure_is_reported() {
    let mut p = Poller::new(
      NoSource,
      Recorder::accepting(),
      MemoryState {
        fail_save: true,
        ..MemoryState::default()
      },
      FilterConfig::default(),
      PollerConfig::default(),
    );
    let err = p.process(vec![make_event("A", "investigating", &[])]).await.unwrap_err();
    assert!(err.to_string().contains("disk full"));
  }

  #[tokio::test]
  async fn run_with_empty_feed_still_saves() {
    let mut p = poller(Recorder::accepting(), PollerConfig::default());
    let s = p.run().await.unwrap();
    assert_eq!(s, RunSummary::default());
    assert_eq!(p.into_state().saves, 1);
  }
}
