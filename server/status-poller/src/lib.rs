//! Status page poller: one batch run per invocation.
//!
//! Fetches incidents and scheduled maintenances from a Statuspage v2 API,
//! filters them, diffs them against persisted state by fingerprint
//! (status + newest update id), notifies about new/updated events, and
//! persists the new state.

pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod fingerprint;
pub mod normalize;
pub mod notify;
pub mod state;
pub mod types;

pub use config::{FilterConfig, PollerConfig};
pub use engine::Poller;
pub use error::PollerError;
pub use fetch::{StatusPageClient, StatusSource};
pub use notify::{Notifier, TelegramNotifier};
pub use state::{JsonFileState, StateBackend};
pub use types::{Event, RunSummary};
