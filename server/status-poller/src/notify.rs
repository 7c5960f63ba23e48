//! Notification formatting and the Telegram transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::error::NotifyError;
use crate::types::Event;

const TELEGRAM_API: &str = "https://api.telegram.org";
const MAX_BODY_CHARS: usize = 500;
const MAX_COMPONENTS: usize = 5;

/// Delivery channel. `true` means the message was accepted for delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn send_new(&self, event: &Event) -> bool;
  async fn send_update(&self, event: &Event) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
  New,
  Update,
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn status_emoji(status: &str) -> &'static str {
  match status {
    "investigating" => "🔍",
    "identified" => "🔎",
    "monitoring" => "👀",
    "resolved" => "✅",
    "postmortem" => "📝",
    "scheduled" => "📅",
    "in_progress" => "🔧",
    "verifying" => "🔎",
    "completed" => "✅",
    _ => "🚨",
  }
}

fn impact_emoji(impact: &str) -> &'static str {
  match impact {
    "minor" => "🟡",
    "major" => "🟠",
    "critical" => "🔴",
    _ => "⚪",
  }
}

/// Render an event as a Telegram HTML message.
pub fn format_message(event: &Event, kind: MessageKind) -> String {
  let header = match (kind, event.is_maintenance()) {
    (MessageKind::Update, _) => "🔄 UPDATE",
    (MessageKind::New, true) => "🔧 SCHEDULED MAINTENANCE",
    (MessageKind::New, false) => "🚨 NEW INCIDENT",
  };

  let mut lines = vec![
    header.to_string(),
    String::new(),
    format!("{} <b>{}</b>", status_emoji(&event.status), escape_html(&event.name)),
    format!("Status: {}", escape_html(&title_case(&event.status.replace('_', " ")))),
  ];

  if event.is_incident() {
    lines.push(format!(
      "Impact: {} {}",
      impact_emoji(&event.impact),
      escape_html(&title_case(&event.impact))
    ));
  }

  if event.is_maintenance() {
    if let Some(start) = &event.scheduled_for {
      let start: String = start.chars().take(16).collect::<String>().replace('T', " ");
      match &event.scheduled_until {
        Some(end) => {
          let end: String = end.chars().skip(11).take(5).collect();
          lines.push(format!("⏰ Scheduled: {} → {} UTC", start, end));
        }
        None => lines.push(format!("⏰ Scheduled: {} UTC", start)),
      }
    }
  }

  if let Some(update) = event.latest_update().filter(|u| !u.body.is_empty()) {
    lines.push(String::new());
    lines.push(format!("📋 <i>{}</i>", escape_html(&truncate_body(&update.body))));
  }

  let components = event.component_names();
  if !components.is_empty() {
    let shown: Vec<&str> = components.into_iter().take(MAX_COMPONENTS).collect();
    lines.push(String::new());
    lines.push(format!("🎮 Affected: {}", escape_html(&shown.join(", "))));
  }

  if !event.shortlink.is_empty() {
    lines.push(String::new());
    lines.push(format!("🔗 {}", escape_html(&event.shortlink)));
  }

  lines.join("\n")
}

/// Cap at 500 characters, replacing the tail with `...` when cut.
fn truncate_body(body: &str) -> String {
  if body.chars().count() <= MAX_BODY_CHARS {
    return body.to_string();
  }
  let mut cut: String = body.chars().take(MAX_BODY_CHARS - 3).collect();
  cut.push_str("...");
  cut
}

/// Uppercase the first letter of each space-separated word, lowercase the rest.
fn title_case(s: &str) -> String {
  s.split(' ')
    .map(|word| {
      let mut chars = word.chars();
      match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
      }
    })
    .collect::<Vec<String>>()
    .join(" ")
}

fn escape_html(s: &str) -> String {
  s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Plain-text rendering of an HTML message, for console output.
pub fn strip_html(message: &str) -> String {
  let mut out = String::with_capacity(message.len());
  let mut in_tag = false;
  for ch in message.chars() {
    match ch {
      '<' => in_tag = true,
      '>' if in_tag => in_tag = false,
      _ if !in_tag => out.push(ch),
      _ => {}
    }
  }
  out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Telegram transport
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SendMessage<'a> {
  chat_id: &'a str,
  text: &'a str,
  parse_mode: &'static str,
  disable_web_page_preview: bool,
}

/// Sends messages through the Telegram Bot API. Without credentials, messages
/// are printed to stdout and reported as not sent.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
  http: reqwest::Client,
  config: TelegramConfig,
}

impl TelegramNotifier {
  pub fn new(config: TelegramConfig, timeout: Duration) -> Result<Self, NotifyError> {
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { http, config })
  }

  pub fn is_configured(&self) -> bool {
    self.config.is_configured()
  }

  async fn send_message(&self, message: &str) -> bool {
    let Some((token, chat_id)) = self.config.credentials() else {
      return self.print_fallback(message);
    };

    match self.post(token, chat_id, message).await {
      Ok(()) => {
        info!("telegram message sent");
        true
      }
      Err(e) => {
        warn!(error = %e, "failed to send telegram message");
        false
      }
    }
  }

  async fn post(&self, token: &str, chat_id: &str, message: &str) -> Result<(), NotifyError> {
    let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, token);
    let payload = SendMessage {
      chat_id,
      text: message,
      parse_mode: "HTML",
      disable_web_page_preview: true,
    };
    let response = self.http.post(&url).json(&payload).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(NotifyError::Status(status.as_u16()));
    }
    Ok(())
  }

  fn print_fallback(&self, message: &str) -> bool {
    warn!("telegram not configured, printing message instead");
    let rule = "-".repeat(50);
    println!("{}\n{}\n{}", rule, strip_html(message), rule);
    false
  }
}

#[async_trait]
impl Notifier for TelegramNotifier {
  async fn send_new(&self, event: &Event) -> bool {
    self.send_message(&format_message(event, MessageKind::New)).await
  }

  async fn send_update(&self, event: &Event) -> bool {
    self.send_message(&format_message(event, MessageKind::Update)).await
  }
}
