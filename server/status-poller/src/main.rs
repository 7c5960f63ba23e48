//! Binary entrypoint: one poll run, then exit.
//!
//! Exit codes: 0 when the run completed, 1 when setup failed or state could
//! not be saved. Fetch and notification failures do not change the exit code.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use status_poller::config::{self, TelegramConfig};
use status_poller::{
  JsonFileState, Poller, PollerConfig, RunSummary, StatusPageClient, TelegramNotifier,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "status-poller")]
#[command(about = "Poll a status page for incidents and maintenances and send notifications")]
struct Cli {
  /// Mark events as seen even when the notification could not be delivered.
  #[arg(long)]
  dry_run: bool,

  /// Filter config file (JSON).
  #[arg(long)]
  config: Option<PathBuf>,

  /// State file tracking already notified events.
  #[arg(long, env = "STATE_FILE", default_value = config::DEFAULT_STATE_FILE)]
  state_file: PathBuf,

  /// Maximum number of event ids kept in state.
  #[arg(long, default_value_t = config::DEFAULT_MAX_TRACKED)]
  max_tracked: usize,

  /// Skip upcoming scheduled maintenances.
  #[arg(long)]
  no_upcoming: bool,

  /// Statuspage v2 API root.
  #[arg(long, env = "STATUS_API_BASE_URL", default_value = config::DEFAULT_API_BASE_URL)]
  api_base_url: String,

  /// HTTP timeout in seconds.
  #[arg(long, default_value_t = 30)]
  timeout: u64,

  #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
  telegram_token: Option<String>,

  #[arg(long, env = "TELEGRAM_CHAT_ID")]
  telegram_chat_id: Option<String>,
}

impl Cli {
  fn poller_config(&self) -> PollerConfig {
    PollerConfig {
      api_base_url: self.api_base_url.clone(),
      state_path: self.state_file.clone(),
      max_tracked: self.max_tracked,
      include_upcoming: !self.no_upcoming,
      http_timeout: Duration::from_secs(self.timeout),
      force_commit: self.dry_run,
      telegram: TelegramConfig {
        token: self.telegram_token.clone(),
        chat_id: self.telegram_chat_id.clone(),
      },
    }
  }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
  tracing_subscriber::fmt()
    .compact()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  match run(&cli).await {
    Ok(summary) => print_summary(&summary),
    Err(e) => {
      let _ = writeln!(io::stderr(), "status-poller error: {}", e);
      std::process::exit(1);
    }
  }
}

async fn run(cli: &Cli) -> Result<RunSummary, Box<dyn std::error::Error>> {
  let poller_config = cli.poller_config();
  info!(api = %poller_config.api_base_url, "starting status check");

  let filter = config::load_filter_config(cli.config.as_deref());
  if !filter.services.is_empty() {
    info!(services = %filter.services.join(", "), "filtering for services");
  }

  let source = StatusPageClient::new(&poller_config.api_base_url, poller_config.http_timeout)?;
  let notifier = TelegramNotifier::new(poller_config.telegram.clone(), poller_config.http_timeout)?;
  let state = JsonFileState::load(&poller_config.state_path);

  let mut poller = Poller::new(source, notifier, state, filter, poller_config);
  let summary = poller.run().await?;
  Ok(summary)
}

fn print_summary(summary: &RunSummary) {
  println!();
  println!("Summary:");
  println!("   - New events notified: {}", summary.new_notified);
  println!("   - Updated events notified: {}", summary.updated_notified);
  if summary.send_failures > 0 {
    println!("   - Notifications not delivered: {}", summary.send_failures);
  }
  println!("   - Total tracked events: {}", summary.tracked);
}
