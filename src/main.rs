mod api;
mod app;
mod commands;
mod config;
mod event;
mod list;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::PageKind;

const LOG_FILE: &str = "hbadmin.log";

#[derive(Parser, Debug)]
#[command(name = "hbadmin")]
#[command(about = "A terminal admin console for the HealthBite food-ordering platform")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hbadmin/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Page to open at startup
  #[arg(short, long, value_enum)]
  page: Option<PageKind>,

  /// Override api.url from the config file
  #[arg(long)]
  api_url: Option<String>,
}

/// Log to a file; the terminal belongs to the UI.
///
/// The returned guard flushes the background writer and must live until
/// the app exits.
fn init_logging() -> Result<WorkerGuard> {
  let dir = config::Config::log_dir();
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
  let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("HBADMIN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_logging()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line overrides
  if let Some(page) = args.page {
    config.default_page = page;
  }
  if let Some(url) = args.api_url {
    config.api.url = url;
  }

  tracing::info!(url = %config.api.url, page = config.default_page.label(), "starting");

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}
