use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::types::RangePreset;
use crate::list::{ErrorPolicy, RefreshMode, SessionOptions};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub lists: ListsConfig,
  #[serde(default)]
  pub dashboard: DashboardConfig,
  #[serde(default)]
  pub ai: AiConfig,
  #[serde(default)]
  pub analytics: AnalyticsConfig,
  /// Page shown at startup
  #[serde(default)]
  pub default_page: PageKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Platform base URL, without the `/api/admin` suffix
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  15
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListsConfig {
  pub page_size: u32,
  pub debounce_ms: u64,
  /// Auto-refresh period for pages that poll
  pub poll_secs: u64,
}

impl Default for ListsConfig {
  fn default() -> Self {
    Self {
      page_size: 20,
      debounce_ms: 400,
      poll_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
  /// Silent refresh period for the orders-by-hour panel
  pub poll_secs: u64,
}

impl Default for DashboardConfig {
  fn default() -> Self {
    Self { poll_secs: 300 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
  /// Model status poll period while a retrain runs
  pub status_poll_secs: u64,
}

impl Default for AiConfig {
  fn default() -> Self {
    Self {
      status_poll_secs: 10,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
  /// Range the analytics page opens with
  pub default_range: RangePreset,
}

/// The admin pages the console can show.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
  Dashboard,
  #[default]
  Orders,
  Users,
  Foods,
  Inventory,
  Audit,
  Ai,
  Analytics,
}

impl PageKind {
  pub fn label(&self) -> &'static str {
    match self {
      PageKind::Dashboard => "Dashboard",
      PageKind::Orders => "Orders",
      PageKind::Users => "Users",
      PageKind::Foods => "Foods",
      PageKind::Inventory => "Inventory",
      PageKind::Audit => "Audit",
      PageKind::Ai => "AI monitor",
      PageKind::Analytics => "Analytics",
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./hbadmin.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/hbadmin/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/hbadmin/config.yaml\n\
         See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("hbadmin.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("hbadmin").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config = Self::parse(&contents)
      .map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Parse and validate a YAML document.
  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if url::Url::parse(&self.api.url).is_err() {
      return Err(eyre!("api.url is not a valid URL: {}", self.api.url));
    }
    if !(1..=100).contains(&self.lists.page_size) {
      return Err(eyre!("lists.page_size must be between 1 and 100"));
    }
    if self.lists.poll_secs == 0 || self.dashboard.poll_secs == 0 || self.ai.status_poll_secs == 0
    {
      return Err(eyre!("poll periods must be at least one second"));
    }
    Ok(())
  }

  /// Get the admin bearer token from environment variables.
  ///
  /// Checks HBADMIN_TOKEN first, then HEALTHBITE_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("HBADMIN_TOKEN")
      .or_else(|_| std::env::var("HEALTHBITE_TOKEN"))
      .map_err(|_| {
        eyre!("Admin token not found. Set HBADMIN_TOKEN or HEALTHBITE_TOKEN environment variable.")
      })
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  /// Session options for list pages.
  pub fn session_options(&self, error_policy: ErrorPolicy) -> SessionOptions {
    SessionOptions {
      debounce: Duration::from_millis(self.lists.debounce_ms),
      poll_period: Duration::from_secs(self.lists.poll_secs),
      refresh_mode: RefreshMode::Blocking,
      error_policy,
    }
  }

  pub fn dashboard_poll_period(&self) -> Duration {
    Duration::from_secs(self.dashboard.poll_secs)
  }

  pub fn ai_status_poll_period(&self) -> Duration {
    Duration::from_secs(self.ai.status_poll_secs)
  }

  /// Where the log file goes; stdout belongs to the terminal UI.
  pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
      .unwrap_or_else(std::env::temp_dir)
      .join("hbadmin")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  url: https://healthbite.example\n").unwrap();
    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.lists.page_size, 20);
    assert_eq!(config.lists.debounce_ms, 400);
    assert_eq!(config.lists.poll_secs, 30);
    assert_eq!(config.dashboard.poll_secs, 300);
    assert_eq!(config.default_page, PageKind::Orders);
    assert_eq!(config.ai_status_poll_period(), Duration::from_secs(10));
    assert_eq!(config.analytics.default_range, RangePreset::Month);
    assert!(config.title.is_none());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  url: http://localhost:8000
  timeout_secs: 5
title: Canteen Admin
lists:
  page_size: 50
  debounce_ms: 250
dashboard:
  poll_secs: 60
ai:
  status_poll_secs: 5
analytics:
  default_range: 7d
default_page: inventory
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
    assert_eq!(config.title.as_deref(), Some("Canteen Admin"));
    assert_eq!(config.lists.page_size, 50);
    // unspecified fields inside a section keep their defaults
    assert_eq!(config.lists.poll_secs, 30);
    assert_eq!(config.default_page, PageKind::Inventory);

    let options = config.session_options(ErrorPolicy::Retain);
    assert_eq!(options.debounce, Duration::from_millis(250));
    assert_eq!(options.error_policy, ErrorPolicy::Retain);
    assert_eq!(config.dashboard_poll_period(), Duration::from_secs(60));
    assert_eq!(config.ai_status_poll_period(), Duration::from_secs(5));
    assert_eq!(config.analytics.default_range, RangePreset::Week);
  }

  #[test]
  fn test_rejects_bad_values() {
    assert!(Config::parse("api:\n  url: not a url\n").is_err());
    assert!(Config::parse("api:\n  url: http://x\nlists:\n  page_size: 0\n").is_err());
    assert!(Config::parse("api:\n  url: http://x\nlists:\n  poll_secs: 0\n").is_err());
    assert!(Config::parse("api:\n  url: http://x\nai:\n  status_poll_secs: 0\n").is_err());
    assert!(Config::parse("api:\n  url: http://x\nanalytics:\n  default_range: 1y\n").is_err());
    assert!(Config::parse("title: missing api\n").is_err());
  }
}
