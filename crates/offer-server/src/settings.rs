//! Runtime configuration, deserialised from `config.toml` overlaid with
//! `OFFER_`-prefixed environment variables (`OFFER_INDEXER__PER_PAGE=100`).

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use offer_core::status::StatusRules;
use offer_indexer::{IndexerConfig, RetryPolicy};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  pub upstream:   UpstreamConfig,
  #[serde(default)]
  pub indexer:    IndexerSection,
  #[serde(default)]
  pub events:     EventsSection,
  #[serde(default)]
  pub status:     StatusRules,
}

/// Base URLs of the systems of record.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
  pub offer_url:         String,
  pub catalog_write_url: String,
  pub stock_url:         String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:      u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexerSection {
  pub per_page:              u32,
  pub page_delay_ms:         u64,
  /// Run a full rebuild this often; unset disables the background loop.
  pub rebuild_interval_secs: Option<u64>,
}

impl Default for IndexerSection {
  fn default() -> Self {
    Self { per_page: 50, page_delay_ms: 0, rebuild_interval_secs: None }
  }
}

impl IndexerSection {
  pub fn indexer_config(&self) -> IndexerConfig {
    IndexerConfig {
      per_page:   self.per_page,
      page_delay: Duration::from_millis(self.page_delay_ms),
    }
  }

  pub fn rebuild_interval(&self) -> Option<Duration> {
    self.rebuild_interval_secs.filter(|s| *s > 0).map(Duration::from_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsSection {
  /// Settle time before the first attempt.
  pub delay_ms:        u64,
  pub max_attempts:    u32,
  pub backoff_base_ms: u64,
  pub backoff_max_ms:  u64,
  /// Jitter applied to each backoff interval, in `[0, 1)`.
  pub backoff_jitter:  f64,
}

impl Default for EventsSection {
  fn default() -> Self {
    Self {
      delay_ms:        5000,
      max_attempts:    10,
      backoff_base_ms: 100,
      backoff_max_ms:  5000,
      backoff_jitter:  0.5,
    }
  }
}

impl EventsSection {
  pub fn delay(&self) -> Duration { Duration::from_millis(self.delay_ms) }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(self.max_attempts)
      .with_intervals(
        Duration::from_millis(self.backoff_base_ms),
        Duration::from_millis(self.backoff_max_ms),
      )
      .with_randomization(self.backoff_jitter)
  }
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("offers.db") }

fn default_timeout_secs() -> u64 { 30 }

impl ServerConfig {
  /// Read `path` (optional) and the environment.
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("OFFER").separator("__"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }
}
