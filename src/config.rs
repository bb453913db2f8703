//! Configuration parsing and validation.
//!
//! Project Search Sync is configured via a TOML file (default:
//! `config/searchsync.toml`). Every section except `[db]` and `[index]`
//! has defaults matching the production constants.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/projects.sqlite"
//!
//! [index]
//! url = "http://127.0.0.1:7700"
//! api_key = "masterKey"
//! uid = "projects"
//!
//! [sync]
//! page_size = 1000
//! task_timeout_ms = 10000
//! tasks_timeout_ms = 30000
//! poll_interval_ms = 100
//!
//! [media]
//! cdn_base_url = "https://cdn.example.com"
//!
//! [log]
//! format = "pretty"
//! ```
//!
//! The `MEILI_MASTER_KEY` environment variable, when set, overrides
//! `index.api_key`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::task_wait::WaitPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_index_uid")]
    pub uid: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_index_uid() -> String {
    "projects".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    #[serde(default = "default_tasks_timeout_ms")]
    pub tasks_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            task_timeout_ms: default_task_timeout_ms(),
            tasks_timeout_ms: default_tasks_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_page_size() -> usize {
    1000
}
fn default_task_timeout_ms() -> u64 {
    10_000
}
fn default_tasks_timeout_ms() -> u64 {
    30_000
}
fn default_poll_interval_ms() -> u64 {
    100
}

impl SyncConfig {
    /// Wait policy for a single submitted task (one document batch).
    pub fn task_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.task_timeout_ms),
        )
    }

    /// Wait policy for a group of tasks (index provisioning).
    pub fn tasks_wait(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.tasks_timeout_ms),
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(default = "default_cdn_base_url")]
    pub cdn_base_url: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cdn_base_url: default_cdn_base_url(),
        }
    }
}

fn default_cdn_base_url() -> String {
    "https://cdn.example.invalid".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl IndexConfig {
    /// API key to send, with `MEILI_MASTER_KEY` taking precedence.
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("MEILI_MASTER_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.index.url.trim().is_empty() {
        anyhow::bail!("index.url must not be empty");
    }
    if config.index.uid.trim().is_empty() {
        anyhow::bail!("index.uid must not be empty");
    }

    let sync = &config.sync;
    if sync.page_size == 0 {
        anyhow::bail!("sync.page_size must be > 0");
    }
    if sync.poll_interval_ms == 0 {
        anyhow::bail!("sync.poll_interval_ms must be > 0");
    }
    if sync.task_timeout_ms < sync.poll_interval_ms || sync.tasks_timeout_ms < sync.poll_interval_ms
    {
        anyhow::bail!("sync timeouts must be >= sync.poll_interval_ms");
    }

    match config.log.format.as_str() {
        "pretty" | "json" => {}
        other => anyhow::bail!("Unknown log format: '{}'. Must be pretty or json.", other),
    }

    Ok(())
}
