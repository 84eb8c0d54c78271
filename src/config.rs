// src/config.rs
//! Explicit process configuration. Constructed once in `main` and passed
//! into each component constructor; no component reads ambient state.
//!
//! Sources, in priority order: `$MONITOR_CONFIG_PATH`, then
//! `config/monitor.toml`, then built-in defaults — with individual env-var
//! overrides applied on top (the original `.env` surface).

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::fingerprint;
use crate::ingest::types::FeedSource;

pub const DEFAULT_CONFIG_PATH: &str = "config/monitor.toml";
pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";

fn default_retention_days() -> i64 {
    30
}
fn default_fetch_timeout() -> u64 {
    20
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_output() -> String {
    "console".into()
}
fn default_filter_model() -> String {
    "gpt-4-turbo".into()
}
fn default_history_path() -> PathBuf {
    PathBuf::from("data/article_history.json")
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("data/fetch_cache.json")
}
fn default_latest_report_path() -> PathBuf {
    PathBuf::from("data/latest_report.json")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feeds: Vec<FeedSource>,
    /// Plain-language criteria handed to the classification service.
    #[serde(default)]
    pub filter_prompt: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Bypass history filtering for one run (articles are still recorded).
    #[serde(default)]
    pub ignore_history: bool,
    /// Minutes between runs; 0 means a single one-shot invocation.
    #[serde(default)]
    pub interval_minutes: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,
    /// console | slack | email | none
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_filter_model")]
    pub filter_model: String,
    #[serde(default = "default_filter_model")]
    pub group_model: String,
    #[serde(default = "default_filter_model")]
    pub summarize_model: String,
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_latest_report_path")]
    pub latest_report_path: PathBuf,
    /// Query parameters stripped during fingerprinting; `*` suffix matches
    /// by prefix.
    #[serde(default = "fingerprint::default_tracking_params")]
    pub tracking_params: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str("").expect("defaults deserialize")
    }
}

impl AppConfig {
    /// Load from the config file (env-pointed or default location) and
    /// apply env overrides. A missing file is fine; an unreadable or
    /// malformed one is an error — silently running misconfigured is worse.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("MONITOR_CONFIG_PATH points to non-existent path"));
            }
            Self::from_file(&pb)?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::from_file(&default)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing monitor config")?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("RSS_FEEDS") {
            let feeds = parse_feed_list(&raw);
            if !feeds.is_empty() {
                self.feeds = feeds;
            }
        }
        if let Ok(v) = std::env::var("FILTER_PROMPT") {
            if !v.trim().is_empty() {
                self.filter_prompt = v;
            }
        }
        if let Some(v) = env_parse::<u64>("PROCESS_INTERVAL") {
            self.interval_minutes = v;
        }
        if let Some(v) = env_parse::<i64>("RETENTION_DAYS") {
            self.retention_days = v;
        }
        if std::env::var("IGNORE_HISTORY").ok().as_deref() == Some("1") {
            self.ignore_history = true;
        }
        if let Ok(v) = std::env::var("OUTPUT") {
            if !v.trim().is_empty() {
                self.output = v.trim().to_ascii_lowercase();
            }
        }
        if let Ok(v) = std::env::var("FILTER_MODEL") {
            if !v.trim().is_empty() {
                self.filter_model = v;
            }
        }
        if let Ok(v) = std::env::var("GROUP_MODEL") {
            if !v.trim().is_empty() {
                self.group_model = v;
            }
        }
        if let Ok(v) = std::env::var("SUMMARIZE_MODEL") {
            if !v.trim().is_empty() {
                self.summarize_model = v;
            }
        }
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days.max(0))
    }

    /// None for a one-shot run.
    pub fn interval(&self) -> Option<std::time::Duration> {
        if self.interval_minutes == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.interval_minutes * 60))
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Feed URLs from a newline- or comma-separated list. Source ids derive
/// from the host; duplicates get a numeric suffix so each feed keeps its
/// own cache validator row.
pub fn parse_feed_list(raw: &str) -> Vec<FeedSource> {
    let parts: Vec<&str> = if raw.contains('\n') {
        raw.split('\n').collect()
    } else {
        raw.split(',').collect()
    };

    let mut seen = std::collections::BTreeMap::<String, usize>::new();
    let mut out = Vec::new();
    for part in parts {
        let url = part.trim();
        if url.is_empty() {
            continue;
        }
        let base = source_id_from_url(url);
        let n = seen.entry(base.clone()).or_insert(0);
        *n += 1;
        let id = if *n == 1 {
            base
        } else {
            format!("{base}-{n}")
        };
        out.push(FeedSource {
            id,
            url: url.to_string(),
        });
    }
    out
}

fn source_id_from_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(u) => u
            .host_str()
            .map(|h| h.trim_start_matches("www.").to_string())
            .unwrap_or_else(|| url.to_string()),
        Err(_) => url.to_string(),
    }
}
