use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::LeadSignalError;
use crate::types::{FetchMode, Source, SourceType};

/// Process configuration loaded from environment variables.
/// Secrets stay in env; crawl settings and sources live in the TOML [`FileConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            config_path: env::var("LEADSIGNAL_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("leadsignal.toml")),
        }
    }

    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  DATABASE_URL: {}",
            self.database_url
                .as_deref()
                .map(redacted_preview)
                .unwrap_or_else(|| "<not set, using in-memory store>".to_string())
        );
        tracing::info!("  LEADSIGNAL_CONFIG: {}", self.config_path.display());
    }
}

/// First 12 characters of a secret plus its length in characters.
fn redacted_preview(val: &str) -> String {
    let head: String = val.chars().take(12).collect();
    format!("{head}...({} chars)", val.chars().count())
}

/// TOML-backed configuration: crawl pacing, sources, product catalog overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Product code → display name overrides.
    #[serde(default)]
    pub products: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlConfig {
    #[serde(default = "default_inter_source_delay_ms")]
    pub inter_source_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fuzzy_candidate_limit")]
    pub fuzzy_candidate_limit: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            inter_source_delay_ms: default_inter_source_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            fuzzy_candidate_limit: default_fuzzy_candidate_limit(),
        }
    }
}

fn default_inter_source_delay_ms() -> u64 {
    2000
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; LeadSignalBot/0.1; fuel-distribution lead discovery)".to_string()
}
fn default_fuzzy_candidate_limit() -> usize {
    500
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default = "default_source_type")]
    pub source_type: SourceType,
    pub fetch: FetchMode,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub schedule_enabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_reliability")]
    pub reliability_score: f64,
}

fn default_source_type() -> SourceType {
    SourceType::Website
}
fn default_true() -> bool {
    true
}
fn default_reliability() -> f64 {
    0.5
}

impl SourceConfig {
    pub fn into_source(self) -> Source {
        let mut source = Source::new(self.name, self.url, self.source_type, self.fetch);
        source.headers = self.headers;
        source.active = self.active;
        source.schedule_enabled = self.schedule_enabled;
        source.priority = self.priority;
        source.reliability_score = self.reliability_score;
        source
    }
}

impl FileConfig {
    /// Structural checks that must hold before any crawl starts.
    pub fn validate(&self) -> std::result::Result<(), LeadSignalError> {
        if self.crawl.request_timeout_secs == 0 {
            return Err(LeadSignalError::Config(
                "crawl.request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.crawl.fuzzy_candidate_limit == 0 {
            return Err(LeadSignalError::Config(
                "crawl.fuzzy_candidate_limit must be > 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            let name = source.name.trim();
            if name.is_empty() {
                return Err(LeadSignalError::Validation(format!(
                    "source with url {} has an empty name",
                    source.url
                )));
            }
            if !names.insert(name.to_lowercase()) {
                return Err(LeadSignalError::Validation(format!(
                    "duplicate source name: {name}"
                )));
            }
            let parsed = url::Url::parse(&source.url).map_err(|e| {
                LeadSignalError::Validation(format!("source {name}: invalid url {}: {e}", source.url))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(LeadSignalError::Validation(format!(
                    "source {name}: only http/https urls are allowed, got {}",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }
}

/// Load, parse, and validate a TOML config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_file_config(&content)
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}

pub fn parse_file_config(content: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(content).context("Failed to parse config TOML")?;
    config.validate()?;
    Ok(config)
}
