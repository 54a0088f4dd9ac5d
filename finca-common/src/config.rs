//! Configuration loading and config file resolution
//!
//! Settings come from a single TOML file. Every section has defaults so a missing
//! file (or a missing section) never prevents startup; a malformed file does.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FINCA_CONFIG";

/// Environment variable carrying the bearer token for the source services
pub const SOURCES_TOKEN_ENV_VAR: &str = "FINCA_SOURCES_TOKEN";

/// File name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "finca-progress.toml";

/// Root TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// HTTP listener section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream REST services holding surveys and deeds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_parcel_survey_endpoint")]
    pub parcel_survey_endpoint: String,
    #[serde(default = "default_construction_survey_endpoint")]
    pub construction_survey_endpoint: String,
    #[serde(default = "default_deed_endpoint")]
    pub deed_endpoint: String,
    /// Query parameter carrying the case id
    #[serde(default = "default_case_param")]
    pub case_param: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Bearer token; `FINCA_SOURCES_TOKEN` takes priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Static query parameters per source (`parcel_survey`, `construction_survey`, `deed`)
    #[serde(default)]
    pub filters: BTreeMap<String, BTreeMap<String, String>>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api".to_string()
}

fn default_parcel_survey_endpoint() -> String {
    "fichas-campo-parcela".to_string()
}

fn default_construction_survey_endpoint() -> String {
    "fichas-campo-construccion".to_string()
}

fn default_deed_endpoint() -> String {
    "actas".to_string()
}

fn default_case_param() -> String {
    "finca_id".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_requests_per_second() -> u32 {
    50
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            parcel_survey_endpoint: default_parcel_survey_endpoint(),
            construction_survey_endpoint: default_construction_survey_endpoint(),
            deed_endpoint: default_deed_endpoint(),
            case_param: default_case_param(),
            timeout_ms: default_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            requests_per_second: default_requests_per_second(),
            filters: BTreeMap::new(),
            api_token: None,
        }
    }
}

impl SourcesConfig {
    /// Static query parameters configured for `source`
    pub fn filter_for(&self, source: &str) -> Vec<(String, String)> {
        self.filters
            .get(source)
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Aggregation engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Cases computed at once by a batch request
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for a single source read; expiry counts as "no records"
    #[serde(default = "default_source_timeout_ms")]
    pub source_timeout_ms: u64,
    /// Include downgraded source failures in case results
    #[serde(default = "default_report_source_failures")]
    pub report_source_failures: bool,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_source_timeout_ms() -> u64 {
    8_000
}

fn default_report_source_failures() -> bool {
    true
}

fn default_max_batch_size() -> usize {
    500
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            source_timeout_ms: default_source_timeout_ms(),
            report_source_failures: default_report_source_failures(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

impl AggregatorConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }
}

/// Deed classification extensions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Stage key -> additional deed type values mapping to that stage
    #[serde(default)]
    pub extra_aliases: BTreeMap<String, Vec<String>>,
}

impl TomlConfig {
    /// Check values that would make the service misbehave at runtime.
    ///
    /// Stage keys in `classifier.extra_aliases` are checked by the consumer,
    /// which owns the stage registry.
    pub fn validate(&self) -> Result<()> {
        if self.sources.base_url.trim().is_empty() {
            return Err(Error::Config("sources.base_url must not be empty".to_string()));
        }
        if self.sources.requests_per_second == 0 {
            return Err(Error::Config(
                "sources.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.aggregator.max_concurrency == 0 {
            return Err(Error::Config(
                "aggregator.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.aggregator.source_timeout_ms == 0 {
            return Err(Error::Config(
                "aggregator.source_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.aggregator.max_batch_size == 0 {
            return Err(Error::Config(
                "aggregator.max_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Config file resolution in priority order:
/// 1. Command-line argument
/// 2. `FINCA_CONFIG` environment variable
/// 3. Platform config directory, if the file exists there
///
/// Returns `None` when nothing is found; callers then run on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`~/.config/finca/finca-progress.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("finca").join(CONFIG_FILE_NAME))
}

/// Load TOML configuration from `path`.
///
/// A missing file is not an error: a warning is logged and defaults are returned.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.validate()?;

    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Resolve the config path and load it, falling back to defaults when no file is found
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => load_toml_config(&path),
        None => {
            info!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write configuration to `path`, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)?;

    // Write to a sibling temp file, then rename over the target
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the source-service bearer token
///
/// **Priority:** ENV → TOML
pub fn resolve_api_token(config: &TomlConfig) -> Option<String> {
    let env_token = std::env::var(SOURCES_TOKEN_ENV_VAR)
        .ok()
        .filter(|t| is_valid_token(t));
    let toml_token = config
        .sources
        .api_token
        .clone()
        .filter(|t| is_valid_token(t));

    if env_token.is_some() && toml_token.is_some() {
        warn!(
            "Source API token found in both environment and TOML config. Using environment (highest priority)."
        );
    }

    if env_token.is_some() {
        info!("Source API token loaded from environment variable");
        return env_token;
    }
    if toml_token.is_some() {
        info!("Source API token loaded from TOML config");
    }
    toml_token
}

/// Token must be non-empty and non-whitespace
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

/// Standard User-Agent for outgoing HTTP requests
pub fn get_user_agent() -> String {
    format!("finca-progress/{}", env!("CARGO_PKG_VERSION"))
}
