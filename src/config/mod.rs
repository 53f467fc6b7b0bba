//! Configuration system (layered: defaults < TOML file < environment).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{BridgeError, Result};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;
pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 300;

/// Top-level configuration for the bridge and its CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MitmConfig {
    pub server: ServerConfig,
    pub advisor: AdvisoryConfig,
    pub bridge: BridgeSettings,
    pub log_level: String,
}

impl Default for MitmConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            advisor: AdvisoryConfig::default(),
            bridge: BridgeSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

/// How to launch the MCP tool server process.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    #[builder(into)]
    pub command: String,
    #[builder(default)]
    pub args: Vec<String>,
    /// Extra environment; values may reference `${VAR}` from the parent environment.
    #[builder(default)]
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which advisory provider implementation to construct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString, Default)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AdvisoryKind {
    /// Canned responses only; enrichment always falls back.
    #[default]
    Mock,
    /// Any OpenAI-compatible `/chat/completions` endpoint (OpenAI, Ollama, LM Studio, ...).
    OpenAiCompatible,
    /// A bare `{prompt} -> {text}` HTTP endpoint.
    Local,
}

/// Advisory provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub kind: AdvisoryKind,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Attempts per advisor request, including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            kind: AdvisoryKind::Mock,
            base_url: None,
            model: "llama3.1".to_string(),
            api_key: None,
            max_tokens: 1000,
            temperature: 0.7,
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

/// Tuning knobs for the tool bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeSettings {
    pub history_capacity: usize,
    pub optimize_parameters: bool,
    /// Positive precedents handed to the advisor when optimizing a call.
    pub precedent_limit: usize,
    pub max_suggestions: usize,
    pub discovery_interval_secs: u64,
    pub page_size: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            optimize_parameters: true,
            precedent_limit: 5,
            max_suggestions: 3,
            discovery_interval_secs: DEFAULT_DISCOVERY_INTERVAL_SECS,
            page_size: 10,
        }
    }
}

impl BridgeSettings {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }
}

impl MitmConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist. Without one, `~/.mitm/config.toml` is
    /// read when present. Environment variables (and `.env`) override both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(default) if default.is_file() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };

        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| BridgeError::Configuration(format!("invalid config: {e}")))
    }

    /// Apply `MITM_*` overrides using `lookup` as the environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(command) = lookup("MITM_SERVER_COMMAND") {
            self.server.command = command;
        }
        if let Some(args) = lookup("MITM_SERVER_ARGS") {
            self.server.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(cwd) = lookup("MITM_SERVER_CWD") {
            self.server.cwd = Some(PathBuf::from(cwd));
        }
        if let Some(raw) = lookup("MITM_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = parse_env("MITM_REQUEST_TIMEOUT_SECS", &raw)?;
        }

        if let Some(raw) = lookup("MITM_ADVISOR") {
            self.advisor.kind = raw.parse().map_err(|_| {
                BridgeError::Configuration(format!(
                    "MITM_ADVISOR must be one of mock, open-ai-compatible, local; got '{raw}'"
                ))
            })?;
        }
        if let Some(url) = lookup("MITM_ADVISOR_URL") {
            self.advisor.base_url = Some(url);
        }
        if let Some(model) = lookup("MITM_ADVISOR_MODEL") {
            self.advisor.model = model;
        }
        if let Some(key) = lookup("MITM_ADVISOR_API_KEY") {
            self.advisor.api_key = Some(key);
        }
        if let Some(raw) = lookup("MITM_MAX_TOKENS") {
            self.advisor.max_tokens = parse_env("MITM_MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = lookup("MITM_TEMPERATURE") {
            self.advisor.temperature = parse_env("MITM_TEMPERATURE", &raw)?;
        }
        if let Some(raw) = lookup("MITM_ADVISOR_MAX_ATTEMPTS") {
            self.advisor.max_attempts = parse_env("MITM_ADVISOR_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("MITM_ADVISOR_BACKOFF_MS") {
            self.advisor.initial_backoff_ms = parse_env("MITM_ADVISOR_BACKOFF_MS", &raw)?;
        }

        if let Some(raw) = lookup("MITM_DISCOVERY_INTERVAL_SECS") {
            self.bridge.discovery_interval_secs = parse_env("MITM_DISCOVERY_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("MITM_HISTORY_CAPACITY") {
            self.bridge.history_capacity = parse_env("MITM_HISTORY_CAPACITY", &raw)?;
        }
        if let Some(level) = lookup("MITM_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.server.request_timeout_secs == 0 {
            return Err(BridgeError::Configuration(
                "server.request_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.bridge.history_capacity == 0 {
            return Err(BridgeError::Configuration(
                "bridge.history_capacity must be greater than zero".into(),
            ));
        }
        if self.advisor.max_attempts == 0 {
            return Err(BridgeError::Configuration(
                "advisor.max_attempts must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.advisor.temperature) {
            return Err(BridgeError::Configuration(format!(
                "advisor.temperature must be within 0.0..=2.0; got {}",
                self.advisor.temperature
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| BridgeError::Configuration(format!("{key} has invalid value '{raw}'")))
}

/// `~/.mitm/config.toml`, if a home directory can be resolved.
pub fn default_config_path() -> Option<PathBuf> {
    directories::UserDirs::new().map(|dirs| dirs.home_dir().join(".mitm").join("config.toml"))
}
