use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::types::is_valid_language_code;

/// Application configuration module
/// This module handles loading, validating and saving the configuration.
/// Environment overrides are applied once, right after loading.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Subtitle tool server
    #[serde(default)]
    pub tool_server: ToolServerConfig,

    /// Title catalog lookup
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Languages and output location
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Run metrics
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// How the tool server is reached
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolServerMode {
    // @mode: POST to an HTTP endpoint
    Http,
    // @mode: JSON-RPC over a child process's stdio
    #[default]
    Stdio,
}

impl std::fmt::Display for ToolServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Stdio => write!(f, "stdio"),
        }
    }
}

impl std::str::FromStr for ToolServerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "stdio" => Ok(Self::Stdio),
            _ => Err(anyhow!("Invalid tool server mode: {}", s)),
        }
    }
}

/// Subtitle tool server configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToolServerConfig {
    #[serde(default)]
    pub mode: ToolServerMode,

    /// Base URL of the HTTP variant
    #[serde(default)]
    pub base_url: String,

    /// Path of the tool call endpoint, joined to `base_url`
    #[serde(default = "default_call_path")]
    pub call_path: String,

    /// Bearer token for the HTTP variant
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Command launching the stdio server
    #[serde(default = "default_tool_command")]
    pub command: String,

    #[serde(default = "default_tool_args")]
    pub args: Vec<String>,

    /// Extra environment for the child process
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Environment variables with this prefix are passed to the child, prefix stripped
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Per-call timeout in seconds; defaults depend on the mode
    #[serde(default)]
    pub timeout_secs: Option<f64>,

    #[serde(default = "default_search_tool")]
    pub search_tool: String,

    #[serde(default = "default_download_tool")]
    pub download_tool: String,
}

impl ToolServerConfig {
    /// Effective per-call timeout
    pub fn timeout(&self) -> Duration {
        let default = match self.mode {
            ToolServerMode::Http => default_http_timeout_secs(),
            ToolServerMode::Stdio => default_stdio_timeout_secs(),
        };
        let secs = self.timeout_secs.unwrap_or(default);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::from_secs_f64(default))
    }
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            mode: ToolServerMode::default(),
            base_url: String::new(),
            call_path: default_call_path(),
            auth_token: None,
            command: default_tool_command(),
            args: default_tool_args(),
            env: BTreeMap::new(),
            env_prefix: default_env_prefix(),
            timeout_secs: None,
            search_tool: default_search_tool(),
            download_tool: default_download_tool(),
        }
    }
}

/// Title catalog (IMDb) lookup configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CatalogConfig {
    /// Resolve catalog ids before searching
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_tool_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default = "default_catalog_tool")]
    pub tool_name: String,

    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: f64,

    /// Pauses before each protocol message, for servers behind a slow proxy
    #[serde(default = "default_stdin_delays_ms")]
    pub stdin_delays_ms: Vec<u64>,
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or(Duration::from_secs_f64(default_catalog_timeout_secs()))
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_tool_command(),
            args: Vec::new(),
            env: BTreeMap::new(),
            tool_name: default_catalog_tool(),
            timeout_secs: default_catalog_timeout_secs(),
            stdin_delays_ms: default_stdin_delays_ms(),
        }
    }
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: OpenAI chat completions
    #[default]
    OpenAI,
    // @provider: Offline mock, marks text as translated
    Mock,
    // @provider: Translation disabled
    None,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Mock => "Mock",
            Self::None => "None",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Mock => "mock".to_string(),
            Self::None => "none".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "mock" => Ok(Self::Mock),
            "none" | "" => Ok(Self::None),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// API key for the service
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model name (e.g., "gpt-4o-mini")
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Service endpoint URL
    #[serde(default = "default_openai_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Prompt template file; the built-in template is used when unset
    #[serde(default)]
    pub prompt_path: Option<PathBuf>,

    /// Subtitle entries per LLM call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            api_key: String::new(),
            model: default_openai_model(),
            endpoint: default_openai_endpoint(),
            timeout_secs: default_translation_timeout_secs(),
            temperature: default_temperature(),
            prompt_path: None,
            batch_size: default_batch_size(),
        }
    }
}

/// Languages and output location of pipeline runs
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_preferred_language")]
    pub preferred_language: String,

    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,

    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preferred_language: default_preferred_language(),
            fallback_language: default_fallback_language(),
            storage_dir: default_storage_dir(),
        }
    }
}

/// Run metrics configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// JSON Lines file receiving events
    #[serde(default = "default_metrics_path")]
    pub path: PathBuf,

    #[serde(default = "default_experiment")]
    pub experiment: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_metrics_path(),
            experiment: default_experiment(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_call_path() -> String {
    "/tools/call".to_string()
}

fn default_tool_command() -> String {
    "npx".to_string()
}

fn default_tool_args() -> Vec<String> {
    vec!["-y".to_string(), "@opensubtitles/mcp-server".to_string()]
}

fn default_env_prefix() -> String {
    "MCP_OPENSUBTITLES_ENV_".to_string()
}

fn default_http_timeout_secs() -> f64 {
    30.0
}

fn default_stdio_timeout_secs() -> f64 {
    10.0
}

fn default_search_tool() -> String {
    crate::tools::opensubtitles::DEFAULT_SEARCH_TOOL.to_string()
}

fn default_download_tool() -> String {
    crate::tools::opensubtitles::DEFAULT_DOWNLOAD_TOOL.to_string()
}

fn default_catalog_tool() -> String {
    crate::tools::catalog::DEFAULT_CATALOG_TOOL.to_string()
}

fn default_catalog_timeout_secs() -> f64 {
    30.0
}

fn default_stdin_delays_ms() -> Vec<u64> {
    vec![2000, 1000, 500]
}

fn default_openai_model() -> String {
    crate::providers::openai::DEFAULT_MODEL.to_string()
}

fn default_openai_endpoint() -> String {
    crate::providers::openai::DEFAULT_ENDPOINT.to_string()
}

fn default_translation_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.2
}

fn default_batch_size() -> usize {
    crate::translation::batch::DEFAULT_BATCH_SIZE
}

fn default_preferred_language() -> String {
    crate::pipeline::orchestrator::DEFAULT_PREFERRED_LANGUAGE.to_string()
}

fn default_fallback_language() -> String {
    crate::pipeline::orchestrator::DEFAULT_FALLBACK_LANGUAGE.to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(crate::pipeline::orchestrator::DEFAULT_STORAGE_DIR)
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("data/metrics/runs.jsonl")
}

fn default_experiment() -> String {
    "subtitle-pipeline".to_string()
}

/// Split a comma separated list, dropping empty parts
pub fn split_args(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Load configuration from a JSON file, writing defaults if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        log::warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        self.apply_env(&vars)
    }

    /// Apply overrides from an environment snapshot
    pub fn apply_env(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());

        // Tool server
        if let Some(mode) = get("MCP_OPENSUBTITLES_MODE") {
            self.tool_server.mode = mode.parse()?;
        }
        if let Some(url) = get("MCP_OPENSUBTITLES_URL") {
            self.tool_server.base_url = url;
        }
        if let Some(path) = get("MCP_OPENSUBTITLES_CALL_PATH") {
            self.tool_server.call_path = path;
        }
        if let Some(token) = get("MCP_OPENSUBTITLES_AUTH_TOKEN") {
            self.tool_server.auth_token = (!token.is_empty()).then_some(token);
        }
        if let Some(command) = get("MCP_OPENSUBTITLES_COMMAND") {
            self.tool_server.command = command;
        }
        if let Some(args) = get("MCP_OPENSUBTITLES_ARGS") {
            self.tool_server.args = split_args(&args);
        }
        if let Some(tool) = get("MCP_OPENSUBTITLES_TOOL_SEARCH") {
            self.tool_server.search_tool = tool;
        }
        if let Some(tool) = get("MCP_OPENSUBTITLES_TOOL_DOWNLOAD") {
            self.tool_server.download_tool = tool;
        }
        if let Some(timeout) = get("MCP_OPENSUBTITLES_TIMEOUT_S") {
            let secs: f64 = timeout
                .parse()
                .with_context(|| format!("Invalid MCP_OPENSUBTITLES_TIMEOUT_S: {}", timeout))?;
            self.tool_server.timeout_secs = Some(secs);
        }
        let prefix = self.tool_server.env_prefix.clone();
        if !prefix.is_empty() {
            for (key, value) in vars {
                if let Some(name) = key.strip_prefix(&prefix) {
                    if !name.is_empty() {
                        self.tool_server.env.insert(name.to_string(), value.clone());
                    }
                }
            }
        }

        // Translation
        if let Some(provider) = get("TRANSLATION_PROVIDER") {
            self.translation.provider = provider.parse()?;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.translation.api_key = key;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            self.translation.model = model;
        }
        if let Some(path) = get("PROMPT_TRANSLATE_SRT") {
            self.translation.prompt_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        // Pipeline
        if let Some(dir) = get("SUBTITLE_STORAGE_DIR") {
            self.pipeline.storage_dir = PathBuf::from(dir);
        }

        // Catalog; naming a command turns the lookup on
        if let Some(command) = get("IMDB_MCP_COMMAND") {
            self.catalog.enabled = !command.is_empty();
            self.catalog.command = command;
        }
        if let Some(args) = get("IMDB_MCP_ARGS") {
            self.catalog.args = split_args(&args);
        }
        if let Some(timeout) = get("IMDB_MCP_TIMEOUT_S") {
            self.catalog.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid IMDB_MCP_TIMEOUT_S: {}", timeout))?;
        }

        // Metrics
        if let Some(path) = get("METRICS_PATH") {
            self.metrics.enabled = !path.is_empty();
            self.metrics.path = PathBuf::from(path);
        }

        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        match self.tool_server.mode {
            ToolServerMode::Stdio => {
                if self.tool_server.command.trim().is_empty() {
                    return Err(anyhow!("Tool server command is required in stdio mode"));
                }
            }
            ToolServerMode::Http => {
                url::Url::parse(&self.tool_server.base_url).with_context(|| {
                    format!("Invalid tool server base URL: '{}'", self.tool_server.base_url)
                })?;
            }
        }
        if let Some(secs) = self.tool_server.timeout_secs {
            validate_timeout("tool server timeout", secs)?;
        }

        if self.catalog.enabled {
            if self.catalog.command.trim().is_empty() {
                return Err(anyhow!("Catalog command is required when the catalog is enabled"));
            }
            validate_timeout("catalog timeout", self.catalog.timeout_secs)?;
        }

        if self.translation.timeout_secs == 0 {
            return Err(anyhow!("Translation timeout must be positive"));
        }
        if self.translation.batch_size == 0 {
            return Err(anyhow!("Translation batch size must be at least 1"));
        }

        for (name, code) in [
            ("preferred", &self.pipeline.preferred_language),
            ("fallback", &self.pipeline.fallback_language),
        ] {
            if !is_valid_language_code(code) {
                return Err(anyhow!("Invalid {} language code: '{}'", name, code));
            }
        }

        Ok(())
    }
}

fn validate_timeout(name: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("{} must be a positive number of seconds, got {}", name, secs));
    }
    Ok(())
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            tool_server: ToolServerConfig::default(),
            catalog: CatalogConfig::default(),
            translation: TranslationConfig::default(),
            pipeline: PipelineConfig::default(),
            metrics: MetricsConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
