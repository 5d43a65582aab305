//! Configuration management.
//!
//! Settings come from built-in defaults, an optional TOML file and
//! `RESEARCH_REVIEW_*` environment variables, in increasing precedence.
//! Nested keys use a double underscore: `RESEARCH_REVIEW_SELECTION__TOP_K=20`.

mod file_config;

pub use file_config::{
    find_config_file, read_config_file, save_config, ConfigFileError, CONFIG_FILE_NAME,
};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::RetryConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API keys for licensed providers
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Contact details sent to polite-pool providers
    #[serde(default)]
    pub contact: ContactConfig,

    /// Which sources take part, in order
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Retry policy applied to every provider page request
    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub selection: SelectionConfig,

    /// Text-generation services
    #[serde(default)]
    pub llm: LlmConfig,

    /// Embedding service
    #[serde(default = "ServiceConfig::default_embedding")]
    pub embedding: ServiceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_keys: ApiKeys::default(),
            contact: ContactConfig::default(),
            sources: SourcesConfig::default(),
            retrieval: RetrievalConfig::default(),
            retry: RetrySettings::default(),
            selection: SelectionConfig::default(),
            llm: LlmConfig::default(),
            embedding: ServiceConfig::default_embedding(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// A copy with every API key removed, safe to print or save
    pub fn redacted(&self) -> Config {
        let mut redacted = self.clone();
        redacted.api_keys.elsevier = None;
        redacted.api_keys.elsevier_inst_token = None;
        redacted.api_keys.wos = None;
        redacted.api_keys.semantic_scholar = None;
        redacted.llm.primary.api_key = None;
        if let Some(secondary) = redacted.llm.secondary.as_mut() {
            secondary.api_key = None;
        }
        redacted.embedding.api_key = None;
        redacted
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Elsevier (Scopus) API key
    #[serde(default = "default_elsevier_key")]
    pub elsevier: Option<String>,

    /// Elsevier institutional token (optional)
    #[serde(default = "default_elsevier_inst_token")]
    pub elsevier_inst_token: Option<String>,

    /// Clarivate Web of Science API key
    #[serde(default = "default_wos_key")]
    pub wos: Option<String>,

    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default = "default_semantic_scholar_key")]
    pub semantic_scholar: Option<String>,
}

fn default_elsevier_key() -> Option<String> {
    env_var("ELSEVIER_API_KEY")
}

fn default_elsevier_inst_token() -> Option<String> {
    env_var("ELSEVIER_INST_TOKEN")
}

fn default_wos_key() -> Option<String> {
    env_var("WOS_API_KEY")
}

fn default_semantic_scholar_key() -> Option<String> {
    env_var("SEMANTIC_SCHOLAR_API_KEY")
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            elsevier: default_elsevier_key(),
            elsevier_inst_token: default_elsevier_inst_token(),
            wos: default_wos_key(),
            semantic_scholar: default_semantic_scholar_key(),
        }
    }
}

/// Contact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Address for the Crossref and OpenAlex polite pools
    #[serde(default = "default_mailto")]
    pub mailto: Option<String>,
}

fn default_mailto() -> Option<String> {
    env_var("CROSSREF_MAILTO").or_else(|| env_var("OPENALEX_EMAIL"))
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            mailto: default_mailto(),
        }
    }
}

/// Source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Enabled source ids, in output order
    #[serde(default = "default_enabled_sources")]
    pub enabled: Vec<String>,

    /// Maximum records fetched per source and query
    #[serde(default = "default_source_limit")]
    pub limit: usize,
}

fn default_enabled_sources() -> Vec<String> {
    ["crossref", "scopus", "wos", "openalex", "semantic"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_source_limit() -> usize {
    50
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_sources(),
            limit: default_source_limit(),
        }
    }
}

/// Retrieval fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Upper bound for one source's fetch, retries included
    #[serde(default = "default_adapter_timeout")]
    pub adapter_timeout_secs: u64,

    /// Topics longer than this trigger term generation
    #[serde(default = "default_max_topic_chars")]
    pub max_topic_chars: usize,

    /// Topics with more words than this trigger term generation
    #[serde(default = "default_max_topic_words")]
    pub max_topic_words: usize,

    /// Maximum generated alternative queries
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,
}

fn default_adapter_timeout() -> u64 {
    60
}

fn default_max_topic_chars() -> usize {
    300
}

fn default_max_topic_words() -> usize {
    30
}

fn default_max_terms() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: default_adapter_timeout(),
            max_topic_chars: default_max_topic_chars(),
            max_topic_words: default_max_topic_words(),
            max_terms: default_max_terms(),
        }
    }
}

impl RetrievalConfig {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

/// Retry policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    16_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetrySettings {
    /// Runtime retry policy
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: sane_multiplier(self.backoff_multiplier),
            ..RetryConfig::default()
        }
    }
}

// Anything below 1.0 or non-finite would shrink or break the backoff.
fn sane_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier >= 1.0 {
        multiplier
    } else {
        default_backoff_multiplier()
    }
}

/// Relevance selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Records passed to the generation step
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Texts per embedding request
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

fn default_top_k() -> usize {
    12
}

fn default_embed_batch_size() -> usize {
    100
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

/// Generation service chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Tried first
    #[serde(default = "ServiceConfig::default_primary")]
    pub primary: ServiceConfig,

    /// Tried when the primary fails
    #[serde(default = "default_secondary")]
    pub secondary: Option<ServiceConfig>,
}

fn default_secondary() -> Option<ServiceConfig> {
    Some(ServiceConfig::default_secondary())
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary: ServiceConfig::default_primary(),
            secondary: default_secondary(),
        }
    }
}

/// One OpenAI-compatible HTTP service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Name used in logs and in `generated_by`
    pub name: String,

    /// Service root, without the `/v1` suffix
    pub base_url: String,

    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,

    /// Sampling temperature; omitted from requests when unset
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_service_timeout() -> u64 {
    120
}

impl ServiceConfig {
    /// Local Ollama server
    pub fn default_primary() -> Self {
        Self {
            name: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "gpt-oss".to_string(),
            api_key: None,
            timeout_secs: 300,
            temperature: Some(0.1),
        }
    }

    /// OpenAI chat completions
    pub fn default_secondary() -> Self {
        Self {
            name: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-5".to_string(),
            api_key: None,
            timeout_secs: default_service_timeout(),
            temperature: None,
        }
    }

    /// OpenAI embeddings
    pub fn default_embedding() -> Self {
        Self {
            name: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            timeout_secs: 60,
            temperature: None,
        }
    }

    /// Configured key, falling back to `OPENAI_API_KEY` for OpenAI endpoints
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                if self.base_url.contains("api.openai.com") {
                    env_var("OPENAI_API_KEY")
                } else {
                    None
                }
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("RESEARCH_REVIEW")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("sources.enabled")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

/// Get the default configuration (from env vars or defaults)
pub fn get_config() -> Config {
    Config::default()
}
