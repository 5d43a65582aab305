//! Configuration file support for research-review.
//!
//! # Configuration File Format
//!
//! ```toml
//! [api_keys]
//! elsevier = "your-elsevier-key"
//! elsevier_inst_token = "optional-inst-token"
//! wos = "your-wos-key"
//! semantic_scholar = "optional-key"
//!
//! [contact]
//! mailto = "you@example.org"
//!
//! [sources]
//! enabled = ["crossref", "scopus", "wos", "openalex", "semantic"]
//! limit = 50
//!
//! [retrieval]
//! adapter_timeout_secs = 60
//! max_topic_chars = 300
//! max_topic_words = 30
//! max_terms = 3
//!
//! [retry]
//! max_attempts = 4
//! initial_delay_ms = 1000
//! max_delay_ms = 16000
//! backoff_multiplier = 2.0
//!
//! [selection]
//! top_k = 12
//! embed_batch_size = 100
//!
//! [llm.primary]
//! name = "ollama"
//! base_url = "http://localhost:11434"
//! model = "gpt-oss"
//! temperature = 0.1
//!
//! [llm.secondary]
//! name = "openai"
//! base_url = "https://api.openai.com"
//! model = "gpt-5"
//!
//! [embedding]
//! name = "openai"
//! base_url = "https://api.openai.com"
//! model = "text-embedding-3-small"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "research-review.toml";

/// Find a configuration file in the standard locations
///
/// Checks `./research-review.toml`, then
/// `<config dir>/research-review/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("research-review").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Read a TOML configuration file without environment overrides
pub fn read_config_file(path: &Path) -> Result<Config, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

    toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
}

/// Write a configuration as TOML
///
/// API keys are left out so a saved file never carries secrets read from
/// the environment.
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[api_keys]
elsevier = "test-key"

[sources]
enabled = ["crossref", "semantic"]

[retrieval]
max_terms = 5

[logging]
level = "debug"
format = "json"
"#;

        let mut file = File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = read_config_file(&path).unwrap();

        assert_eq!(config.api_keys.elsevier, Some("test-key".to_string()));
        assert_eq!(config.sources.enabled, vec!["crossref", "semantic"]);
        assert_eq!(config.sources.limit, 50);
        assert_eq!(config.retrieval.max_terms, 5);
        assert_eq!(config.retrieval.max_topic_chars, 300);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.selection.top_k = 7;
        config.api_keys.wos = Some("secret".to_string());

        save_config(&config, &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("secret"));

        let loaded = read_config_file(&path).unwrap();
        assert_eq!(loaded.selection.top_k, 7);
        assert_eq!(loaded.llm.primary, config.llm.primary);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let path = PathBuf::from("/nonexistent/config.toml");
        let result = read_config_file(&path);
        assert!(matches!(result, Err(ConfigFileError::Io(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");

        std::fs::write(&path, "invalid = toml = content").unwrap();

        let result = read_config_file(&path);
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }
}
