//! Configuration management for the anomtree CLI.

use anomtree::llm::{
    LlmBackend, LlmConfig, MockBackend, OllamaBackend, OpenAiBackend, Oracle,
    OLLAMA_DEFAULT_ENDPOINT,
};
use anomtree::runtime::export::{DEFAULT_CLASSIFIED_CSV, DEFAULT_TREE_JSON};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const CONFIG_FILE: &str = "anomtree.toml";

/// anomtree project configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub export: ExportConfig,

    /// Directory holding the config file; relative paths resolve against it.
    #[serde(skip)]
    project_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// `openai`, `ollama` or `mock`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Empty means the backend's default model.
    #[serde(default)]
    pub model: String,
    /// Empty means the backend's default endpoint.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_classified_csv")]
    pub classified_csv: String,
    #[serde(default = "default_tree_json")]
    pub tree_json: String,
}

fn default_base_path() -> String { "templates_storage".to_string() }
fn default_backend() -> String { "openai".to_string() }
fn default_max_tokens() -> u32 { 1024 }
fn default_timeout_secs() -> u32 { 60 }
fn default_classified_csv() -> String { DEFAULT_CLASSIFIED_CSV.to_string() }
fn default_tree_json() -> String { DEFAULT_TREE_JSON.to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: String::new(),
            endpoint: String::new(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            classified_csv: default_classified_csv(),
            tree_json: default_tree_json(),
        }
    }
}

impl Config {
    /// Load config from anomtree.toml in the current or parent directories.
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        debug!(path = %path.display(), "loading config");
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.project_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Save config to the specified path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.project_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Where the taxonomy lives.
    pub fn storage_path(&self) -> PathBuf {
        self.resolve(&self.storage.base_path)
    }

    /// Backend settings from `[oracle]`, on top of the backend's defaults.
    fn llm_config(&self, base: LlmConfig) -> LlmConfig {
        let cfg = &self.oracle;
        let llm = if cfg.model.is_empty() {
            base
        } else {
            base.with_model(cfg.model.clone())
        };
        llm.with_temperature(cfg.temperature)
            .with_max_tokens(cfg.max_tokens)
            .with_timeout(cfg.timeout_secs)
    }

    /// Build the oracle described by `[oracle]`.
    pub fn build_oracle(&self) -> Result<Oracle> {
        let cfg = &self.oracle;
        let backend: Arc<dyn LlmBackend> = match cfg.backend.to_ascii_lowercase().as_str() {
            "openai" => {
                let llm = self.llm_config(LlmConfig::openai());
                let backend = OpenAiBackend::from_env_with_config(llm)
                    .context("OPENAI_API_KEY must be set for the openai backend")?;
                if cfg.endpoint.is_empty() {
                    Arc::new(backend)
                } else {
                    Arc::new(backend.with_endpoint(&cfg.endpoint))
                }
            }
            "ollama" => {
                let endpoint = if cfg.endpoint.is_empty() {
                    OLLAMA_DEFAULT_ENDPOINT
                } else {
                    cfg.endpoint.as_str()
                };
                Arc::new(OllamaBackend::with_config(
                    endpoint,
                    self.llm_config(LlmConfig::ollama()),
                ))
            }
            "mock" => Arc::new(MockBackend::new()),
            other => bail!("Unknown oracle backend '{other}' (expected openai, ollama or mock)"),
        };
        let oracle = Oracle::new(backend);
        debug!(
            backend = oracle.backend_name(),
            model = oracle.model(),
            timeout_secs = oracle.timeout().as_secs(),
            "oracle configured"
        );
        Ok(oracle)
    }
}

/// Find anomtree.toml in current or parent directories.
pub fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("[oracle]\nbackend = \"ollama\"\n").unwrap();
        assert_eq!(config.oracle.backend, "ollama");
        assert_eq!(config.oracle.max_tokens, 1024);
        assert_eq!(config.storage.base_path, "templates_storage");
        assert_eq!(config.export.tree_json, DEFAULT_TREE_JSON);
    }

    #[test]
    fn test_save_and_load_resolves_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        Config::default().save(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.storage_path(), dir.path().join("templates_storage"));
    }

    #[test]
    fn test_ollama_uses_configured_settings() {
        let config: Config =
            toml::from_str("[oracle]\nbackend = \"ollama\"\ntimeout_secs = 10\n").unwrap();
        let oracle = config.build_oracle().unwrap();
        assert_eq!(oracle.backend_name(), "ollama");
        assert_eq!(oracle.timeout(), std::time::Duration::from_secs(10));
        assert_eq!(oracle.model(), LlmConfig::ollama().model);

        let config: Config =
            toml::from_str("[oracle]\nbackend = \"ollama\"\nmodel = \"qwen2.5\"\n").unwrap();
        assert_eq!(config.build_oracle().unwrap().model(), "qwen2.5");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = Config::default();
        config.oracle.backend = "carrier-pigeon".into();
        assert!(config.build_oracle().is_err());

        config.oracle.backend = "mock".into();
        assert_eq!(config.build_oracle().unwrap().backend_name(), "mock");
    }
}
