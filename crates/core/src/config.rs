//! Configuration management for Waypoint.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.waypoint/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win. Nothing here is persisted back to disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "claude"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .waypoint/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Primary generation provider (e.g., "ollama", "openai", "claude")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// Explicit API key for the primary provider
    pub api_key: Option<String>,

    /// Provider used for the service-level fallback request
    pub fallback_provider: Option<String>,

    /// Endpoint override for the fallback provider
    pub fallback_endpoint: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit JSON log lines
    pub log_json: bool,

    /// Provider configurations from config.yaml
    pub llm: Option<LlmConfig>,

    /// Chunking and retrieval settings
    pub retrieval: RetrievalSettings,

    /// Plan cache settings
    pub cache: CacheSettings,

    /// Generation call settings
    pub generation: GenerationSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "fallbackProvider", default)]
    pub fallback_provider: Option<String>,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
///
/// The provider kind comes from the map key in `llm.providers`, so a single
/// shape covers every provider; fields a provider does not use are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: String,

    #[serde(default)]
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(rename = "apiKeyEnv", default)]
    pub api_key_env: Option<String>,

    /// Anthropic API version header
    #[serde(rename = "apiVersion", default)]
    pub api_version: Option<String>,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Chunking and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalSettings {
    /// Advisory maximum fragment length in characters
    #[serde(rename = "chunkSize", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap budget; `overlap / 10` trailing words are carried forward
    #[serde(rename = "chunkOverlap", default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Fragments retrieved per plan request
    #[serde(rename = "topK", default = "default_top_k")]
    pub top_k: usize,

    /// Embedding dimensionality
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Embedder kind: "char-bag" (deterministic, offline) or "ollama"
    #[serde(default = "default_embedder")]
    pub embedder: String,

    /// Model for service-backed embedders
    #[serde(rename = "embeddingModel", default)]
    pub embedding_model: Option<String>,

    /// Endpoint for service-backed embedders
    #[serde(rename = "embeddingEndpoint", default)]
    pub embedding_endpoint: Option<String>,
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_top_k() -> usize {
    10
}

fn default_dimensions() -> usize {
    128
}

fn default_embedder() -> String {
    "char-bag".to_string()
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            dimensions: default_dimensions(),
            embedder: default_embedder(),
            embedding_model: None,
            embedding_endpoint: None,
        }
    }
}

/// Plan cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSettings {
    #[serde(rename = "maxEntries", default = "default_max_entries")]
    pub max_entries: usize,

    #[serde(rename = "ttlSecs", default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(rename = "sweepIntervalSecs", default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_entries() -> usize {
    100
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Generation call settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    /// Upper bound on the primary generation call
    #[serde(rename = "timeoutSecs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "maxTokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    retrieval: Option<RetrievalSettings>,
    cache: Option<CacheSettings>,
    generation: Option<GenerationSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            fallback_provider: None,
            fallback_endpoint: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
            retrieval: RetrievalSettings::default(),
            cache: CacheSettings::default(),
            generation: GenerationSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `WAYPOINT_WORKSPACE`: Override workspace path
    /// - `WAYPOINT_CONFIG`: Path to config file
    /// - `WAYPOINT_PROVIDER`: Primary provider
    /// - `WAYPOINT_MODEL`: Model identifier
    /// - `WAYPOINT_API_KEY`: API key for the primary provider
    /// - `WAYPOINT_FALLBACK_ENDPOINT`: Endpoint of the fallback completion service
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use waypoint_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("WAYPOINT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("WAYPOINT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.waypoint_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("WAYPOINT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("WAYPOINT_MODEL") {
            config.model = model;
        }

        if let Ok(endpoint) = std::env::var("WAYPOINT_FALLBACK_ENDPOINT") {
            config.fallback_endpoint = Some(endpoint);
        }

        config.api_key = std::env::var("WAYPOINT_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        if let Some(cache) = config_file.cache {
            result.cache = cache;
        }

        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model.clone();
            }

            if llm.fallback_provider.is_some() {
                result.fallback_provider = llm.fallback_provider.clone();
            }

            result.llm = Some(llm);
        }

        tracing::debug!("Merged configuration from {:?}", path);

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .waypoint directory.
    pub fn waypoint_dir(&self) -> PathBuf {
        self.workspace.join(".waypoint")
    }

    /// Get a provider's configuration block, if the config file declared one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint for a provider from its config block.
    pub fn provider_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint.clone())
    }

    /// Model for a provider: its config block, else the global model.
    pub fn provider_model(&self, provider: &str) -> String {
        self.get_provider_config(provider)
            .map(|pc| pc.model.clone())
            .unwrap_or_else(|| self.model.clone())
    }

    /// Resolve an API key for a provider.
    ///
    /// `WAYPOINT_API_KEY` applies to the primary provider only; other
    /// providers read the variable named by their `apiKeyEnv`.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if provider == self.provider {
            if let Some(ref key) = self.api_key {
                return Some(key.clone());
            }
        }

        self.get_provider_config(provider)
            .and_then(|pc| pc.api_key_env.as_deref())
            .and_then(|env_var| std::env::var(env_var).ok())
    }

    /// Validate configuration for the primary and fallback providers.
    pub fn validate(&self) -> AppResult<()> {
        self.validate_provider(&self.provider)?;

        if let Some(ref fallback) = self.fallback_provider {
            self.validate_provider(fallback)?;
        }

        if self.retrieval.dimensions == 0 {
            return Err(AppError::Config(
                "retrieval.dimensions must be greater than zero".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config(
                "retrieval.topK must be greater than zero".to_string(),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(AppError::Config(
                "cache.maxEntries must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_provider(&self, provider: &str) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        let explicit_key = provider == self.provider && self.api_key.is_some();

        if let Some(env_var) = self
            .get_provider_config(provider)
            .and_then(|pc| pc.api_key_env.as_deref())
        {
            if !explicit_key && std::env::var(env_var).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    env_var
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, yaml: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.retrieval.chunk_size, 500);
        assert_eq!(config.retrieval.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.dimensions, 128);
        assert_eq!(config.retrieval.embedder, "char-bag");
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.sweep_interval_secs, 60);
        assert!(!config.verbose);
    }

    #[test]
    fn test_waypoint_dir() {
        let config = AppConfig::default();
        assert!(config.waypoint_dir().ends_with(".waypoint"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
            true,
        );

        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
        assert!(config.verbose);
        assert!(config.log_json);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
llm:
  activeProvider: ollama
  fallbackProvider: openai
  providers:
    ollama:
      endpoint: http://localhost:11434
      model: qwen2.5
      timeout: 20
    openai:
      apiKeyEnv: WAYPOINT_TEST_OPENAI_KEY
      model: gpt-4o-mini
      endpoint: http://localhost:8080
retrieval:
  chunkSize: 300
  topK: 4
cache:
  ttlSecs: 10
logging:
  level: debug
  color: false
"#,
        );

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "qwen2.5");
        assert_eq!(config.fallback_provider.as_deref(), Some("openai"));
        assert_eq!(config.retrieval.chunk_size, 300);
        assert_eq!(config.retrieval.top_k, 4);
        // Omitted fields keep their defaults
        assert_eq!(config.retrieval.chunk_overlap, 50);
        assert_eq!(config.cache.ttl_secs, 10);
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(config.no_color);
        assert_eq!(
            config.provider_endpoint("openai").as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(config.provider_model("openai"), "gpt-4o-mini");
    }

    #[test]
    fn test_merge_yaml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "retrieval: [not, a, map]");
        assert!(AppConfig::default().merge_yaml(&path).is_err());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_missing_key_env() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
llm:
  activeProvider: claude
  providers:
    claude:
      apiKeyEnv: WAYPOINT_TEST_KEY_THAT_IS_NEVER_SET
      model: claude-sonnet
"#,
        );
        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert!(config.validate().is_err());

        let mut with_key = config.clone();
        with_key.api_key = Some("sk-test".to_string());
        assert!(with_key.validate().is_ok());
        assert_eq!(with_key.resolve_api_key("claude").as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_validate_zero_top_k() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }
}
