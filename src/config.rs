use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::BackendKind;
use crate::session::MAX_HISTORY_LENGTH;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of exchanges fed back to the backend as context
    pub max_history_length: usize,

    /// HTTP timeout for model and retriever calls, in seconds
    pub request_timeout_secs: u64,

    #[serde(deserialize_with = "openai_table")]
    pub openai: ModelProvider,
    #[serde(deserialize_with = "anthropic_table")]
    pub anthropic: ModelProvider,
    #[serde(deserialize_with = "flan_xl_table")]
    pub flan_xl: ModelProvider,
    #[serde(deserialize_with = "flan_xxl_table")]
    pub flan_xxl: ModelProvider,

    /// Document retrieval service
    pub retriever: RetrieverConfig,

    /// UI preferences
    pub ui: UiConfig,

    /// ragchat home directory
    #[serde(skip)]
    pub ragchat_home: PathBuf,
}

/// Connection settings for one answer-generation model
#[derive(Debug, Clone, Serialize)]
pub struct ModelProvider {
    pub name: String,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A provider table as written in the config file; keys left out keep
/// that provider's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProviderTable {
    name: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ProviderTable {
    fn merge_into(self, mut provider: ModelProvider) -> ModelProvider {
        if let Some(name) = self.name {
            provider.name = name;
        }
        if let Some(base_url) = self.base_url {
            provider.base_url = base_url;
        }
        if let Some(model) = self.model {
            provider.model = model;
        }
        if self.api_key.is_some() {
            provider.api_key = self.api_key;
        }
        if self.api_key_env.is_some() {
            provider.api_key_env = self.api_key_env;
        }
        if let Some(temperature) = self.temperature {
            provider.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            provider.max_tokens = max_tokens;
        }
        provider
    }
}

fn provider_table<'de, D>(deserializer: D, defaults: ModelProvider) -> Result<ModelProvider, D::Error>
where
    D: Deserializer<'de>,
{
    ProviderTable::deserialize(deserializer).map(|table| table.merge_into(defaults))
}

fn openai_table<'de, D: Deserializer<'de>>(d: D) -> Result<ModelProvider, D::Error> {
    provider_table(d, ModelProvider::openai())
}

fn anthropic_table<'de, D: Deserializer<'de>>(d: D) -> Result<ModelProvider, D::Error> {
    provider_table(d, ModelProvider::anthropic())
}

fn flan_xl_table<'de, D: Deserializer<'de>>(d: D) -> Result<ModelProvider, D::Error> {
    provider_table(d, ModelProvider::flan("flan-xl", "huggingface-text2text-flan-t5-xl", "FLAN_XL_API_KEY"))
}

fn flan_xxl_table<'de, D: Deserializer<'de>>(d: D) -> Result<ModelProvider, D::Error> {
    provider_table(d, ModelProvider::flan("flan-xxl", "huggingface-text2text-flan-t5-xxl", "FLAN_XXL_API_KEY"))
}

/// Retrieval service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub top_k: usize,
}

/// UI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Whether source lists start expanded
    pub show_sources: bool,
}

const DEFAULT_MAX_TOKENS: u32 = 512;

fn default_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ragchat"))
}

impl ModelProvider {
    fn openai() -> Self {
        Self {
            name: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    fn anthropic() -> Self {
        Self {
            name: "anthropic".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Flan endpoints have no public default and must be configured
    fn flan(name: &str, model: &str, api_key_env: &str) -> Self {
        Self {
            name: name.to_string(),
            base_url: String::new(),
            model: model.to_string(),
            api_key: None,
            api_key_env: Some(api_key_env.to_string()),
            temperature: 1e-10,
            max_tokens: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_history_length: MAX_HISTORY_LENGTH,
            request_timeout_secs: 60,
            openai: ModelProvider::openai(),
            anthropic: ModelProvider::anthropic(),
            flan_xl: ModelProvider::flan(
                "flan-xl",
                "huggingface-text2text-flan-t5-xl",
                "FLAN_XL_API_KEY",
            ),
            flan_xxl: ModelProvider::flan(
                "flan-xxl",
                "huggingface-text2text-flan-t5-xxl",
                "FLAN_XXL_API_KEY",
            ),
            retriever: RetrieverConfig::default(),
            ui: UiConfig::default(),
            ragchat_home: default_home().unwrap_or_default(),
        }
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            api_key_env: Some("RETRIEVER_API_KEY".to_string()),
            top_k: 3,
        }
    }
}

impl Config {
    /// Load configuration from `~/.ragchat/config.toml`, writing the
    /// defaults there on first run. An explicit path must exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load_from(path);
        }
        Self::load_home(default_home())
    }

    fn load_home(ragchat_home: Option<PathBuf>) -> Result<Self> {
        let ragchat_home = ragchat_home.context("Failed to find home directory")?;
        fs::create_dir_all(&ragchat_home)
            .context("Failed to create .ragchat directory")?;

        let config_path = ragchat_home.join("config.toml");
        if config_path.exists() {
            let mut config = Self::load_from(&config_path)?;
            config.ragchat_home = ragchat_home;
            Ok(config)
        } else {
            let config = Config {
                ragchat_home,
                ..Config::default()
            };
            config.save(&config_path)?;
            Ok(config)
        }
    }

    /// Parse a config file without touching the home directory
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(path, content)
            .context("Failed to write config file")?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_history_length == 0 {
            anyhow::bail!("max_history_length must be at least 1");
        }
        if self.retriever.enabled && self.retriever.endpoint.is_none() {
            anyhow::bail!("retriever.endpoint is required when the retriever is enabled");
        }
        Ok(())
    }

    /// Model settings for a backend
    pub fn provider(&self, kind: BackendKind) -> &ModelProvider {
        match kind {
            BackendKind::OpenAi => &self.openai,
            BackendKind::Anthropic => &self.anthropic,
            BackendKind::FlanXl => &self.flan_xl,
            BackendKind::FlanXxl => &self.flan_xxl,
        }
    }

    /// Log file used while the TUI owns the terminal
    pub fn log_path(&self) -> PathBuf {
        self.ragchat_home.join("ragchat.log")
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

impl ModelProvider {
    /// Get API key from config or environment
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| self.api_key_env.as_ref().and_then(|var| std::env::var(var).ok()))
            .filter(|key| !key.trim().is_empty())
    }
}

impl RetrieverConfig {
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| self.api_key_env.as_ref().and_then(|var| std::env::var(var).ok()))
            .filter(|key| !key.trim().is_empty())
    }
}
