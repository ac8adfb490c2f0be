//! Configuration management for multiquery

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{QueryError, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, accurate, and comprehensive AI assistant. \
Provide detailed, well-structured responses that directly address the user's query.";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// System prompt sent with every endpoint request
    pub system_prompt: String,

    /// Terminal output preferences
    pub display: DisplayConfig,

    /// Endpoint that evaluates and merges the responses
    pub judge: EndpointConfig,

    /// Endpoints queried for every prompt, in presentation order
    pub endpoints: Vec<EndpointConfig>,
}

/// Wire format spoken by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions (also xAI and other compatible APIs)
    OpenAi,
    Anthropic,
    Google,
    Cohere,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::Google => "https://generativelanguage.googleapis.com/v1beta",
            ProviderKind::Cohere => "https://api.cohere.ai/v1",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Display name, also used to label the response for the judge
    pub name: String,

    /// API flavour
    pub provider: ProviderKind,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Model to use
    pub model: String,

    /// Override for the provider's API root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Max tokens for responses
    pub max_tokens: u32,

    /// Temperature setting
    pub temperature: f32,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl EndpointConfig {
    pub fn new(name: &str, provider: ProviderKind, api_key_env: &str, model: &str) -> Self {
        Self {
            name: name.to_string(),
            provider,
            api_key_env: api_key_env.to_string(),
            model: model.to_string(),
            base_url: None,
            max_tokens: 4000,
            temperature: 0.7,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// API root without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(QueryError::Config("endpoint name must not be empty".into()));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(QueryError::Config(format!(
                "{}: api_key_env must not be empty",
                self.name
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(QueryError::Config(format!(
                "{}: temperature {} outside 0.0..=2.0",
                self.name, self.temperature
            )));
        }
        if self.max_tokens == 0 || self.timeout_secs == 0 {
            return Err(QueryError::Config(format!(
                "{}: max_tokens and timeout_secs must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Columns of each individual response shown before truncating
    pub preview_width: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { preview_width: 500 }
    }
}

impl Default for Config {
    fn default() -> Self {
        use ProviderKind::*;

        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            display: DisplayConfig::default(),
            judge: EndpointConfig::new(
                "OpenAI GPT-4 Judge",
                OpenAi,
                "OPENAI_API_KEY",
                "gpt-4-turbo-preview",
            )
            .with_temperature(0.3),
            endpoints: vec![
                EndpointConfig::new("OpenAI GPT-4", OpenAi, "OPENAI_API_KEY", "gpt-4-turbo-preview"),
                EndpointConfig::new(
                    "Anthropic Claude",
                    Anthropic,
                    "ANTHROPIC_API_KEY",
                    "claude-3-sonnet-20240229",
                ),
                EndpointConfig::new("Google Gemini", Google, "GOOGLE_API_KEY", "gemini-pro"),
                EndpointConfig::new("Cohere Command", Cohere, "COHERE_API_KEY", "command-r-plus"),
                EndpointConfig::new("OpenAI GPT-3.5", OpenAi, "OPENAI_API_KEY", "gpt-3.5-turbo"),
                EndpointConfig::new("xAI Grok", OpenAi, "GROK_API_KEY", "grok-beta")
                    .with_base_url("https://api.x.ai/v1"),
            ],
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults when it does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path(),
        };

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %config_path.display(), "loaded config");
            config
        } else if path.is_some() {
            return Err(QueryError::Config(format!(
                "config file {} does not exist",
                config_path.display()
            )));
        } else {
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("multiquery")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        self.judge.validate()?;
        let mut seen = std::collections::HashSet::new();
        for endpoint in &self.endpoints {
            endpoint.validate()?;
            if !seen.insert(endpoint.name.as_str()) {
                return Err(QueryError::Config(format!(
                    "duplicate endpoint name: {}",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }

    /// Every credential variable the config refers to, judge included
    pub fn credential_vars(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = Vec::new();
        for endpoint in self.endpoints.iter().chain(std::iter::once(&self.judge)) {
            if !vars.contains(&endpoint.api_key_env.as_str()) {
                vars.push(&endpoint.api_key_env);
            }
        }
        vars
    }

    /// Endpoints whose credential is present, in configuration order
    pub fn enabled_endpoints(&self, credentials: &Credentials) -> Vec<ResolvedEndpoint> {
        self.endpoints
            .iter()
            .filter_map(|endpoint| match credentials.resolve(endpoint) {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    tracing::warn!("skipping endpoint: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn judge_endpoint(&self, credentials: &Credentials) -> Result<ResolvedEndpoint> {
        credentials
            .resolve(&self.judge)
            .map_err(|_| QueryError::JudgeNotConfigured(self.judge.name.clone()))
    }
}

/// Snapshot of API keys, keyed by environment variable name
#[derive(Debug, Default)]
pub struct Credentials {
    keys: HashMap<String, SecretString>,
}

impl Credentials {
    /// Read every variable the config names from the process environment
    pub fn from_env(config: &Config) -> Self {
        config
            .credential_vars()
            .into_iter()
            .fold(Self::default(), |creds, var| match std::env::var(var) {
                Ok(value) => creds.with(var, value),
                Err(_) => creds,
            })
    }

    /// Add a key; blank values count as absent
    pub fn with(mut self, var: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.keys.insert(var.to_string(), SecretString::from(value));
        }
        self
    }

    pub fn is_set(&self, var: &str) -> bool {
        self.keys.contains_key(var)
    }

    pub fn resolve(&self, endpoint: &EndpointConfig) -> Result<ResolvedEndpoint> {
        let key = self
            .keys
            .get(&endpoint.api_key_env)
            .ok_or_else(|| QueryError::MissingCredential {
                endpoint: endpoint.name.clone(),
                env_var: endpoint.api_key_env.clone(),
            })?;

        Ok(ResolvedEndpoint {
            config: endpoint.clone(),
            api_key: SecretString::from(key.expose_secret().to_string()),
        })
    }
}

/// An endpoint paired with its API key, ready to build a provider from
#[derive(Debug)]
pub struct ResolvedEndpoint {
    pub config: EndpointConfig,
    pub api_key: SecretString,
}
