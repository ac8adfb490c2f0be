//! Error types for multiquery

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No API key configured for {endpoint} (set {env_var})")]
    MissingCredential { endpoint: String, env_var: String },

    #[error("Request to {endpoint} timed out after {timeout_secs} seconds")]
    EndpointTimeout { endpoint: String, timeout_secs: u64 },

    #[error("Request to {endpoint} failed: {reason}")]
    EndpointRequest { endpoint: String, reason: String },

    #[error("No endpoints enabled. Set at least one provider API key (see --setup)")]
    NoEndpointsEnabled,

    #[error("No endpoint produced a usable response ({failed} failed)")]
    NoSuccessfulResponses { failed: usize },

    #[error("Judge {0} is not configured (missing API key)")]
    JudgeNotConfigured(String),

    #[error("Judge {judge} failed: {reason}")]
    JudgeRequest { judge: String, reason: String },

    #[error("Judge output is missing the {0} section")]
    MalformedJudgeOutput(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
