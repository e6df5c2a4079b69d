//! Error types for the tool layer

use std::path::PathBuf;
use thiserror::Error;
use webui::WebUiError;

/// Failure of a single tool call; rendered into the call's text result
#[derive(Error, Debug)]
pub enum ToolError {
    /// Bad arguments, raised before any backend call
    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error(transparent)]
    Backend(#[from] WebUiError),

    #[error("Failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short category label used in error reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation error",
            Self::Backend(WebUiError::Request(e)) if e.is_timeout() => "backend timeout",
            Self::Backend(WebUiError::Request(_)) => "backend unavailable",
            Self::Backend(WebUiError::Rejected { .. }) => "backend error",
            Self::Backend(WebUiError::MalformedResponse(_)) => "malformed response",
            Self::Persistence { .. } => "persistence error",
            Self::UnknownTool(_) => "unknown tool",
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
