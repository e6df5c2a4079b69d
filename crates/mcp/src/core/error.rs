//! Error types for MCP

use crate::core::constants::codes;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Message is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Invalid MCP message: {0}")]
    InvalidMessage(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// JSON-RPC error code reported for this error
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidMessage(_) => codes::INVALID_REQUEST,
            Error::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            Error::InvalidParams(_) | Error::ToolNotFound(_) => codes::INVALID_PARAMS,
            Error::Encoding(_) | Error::Serialization(_) => codes::PARSE_ERROR,
            Error::Io(_) => codes::INTERNAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
