//! Error types for the WebUI client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebUiError {
    /// Connection, DNS, TLS or timeout failure
    #[error("Backend unavailable: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a status other than 200
    #[error("Backend rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// 200 response whose body is not what the endpoint promises
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),
}

impl WebUiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, WebUiError>;
