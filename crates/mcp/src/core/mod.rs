//! Core types and constants for the MCP protocol

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::Error;
pub use types::*;
