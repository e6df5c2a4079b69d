//! palette - MCP server driving a Stable Diffusion WebUI backend
//!
//! Tool calls arrive over stdio, are turned into txt2img/img2img requests
//! and the resulting images are written to disk.

pub mod config;
pub mod error;
pub mod materialize;
pub mod payload;
pub mod pipeline;
pub mod prompt;
pub mod reconcile;
pub mod request;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{ConfigError, ToolError};
pub use pipeline::{GenerationOutcome, Pipeline};
pub use tools::{ToolContext, ToolRegistry};
