//! MCP (Model Context Protocol) server side
//!
//! This crate provides the JSON-RPC message types, a line-delimited stdio
//! transport and a gateway that routes tool calls to a [`gateway::ToolHandler`].

pub mod core;
pub mod gateway;
pub mod transport;

pub use core::{error::Error, types::*};
pub use gateway::{Gateway, ToolHandler};
pub use transport::stdio::StdioTransport;
