//! Transports for MCP messages

pub mod stdio;
