//! Stable Diffusion WebUI HTTP client
//!
//! Typed access to the `/sdapi/v1/*` endpoints used to switch models,
//! run txt2img / img2img and introspect the backend.

pub mod client;
pub mod error;
pub mod types;

pub use client::{WebUiApi, WebUiClient};
pub use error::{Result, WebUiError};
pub use types::*;
