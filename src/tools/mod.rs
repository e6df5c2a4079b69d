// Tool implementations exposed over MCP

mod args;
mod generate;
mod models;
mod schema;
mod suggestions;

pub use args::Arguments;
pub use generate::{GenerateImageTool, GenerateImg2ImgTool, GenerateTransparentImageTool};
pub use models::{ListModelsTool, ModelDetailsTool, ModelFamily, ModelRecommendationsTool};
pub use suggestions::{Category, PromptSuggestionsTool};

use crate::config::Config;
use crate::error::{Result, ToolError};
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use mcp::{CallToolResult, ToolDescriptor, ToolHandler};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use webui::WebUiApi;

/// Base trait for all tools
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the argument object
    fn input_schema(&self) -> Value;

    /// Run the tool and return its text report
    async fn call(&self, arguments: &Map<String, Value>) -> Result<String>;
}

/// Shared state handed to every tool
pub struct ToolContext {
    pub backend: Arc<dyn WebUiApi>,
    pub pipeline: Pipeline,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, backend: Arc<dyn WebUiApi>) -> Self {
        let pipeline = Pipeline::new(config, backend.clone());
        Self { backend, pipeline }
    }
}

/// Registry for managing tools
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
            order: Vec::new(),
        };

        // Register all tools
        registry.register(Arc::new(GenerateImageTool::new(ctx.clone())));
        registry.register(Arc::new(GenerateTransparentImageTool::new(ctx.clone())));
        registry.register(Arc::new(GenerateImg2ImgTool::new(ctx.clone())));
        registry.register(Arc::new(PromptSuggestionsTool::new(ctx.clone())));
        registry.register(Arc::new(ListModelsTool::new(ctx.clone())));
        registry.register(Arc::new(ModelDetailsTool::new(ctx.clone())));
        registry.register(Arc::new(ModelRecommendationsTool::new(ctx)));

        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if self.tools.insert(name, tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    /// Look up and run a tool by name
    pub async fn dispatch(&self, name: &str, arguments: &Map<String, Value>) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(arguments).await
    }
}

/// Text shown to the caller when a tool fails
pub fn error_report(name: &str, error: &ToolError) -> String {
    format!("{name} failed ({}): {error}", error.kind())
}

#[async_trait]
impl ToolHandler for ToolRegistry {
    fn tools(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> mcp::core::error::Result<CallToolResult> {
        match self.dispatch(name, &arguments).await {
            Ok(report) => Ok(CallToolResult::text(report)),
            Err(ToolError::UnknownTool(name)) => Err(mcp::Error::ToolNotFound(name)),
            Err(e) => {
                tracing::error!("{} failed: {}", name, e);
                Ok(CallToolResult::error_text(error_report(name, &e)))
            }
        }
    }
}
