use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::notify::{NoopNotifier, NotificationSink};
use crate::error::Result;
use crate::types::{ProgressToken, ToolDefinition, ToolOutput};

/// Per-call context handed to a tool by the transport.
#[derive(Clone)]
pub struct ToolContext {
    /// Token the caller attached to the request, if it wants progress.
    pub progress_token: Option<ProgressToken>,
    /// Where progress notifications for this call are delivered.
    pub notifier: Arc<dyn NotificationSink>,
    /// Triggered when the caller cancels the request or disconnects.
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            progress_token: None,
            notifier,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress_token(mut self, token: Option<ProgressToken>) -> Self {
        self.progress_token = token;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(Arc::new(NoopNotifier))
    }
}

/// Tool interface exposed over the tool-call protocol.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of the tool.
    fn name(&self) -> &str;

    /// Get the human-readable description.
    fn description(&self) -> &str;

    /// Get the JSON Schema for parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Domain failures are returned as `ToolOutput::error`; `Err` is reserved
    /// for malformed arguments.
    async fn execute(&self, args: Value, ctx: ToolContext) -> Result<ToolOutput>;

    /// Definition advertised to callers.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters(),
        }
    }
}
