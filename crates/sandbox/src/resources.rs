//! Readable resources backed by the container runtime.

use async_trait::async_trait;
use std::sync::Arc;

use sandbox_mcp_core::{ResourceProvider, Result};

use crate::orchestrator::ExecutionOrchestrator;

const SCHEME: &str = "containers://";
const LOGS_SUFFIX: &str = "/logs";

/// Extract the container id from `containers://{id}/logs`.
pub fn parse_logs_uri(uri: &str) -> Option<&str> {
    let id = uri.strip_prefix(SCHEME)?.strip_suffix(LOGS_SUFFIX)?;
    if id.is_empty() || id.contains('/') {
        return None;
    }
    Some(id)
}

/// Full combined log of a container, as plain text.
pub struct ContainerLogsResource {
    orchestrator: Arc<ExecutionOrchestrator>,
}

impl ContainerLogsResource {
    pub fn new(orchestrator: Arc<ExecutionOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl ResourceProvider for ContainerLogsResource {
    fn uri_template(&self) -> &str {
        "containers://{id}/logs"
    }

    fn name(&self) -> &str {
        "Container Logs"
    }

    fn description(&self) -> &str {
        "Returns all container logs from the specified container. \
         Logs are returned as a single text resource."
    }

    async fn read(&self, uri: &str) -> Result<Option<String>> {
        let Some(container_id) = parse_logs_uri(uri) else {
            return Ok(None);
        };
        tracing::debug!(container_id = %container_id, "Reading container logs");
        self.orchestrator.container_logs(container_id).await.map(Some)
    }
}
