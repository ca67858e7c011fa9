#![deny(unused)]
//! code-sandbox-mcp - sandboxed code execution over a tool-call interface.
//!
//! Runs code snippets and project directories inside short-lived Docker
//! containers and serves them as tools over JSON-RPC on stdio.

use std::sync::Arc;

use sandbox_mcp_core::config::AppConfig;
use sandbox_mcp_engine::{
    CleanupContainerTool, ContainerLogsResource, ContainerRuntime, DockerRuntime,
    ExecutionOrchestrator, LanguageCatalog, RunCodeTool, RunProjectTool,
};
use sandbox_mcp_gateway::{McpServer, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // Initialize tracing
    sandbox_mcp_gateway::configure_tracing(config.logging.json)?;

    tracing::info!("Starting code-sandbox-mcp v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Container runtime
    // =========================================================================
    let runtime = Arc::new(DockerRuntime::new(&config.docker));
    if runtime.is_available().await {
        tracing::info!(socket = ?config.docker.socket, "Docker daemon reachable");
    } else {
        tracing::warn!(
            socket = ?config.docker.socket,
            "Docker daemon not reachable, tool calls will fail until it is"
        );
    }

    // =========================================================================
    // Orchestrator
    // =========================================================================
    let catalog = Arc::new(LanguageCatalog::from_configs_or_builtin(
        config.languages.clone(),
    )?);
    tracing::info!(languages = ?catalog.ids(), "Language catalog loaded");

    let orchestrator = Arc::new(ExecutionOrchestrator::new(runtime, catalog, &config));

    // =========================================================================
    // Tools & resources
    // =========================================================================
    let tools = ToolRegistry::new();
    tools.register(Arc::new(RunCodeTool::new(orchestrator.clone())))?;
    tools.register(Arc::new(RunProjectTool::new(orchestrator.clone())))?;
    tools.register(Arc::new(CleanupContainerTool::new(orchestrator.clone())))?;

    let server = Arc::new(
        McpServer::new(tools).with_resource(Arc::new(ContainerLogsResource::new(orchestrator))),
    );

    server.serve_stdio().await?;

    tracing::info!("code-sandbox-mcp stopped");
    Ok(())
}
