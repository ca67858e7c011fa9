//! Sandbox tools implementing the `Tool` trait.
//!
//! Each tool parses its arguments, delegates to the `ExecutionOrchestrator`
//! and renders the outcome as plain text. Lifecycle failures are returned as
//! `ToolOutput::error`, never as `Err`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use sandbox_mcp_core::{
    Error, ExecutionRequest, ProjectRequest, Result, Tool, ToolContext, ToolOutput,
};

use crate::orchestrator::ExecutionOrchestrator;

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::invalid_request(format!("{} is required", key)))
}

/// Boolean flags travel as the strings "true" and "false".
fn required_flag(args: &Value, key: &str) -> Result<bool> {
    match args.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => s.trim().parse::<bool>().map_err(|_| {
            Error::invalid_request(format!("{} must be \"true\" or \"false\", got {:?}", key, s))
        }),
        Some(other) => Err(Error::invalid_request(format!(
            "{} must be \"true\" or \"false\", got {}",
            key, other
        ))),
        None => Err(Error::invalid_request(format!("{} is required", key))),
    }
}

fn language_schema(orchestrator: &ExecutionOrchestrator, description: &str) -> Value {
    json!({
        "type": "string",
        "description": description,
        "enum": orchestrator.catalog().ids(),
    })
}

// =============================================================================
// Run Code Tool
// =============================================================================

/// Runs a snippet in a fresh container and returns its combined output.
pub struct RunCodeTool {
    orchestrator: Arc<ExecutionOrchestrator>,
}

impl RunCodeTool {
    pub fn new(orchestrator: Arc<ExecutionOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for RunCodeTool {
    fn name(&self) -> &str {
        "run_code"
    }

    fn description(&self) -> &str {
        "Run code in a sandboxed Docker container. The code is written to main.<ext> \
         and executed with the language's default command. Returns the container ID \
         and the combined stdout/stderr of the run."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "The code to run"
                },
                "language": language_schema(&self.orchestrator, "The programming language to use"),
                "cleanup": {
                    "type": "string",
                    "description": "Whether to remove the container after it finished",
                    "enum": ["true", "false"]
                }
            },
            "required": ["code", "language", "cleanup"]
        })
    }

    async fn execute(&self, args: Value, ctx: ToolContext) -> Result<ToolOutput> {
        let request = ExecutionRequest {
            code: required_str(&args, "code")?.to_string(),
            language: required_str(&args, "language")?.to_string(),
            cleanup_requested: required_flag(&args, "cleanup")?,
            progress_token: ctx.progress_token,
        };

        match self
            .orchestrator
            .run_code(request, ctx.notifier, &ctx.cancel)
            .await
        {
            Ok(result) => {
                let mut text = format!(
                    "Container ID: {}\n\nLogs: {}",
                    result.container_id, result.logs
                );
                if let Some(warning) = &result.cleanup_warning {
                    text.push_str(&format!("\n\nWarning: {}", warning));
                }
                Ok(ToolOutput::text(text).with_data(json!({
                    "container_id": result.container_id,
                    "exit_code": result.exit_code,
                })))
            }
            Err(e @ Error::InvalidRequest(_)) => Err(e),
            Err(e) => Ok(failure("Error running code", &e)),
        }
    }
}

// =============================================================================
// Run Project Tool
// =============================================================================

/// Starts an existing project directory in a container and returns at once.
pub struct RunProjectTool {
    orchestrator: Arc<ExecutionOrchestrator>,
}

impl RunProjectTool {
    pub fn new(orchestrator: Arc<ExecutionOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for RunProjectTool {
    fn name(&self) -> &str {
        "run_project"
    }

    fn description(&self) -> &str {
        "Run a project directory in a sandboxed Docker container. The directory is \
         mounted at /app and the entrypoint command runs there through sh -c. \
         Returns the container ID and a resource URI for the container's logs. \
         The container is not removed automatically; use cleanup_container."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectDir": {
                    "type": "string",
                    "description": "Host directory containing the project"
                },
                "language": language_schema(&self.orchestrator, "The programming language of the project"),
                "entrypointCmd": {
                    "type": "string",
                    "description": "Command that starts the project, e.g. \"npm run dev\""
                }
            },
            "required": ["projectDir", "language", "entrypointCmd"]
        })
    }

    async fn execute(&self, args: Value, ctx: ToolContext) -> Result<ToolOutput> {
        let request = ProjectRequest {
            project_dir: required_str(&args, "projectDir")?.to_string(),
            language: required_str(&args, "language")?.to_string(),
            entrypoint_cmd: required_str(&args, "entrypointCmd")?.to_string(),
            progress_token: ctx.progress_token,
        };

        match self
            .orchestrator
            .run_project(request, ctx.notifier, &ctx.cancel)
            .await
        {
            Ok(launch) => Ok(ToolOutput::text(format!(
                "Container ID: {}\n\nLogs: {}",
                launch.container.id, launch.logs_uri
            ))
            .with_data(json!({
                "container_id": launch.container.id,
                "image": launch.container.image,
                "logs_uri": launch.logs_uri,
            }))),
            Err(e) => Ok(failure("Error running project", &e)),
        }
    }
}

// =============================================================================
// Cleanup Container Tool
// =============================================================================

/// Removes a container left behind by an earlier run.
pub struct CleanupContainerTool {
    orchestrator: Arc<ExecutionOrchestrator>,
}

impl CleanupContainerTool {
    pub fn new(orchestrator: Arc<ExecutionOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for CleanupContainerTool {
    fn name(&self) -> &str {
        "cleanup_container"
    }

    fn description(&self) -> &str {
        "Stop and remove a container created by run_code or run_project."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "containerId": {
                    "type": "string",
                    "description": "ID of the container to remove"
                },
                "force": {
                    "type": "string",
                    "description": "Remove the container even if it is still running",
                    "enum": ["true", "false"]
                }
            },
            "required": ["containerId", "force"]
        })
    }

    async fn execute(&self, args: Value, _ctx: ToolContext) -> Result<ToolOutput> {
        let container_id = required_str(&args, "containerId")?;
        let force = required_flag(&args, "force")?;

        match self.orchestrator.cleanup_container(container_id, force).await {
            Ok(()) => Ok(ToolOutput::text(format!(
                "Successfully cleaned up container {}",
                container_id
            ))),
            Err(e @ Error::InvalidRequest(_)) => Err(e),
            Err(e) => {
                let output = failure("Error cleaning up container", &e);
                Ok(output.with_data(json!({ "not_found": e.is_not_found() })))
            }
        }
    }
}

fn failure(context: &str, error: &Error) -> ToolOutput {
    tracing::warn!(container_id = ?error.container_id(), error = %error, "{}", context);
    ToolOutput::error(format!("{}: {}", context, error))
}
