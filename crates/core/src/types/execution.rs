use serde::{Deserialize, Serialize};

use super::progress::ProgressToken;

/// A validated `run_code` request.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub cleanup_requested: bool,
    pub progress_token: Option<ProgressToken>,
}

/// A validated `run_project` request.
#[derive(Debug, Clone)]
pub struct ProjectRequest {
    /// Host directory bound into the container as-is.
    pub project_dir: String,
    pub language: String,
    /// Shell command run at the root of the project directory.
    pub entrypoint_cmd: String,
    pub progress_token: Option<ProgressToken>,
}

/// A container created by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: String,
    pub image: String,
}

/// Outcome of a completed `run_code` execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Interleaved stdout and stderr of the container.
    pub logs: String,
    pub container_id: String,
    /// Exit status reported by the runtime, when it reported one.
    pub exit_code: Option<i64>,
    /// Set when automatic cleanup was requested but did not succeed.
    pub cleanup_warning: Option<String>,
}

/// Outcome of a `run_project` launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLaunch {
    pub container: ContainerHandle,
    /// Resource URI from which the project's logs can be read.
    pub logs_uri: String,
}

/// URI of the readable log resource of a container.
pub fn container_logs_uri(container_id: &str) -> String {
    format!("containers://{}/logs", container_id)
}
