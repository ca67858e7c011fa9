//! Container runtime seam.
//!
//! This module provides the `ContainerRuntime` trait and a Docker-based
//! implementation using the `bollard` crate. The lifecycle driver and the
//! cleanup coordinator only talk to the daemon through this trait.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerWaitResponse, HostConfig};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::{Stream, StreamExt};

use sandbox_mcp_core::config::DockerConfig;
use sandbox_mcp_core::{CleanupError, ContainerHandle, Error, Result};

// =============================================================================
// Runtime Types
// =============================================================================

/// Everything needed to create one sandbox container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    /// Command run as the container's `Cmd`.
    pub command: Vec<String>,
    /// Host directory bind-mounted into the container.
    pub host_path: String,
    /// Mount point of `host_path`, also used as the working directory.
    pub mount_target: String,
}

impl ContainerSpec {
    /// Bind specification in Docker's `host:container` form.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host_path, self.mount_target)
    }
}

// =============================================================================
// Container Runtime Trait
// =============================================================================

/// Trait for container runtime backends.
///
/// Every method maps its failure onto the lifecycle stage it belongs to, so
/// callers can forward errors without re-classifying them.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Pull `image`, draining the whole progress stream before returning.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Create (but do not start) a container.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;

    /// Start a created container.
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Block until the container is no longer running; returns its exit code.
    async fn wait_container(&self, container_id: &str) -> Result<i64>;

    /// Combined stdout and stderr, in arrival order.
    async fn container_logs(&self, container_id: &str) -> Result<String>;

    /// Remove a container; a missing container is `CleanupError::NotFound`.
    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()>;

    /// Check if the runtime is reachable (e.g., Docker daemon running).
    async fn is_available(&self) -> bool;
}

// =============================================================================
// Docker Runtime Implementation
// =============================================================================

/// Docker-based runtime using the `bollard` crate.
///
/// A client handle is acquired per operation and dropped when it returns.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    socket: Option<String>,
    timeout_secs: u64,
}

impl DockerRuntime {
    pub fn new(config: &DockerConfig) -> Self {
        Self {
            socket: config.socket.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    /// Build a client and make sure the daemon answers.
    ///
    /// bollard connects lazily, so a stale socket file or an unreachable
    /// `DOCKER_HOST` only shows up on first contact.
    async fn client(&self) -> Result<Docker> {
        let docker = match &self.socket {
            Some(path) => {
                Docker::connect_with_socket(path, self.timeout_secs, API_DEFAULT_VERSION)
            }
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(daemon_unreachable)?;
        docker.ping().await.map_err(daemon_unreachable)?;
        Ok(docker)
    }
}

fn daemon_unreachable(error: BollardError) -> Error {
    Error::client_unavailable(format!(
        "Failed to connect to Docker daemon: {}. Is Docker running?",
        error
    ))
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new(&DockerConfig::default())
    }
}

fn is_not_found(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn pull_image(&self, image: &str) -> Result<()> {
        let docker = self.client().await?;
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = std::pin::pin!(docker.create_image(options, None, None));
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| Error::ImagePullFailed {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
        }

        tracing::info!(image = %image, "Image pulled");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let docker = self.client().await?;

        let host_config = HostConfig {
            binds: Some(vec![spec.bind()]),
            ..Default::default()
        };

        let container_config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.mount_target.clone()),
            tty: Some(false),
            host_config: Some(host_config),
            labels: Some(std::collections::HashMap::from([(
                "managed-by".to_string(),
                "code-sandbox-mcp".to_string(),
            )])),
            ..Default::default()
        };

        let response = docker
            .create_container(None::<CreateContainerOptions<String>>, container_config)
            .await
            .map_err(|e| Error::ContainerCreateFailed {
                image: spec.image.clone(),
                reason: e.to_string(),
            })?;

        for warning in &response.warnings {
            tracing::warn!(container_id = %response.id, warning = %warning, "Docker create warning");
        }

        Ok(ContainerHandle {
            id: response.id,
            image: spec.image.clone(),
        })
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        let docker = self.client().await?;
        docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::ContainerStartFailed {
                container_id: container_id.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_container(&self, container_id: &str) -> Result<i64> {
        let docker = self.client().await?;
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = std::pin::pin!(docker.wait_container(container_id, Some(options)));
        wait_outcome(container_id, stream.next().await)
    }

    async fn container_logs(&self, container_id: &str) -> Result<String> {
        let docker = self.client().await?;
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        });

        collect_logs(container_id, docker.logs(container_id, options)).await
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        let docker = self.client().await?;

        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        match docker.remove_container(container_id, Some(options)).await {
            Ok(()) => {
                tracing::info!(container_id = %container_id, "Container removed");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                Err(CleanupError::NotFound(container_id.to_string()).into())
            }
            Err(e) => Err(CleanupError::RemovalFailed {
                container_id: container_id.to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    async fn is_available(&self) -> bool {
        self.client().await.is_ok()
    }
}

/// Interpret the first item of a wait stream.
///
/// bollard reports a non-zero exit status as `DockerContainerWaitError`; only
/// one carrying a daemon message means the wait itself failed.
fn wait_outcome(
    container_id: &str,
    next: Option<std::result::Result<ContainerWaitResponse, BollardError>>,
) -> Result<i64> {
    let reason = match next {
        Some(Ok(response)) => return Ok(response.status_code),
        Some(Err(BollardError::DockerContainerWaitError { error, code })) if error.is_empty() => {
            return Ok(code)
        }
        Some(Err(BollardError::DockerContainerWaitError { error, code })) => {
            format!("{} (status {})", error, code)
        }
        Some(Err(e)) => e.to_string(),
        None => "wait stream closed before the container stopped".to_string(),
    };
    Err(Error::WaitError {
        container_id: container_id.to_string(),
        reason,
    })
}

/// Concatenate stdout and stderr frames in arrival order.
///
/// Frames may split a multi-byte character, so bytes are decoded only once
/// the stream has ended.
async fn collect_logs<S>(container_id: &str, stream: S) -> Result<String>
where
    S: Stream<Item = std::result::Result<LogOutput, BollardError>>,
{
    let mut bytes = Vec::new();
    let mut stream = std::pin::pin!(stream);
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(LogOutput::StdOut { message })
            | Ok(LogOutput::StdErr { message })
            | Ok(LogOutput::Console { message }) => bytes.extend_from_slice(&message),
            Ok(LogOutput::StdIn { .. }) => {}
            Err(e) => {
                return Err(Error::LogRetrievalFailed {
                    container_id: container_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// =============================================================================
// Tests
// =============================================================================
