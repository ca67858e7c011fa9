//! Container lifecycle driver.
//!
//! Sequences pull → create → start → wait → logs → (cleanup) for a single
//! container. Every step that can block observes the cancellation token; once
//! a container exists, cancellation force-removes it before returning.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sandbox_mcp_core::{ContainerHandle, Error, ExecutionResult, Result};

use crate::cleanup::CleanupCoordinator;
use crate::runtime::{ContainerRuntime, ContainerSpec};

/// Drives one container through its lifecycle.
#[derive(Clone)]
pub struct ContainerLifecycleDriver {
    runtime: Arc<dyn ContainerRuntime>,
    cleanup: CleanupCoordinator,
    cleanup_timeout: Duration,
}

impl ContainerLifecycleDriver {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, cleanup_timeout: Duration) -> Self {
        Self {
            cleanup: CleanupCoordinator::new(runtime.clone()),
            runtime,
            cleanup_timeout,
        }
    }

    /// Pull the image, then create and start a container from `spec`.
    ///
    /// A start failure still names the created container so it can be removed.
    pub async fn launch(
        &self,
        spec: &ContainerSpec,
        cancel: &CancellationToken,
    ) -> Result<ContainerHandle> {
        self.guarded(cancel, None, self.runtime.pull_image(&spec.image))
            .await?;

        // Creation is not interrupted so that a container the daemon did
        // create is never lost track of.
        let handle = self.runtime.create_container(spec).await?;
        tracing::info!(container_id = %handle.id, image = %handle.image, "Container created");
        if cancel.is_cancelled() {
            self.terminate(&handle.id).await;
            return Err(Error::Cancelled {
                container_id: Some(handle.id),
            });
        }

        self.guarded(cancel, Some(&handle.id), self.runtime.start_container(&handle.id))
            .await?;
        tracing::info!(container_id = %handle.id, "Container started");

        Ok(handle)
    }

    /// Run a container to completion and collect its combined output.
    ///
    /// With `cleanup_requested`, the container is removed after its logs were
    /// read; a failed removal becomes `cleanup_warning` on the result. A log
    /// failure still triggers that cleanup and reports how it went.
    pub async fn run(
        &self,
        spec: &ContainerSpec,
        cleanup_requested: bool,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let handle = self.launch(spec, cancel).await?;
        let id = handle.id.as_str();

        let exit_code = self
            .guarded(cancel, Some(id), self.runtime.wait_container(id))
            .await?;
        tracing::info!(container_id = %id, exit_code, "Container exited");

        let logs = match self
            .guarded(cancel, Some(id), self.runtime.container_logs(id))
            .await
        {
            Err(e @ Error::Cancelled { .. }) => return Err(e),
            other => other,
        };

        let cleanup_warning = if cleanup_requested {
            self.auto_cleanup(id).await
        } else {
            tracing::debug!(container_id = %id, "Cleanup not requested, container kept");
            None
        };

        let logs = match logs {
            Ok(logs) => logs,
            Err(Error::LogRetrievalFailed {
                container_id,
                reason,
            }) if cleanup_requested => {
                let outcome = match &cleanup_warning {
                    None => "container removed by auto-cleanup".to_string(),
                    Some(warning) => format!("auto-cleanup failed: {}", warning),
                };
                return Err(Error::LogRetrievalFailed {
                    container_id,
                    reason: format!("{}; {}", reason, outcome),
                });
            }
            Err(e) => return Err(e),
        };

        Ok(ExecutionResult {
            logs,
            container_id: handle.id.clone(),
            exit_code: Some(exit_code),
            cleanup_warning,
        })
    }

    async fn auto_cleanup(&self, container_id: &str) -> Option<String> {
        match self
            .cleanup
            .cleanup(container_id, false, false, self.cleanup_timeout)
            .await
        {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(container_id = %container_id, error = %e, "Failed to clean up container");
                Some(e.to_string())
            }
        }
    }

    /// Best-effort forced removal after cancellation.
    async fn terminate(&self, container_id: &str) {
        if let Err(e) = self
            .cleanup
            .cleanup(container_id, false, true, self.cleanup_timeout)
            .await
        {
            tracing::warn!(container_id = %container_id, error = %e, "Failed to remove cancelled container");
        }
    }

    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        container_id: Option<&str>,
        step: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                if let Some(id) = container_id {
                    self.terminate(id).await;
                }
                Err(Error::Cancelled {
                    container_id: container_id.map(str::to_string),
                })
            }
            outcome = step => outcome,
        }
    }
}
