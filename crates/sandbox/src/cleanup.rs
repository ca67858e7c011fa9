//! Container removal.

use std::sync::Arc;
use std::time::Duration;

use sandbox_mcp_core::Result;

use crate::runtime::ContainerRuntime;

/// Removes containers created by the sandbox.
#[derive(Clone)]
pub struct CleanupCoordinator {
    runtime: Arc<dyn ContainerRuntime>,
}

impl CleanupCoordinator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Remove `container_id`.
    ///
    /// With `wait_for_exit`, removal starts as soon as the container stops, the
    /// wait fails, or `timeout` elapses, whichever comes first. `force` allows
    /// removing a container that is still running.
    pub async fn cleanup(
        &self,
        container_id: &str,
        wait_for_exit: bool,
        force: bool,
        timeout: Duration,
    ) -> Result<()> {
        if wait_for_exit {
            match tokio::time::timeout(timeout, self.runtime.wait_container(container_id)).await {
                Ok(Ok(exit_code)) => {
                    tracing::info!(container_id = %container_id, exit_code, "Container exited, proceeding with cleanup");
                }
                Ok(Err(e)) => {
                    tracing::warn!(container_id = %container_id, error = %e, "Error waiting for container, removing anyway");
                }
                Err(_) => {
                    tracing::info!(container_id = %container_id, timeout = ?timeout, "Timeout waiting for container to exit");
                }
            }
        }

        self.runtime.remove_container(container_id, force).await?;
        tracing::info!(container_id = %container_id, force, "Successfully removed container");
        Ok(())
    }
}
