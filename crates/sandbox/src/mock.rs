//! In-memory container runtime and notification sink for tests that must not
//! depend on Docker or a connected client.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use sandbox_mcp_core::{
    CleanupError, ContainerHandle, Error, NotificationSink, ProgressNotification, Result,
};

use crate::runtime::{ContainerRuntime, ContainerSpec};

/// Lifecycle step at which the mock should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Pull,
    Create,
    Start,
    Wait,
    Logs,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockState {
    Created,
    Running,
    Exited,
}

#[derive(Debug, Clone)]
struct MockContainer {
    spec: ContainerSpec,
    state: MockState,
}

/// In-memory mock runtime for unit testing.
pub struct MockRuntime {
    containers: Arc<Mutex<HashMap<String, MockContainer>>>,
    pulled: Arc<Mutex<Vec<String>>>,
    logs: String,
    exit_code: i64,
    run_duration: Duration,
    failure: Option<MockFailure>,
    available: bool,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self {
            containers: Default::default(),
            pulled: Default::default(),
            logs: "[mock] container output\n".to_string(),
            exit_code: 0,
            run_duration: Duration::ZERO,
            failure: None,
            available: true,
        }
    }
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs every container "prints".
    pub fn with_logs(mut self, logs: impl Into<String>) -> Self {
        self.logs = logs.into();
        self
    }

    pub fn with_exit_code(mut self, exit_code: i64) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// How long `wait_container` blocks before the container exits.
    pub fn with_run_duration(mut self, run_duration: Duration) -> Self {
        self.run_duration = run_duration;
        self
    }

    pub fn failing_at(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Every daemon call fails with `ClientUnavailable`.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Whether a container with this id still exists.
    pub async fn contains(&self, container_id: &str) -> bool {
        self.containers.lock().await.contains_key(container_id)
    }

    pub async fn container_count(&self) -> usize {
        self.containers.lock().await.len()
    }

    /// Spec the container was created from.
    pub async fn spec_of(&self, container_id: &str) -> Option<ContainerSpec> {
        self.containers
            .lock()
            .await
            .get(container_id)
            .map(|c| c.spec.clone())
    }

    pub async fn pulled_images(&self) -> Vec<String> {
        self.pulled.lock().await.clone()
    }

    fn fails_at(&self, step: MockFailure) -> bool {
        self.failure == Some(step)
    }

    fn reachable(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::client_unavailable("Cannot connect to the Docker daemon"))
        }
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn pull_image(&self, image: &str) -> Result<()> {
        self.reachable()?;
        if self.fails_at(MockFailure::Pull) {
            return Err(Error::ImagePullFailed {
                image: image.to_string(),
                reason: "manifest unknown".to_string(),
            });
        }
        self.pulled.lock().await.push(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        self.reachable()?;
        if self.fails_at(MockFailure::Create) {
            return Err(Error::ContainerCreateFailed {
                image: spec.image.clone(),
                reason: "invalid mount config".to_string(),
            });
        }
        let id = format!("mock-{}", uuid::Uuid::new_v4().simple());
        self.containers.lock().await.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                state: MockState::Created,
            },
        );
        Ok(ContainerHandle {
            id,
            image: spec.image.clone(),
        })
    }

    async fn start_container(&self, container_id: &str) -> Result<()> {
        self.reachable()?;
        if self.fails_at(MockFailure::Start) {
            return Err(Error::ContainerStartFailed {
                container_id: container_id.to_string(),
                reason: "executable file not found in $PATH".to_string(),
            });
        }
        let mut containers = self.containers.lock().await;
        let container = containers
            .get_mut(container_id)
            .ok_or_else(|| Error::ContainerStartFailed {
                container_id: container_id.to_string(),
                reason: "no such container".to_string(),
            })?;
        container.state = MockState::Running;
        Ok(())
    }

    async fn wait_container(&self, container_id: &str) -> Result<i64> {
        self.reachable()?;
        tokio::time::sleep(self.run_duration).await;
        if self.fails_at(MockFailure::Wait) {
            return Err(Error::WaitError {
                container_id: container_id.to_string(),
                reason: "unexpected EOF on wait stream".to_string(),
            });
        }
        if let Some(container) = self.containers.lock().await.get_mut(container_id) {
            container.state = MockState::Exited;
        }
        Ok(self.exit_code)
    }

    async fn container_logs(&self, container_id: &str) -> Result<String> {
        self.reachable()?;
        if self.fails_at(MockFailure::Logs) || !self.contains(container_id).await {
            return Err(Error::LogRetrievalFailed {
                container_id: container_id.to_string(),
                reason: "log driver does not support reading".to_string(),
            });
        }
        Ok(self.logs.clone())
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        self.reachable()?;
        let mut containers = self.containers.lock().await;
        let state = containers
            .get(container_id)
            .map(|c| c.state)
            .ok_or_else(|| CleanupError::NotFound(container_id.to_string()))?;

        if self.fails_at(MockFailure::Remove) || (state == MockState::Running && !force) {
            return Err(CleanupError::RemovalFailed {
                container_id: container_id.to_string(),
                reason: "container is running: stop the container before removing or force remove"
                    .to_string(),
            }
            .into());
        }
        containers.remove(container_id);
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

// =============================================================================
// Recording Notifier
// =============================================================================

/// Notification sink that keeps everything it is asked to deliver.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ProgressNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A sink whose deliveries all fail, as with a disconnected client.
    pub fn failing() -> Self {
        Self {
            sent: Default::default(),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<ProgressNotification> {
        self.sent.lock().await.clone()
    }

    pub async fn progress_values(&self) -> Vec<u32> {
        self.sent.lock().await.iter().map(|n| n.progress).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify_progress(&self, notification: ProgressNotification) -> Result<()> {
        if self.fail {
            return Err(Error::transport("client went away"));
        }
        self.sent.lock().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            image: "python:3.12-slim-bookworm".into(),
            command: vec!["python".into(), "main.py".into()],
            host_path: "/tmp/ws".into(),
            mount_target: "/app".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_lifecycle() {
        let mock = MockRuntime::new().with_logs("hello\n");
        mock.pull_image("python:3.12-slim-bookworm").await.unwrap();
        let handle = mock.create_container(&spec()).await.unwrap();
        mock.start_container(&handle.id).await.unwrap();
        assert_eq!(mock.wait_container(&handle.id).await.unwrap(), 0);
        assert_eq!(mock.container_logs(&handle.id).await.unwrap(), "hello\n");
        mock.remove_container(&handle.id, false).await.unwrap();
        assert!(!mock.contains(&handle.id).await);
    }

    #[tokio::test]
    async fn test_running_container_needs_force() {
        let mock = MockRuntime::new();
        let handle = mock.create_container(&spec()).await.unwrap();
        mock.start_container(&handle.id).await.unwrap();

        let err = mock.remove_container(&handle.id, false).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Cleanup(CleanupError::RemovalFailed { .. })
        ));
        mock.remove_container(&handle.id, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_rejects_every_call() {
        let mock = MockRuntime::new().unavailable();
        assert!(!mock.is_available().await);
        let err = mock.pull_image("python:3.12-slim-bookworm").await.unwrap_err();
        assert!(matches!(err, Error::ClientUnavailable(_)));
        let err = mock.remove_container("c1", true).await.unwrap_err();
        assert!(matches!(err, Error::ClientUnavailable(_)));
    }
}
