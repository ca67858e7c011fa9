//! Execution orchestrator.
//!
//! Composes the catalog, the workspace stager, the lifecycle driver and the
//! progress reporter into the `run_code` and `run_project` operations.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use sandbox_mcp_core::config::{AppConfig, ProgressConfig};
use sandbox_mcp_core::{
    container_logs_uri, Error, ExecutionRequest, ExecutionResult, NotificationSink, ProjectLaunch,
    ProjectRequest, Result,
};

use crate::catalog::LanguageCatalog;
use crate::cleanup::CleanupCoordinator;
use crate::driver::ContainerLifecycleDriver;
use crate::progress::ProgressReporter;
use crate::runtime::{ContainerRuntime, ContainerSpec};
use crate::workspace::WorkspaceStager;

/// Entry point for every sandbox operation.
///
/// Holds no per-request state; concurrent requests share only the runtime.
pub struct ExecutionOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    catalog: Arc<LanguageCatalog>,
    stager: WorkspaceStager,
    driver: ContainerLifecycleDriver,
    cleanup: CleanupCoordinator,
    progress: ProgressConfig,
    cleanup_timeout: Duration,
}

impl ExecutionOrchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        catalog: Arc<LanguageCatalog>,
        config: &AppConfig,
    ) -> Self {
        Self {
            driver: ContainerLifecycleDriver::new(
                runtime.clone(),
                Duration::from_secs(config.cleanup.auto_timeout_secs),
            ),
            cleanup: CleanupCoordinator::new(runtime.clone()),
            stager: WorkspaceStager::new(&config.workspace),
            progress: config.progress.clone(),
            cleanup_timeout: Duration::from_secs(config.cleanup.tool_timeout_secs),
            runtime,
            catalog,
        }
    }

    /// Replace the workspace stager.
    pub fn with_stager(mut self, stager: WorkspaceStager) -> Self {
        self.stager = stager;
        self
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    /// Run a code snippet to completion.
    ///
    /// The staged workspace is removed before this returns, whatever the
    /// outcome. Dropping the returned future cancels the execution.
    pub async fn run_code(
        &self,
        request: ExecutionRequest,
        notifier: Arc<dyn NotificationSink>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let language = self.catalog.resolve(&request.language)?;
        let cancel = cancel.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled { container_id: None });
        }

        let workspace = self
            .stager
            .stage(&request.code, &language.file_extension)?;
        let spec = ContainerSpec {
            image: language.image.clone(),
            command: language.command(),
            host_path: workspace.host_path().to_string_lossy().into_owned(),
            mount_target: workspace.mount_target().to_string(),
        };
        tracing::info!(
            language = %language.id,
            image = %spec.image,
            workspace = %spec.host_path,
            cleanup = request.cleanup_requested,
            "Running code"
        );

        let (tx, rx) = oneshot::channel();
        let driver = self.driver.clone();
        let task_cancel = cancel.clone();
        let cleanup_requested = request.cleanup_requested;
        tokio::spawn(async move {
            let outcome = driver.run(&spec, cleanup_requested, &task_cancel).await;
            let _ = tx.send(outcome);
        });

        let reporter = ProgressReporter::new(notifier, request.progress_token, &self.progress);
        let outcome = reporter.supervise(rx, &cancel).await;

        if let Err(e) = workspace.release() {
            tracing::warn!(error = %e, "Failed to release workspace");
        }

        match &outcome {
            Ok(result) => {
                tracing::info!(container_id = %result.container_id, exit_code = ?result.exit_code, "Code run finished")
            }
            Err(e) => {
                tracing::warn!(container_id = ?e.container_id(), error = %e, "Code run failed")
            }
        }
        outcome
    }

    /// Start a project that already lives on the host.
    ///
    /// The project directory is bound as-is and `entrypoint_cmd` runs through
    /// `sh -c`. Returns once the container has started; its logs are then
    /// readable through the returned resource URI. The container is not
    /// removed automatically.
    pub async fn run_project(
        &self,
        request: ProjectRequest,
        notifier: Arc<dyn NotificationSink>,
        cancel: &CancellationToken,
    ) -> Result<ProjectLaunch> {
        let language = self.catalog.resolve(&request.language)?;
        if request.entrypoint_cmd.trim().is_empty() {
            return Err(Error::invalid_request("entrypointCmd must not be empty"));
        }
        let project_dir = tokio::fs::canonicalize(&request.project_dir)
            .await
            .map_err(|e| {
                Error::invalid_request(format!(
                    "project directory {} is not accessible: {}",
                    request.project_dir, e
                ))
            })?;
        if !project_dir.is_dir() {
            return Err(Error::invalid_request(format!(
                "{} is not a directory",
                project_dir.display()
            )));
        }

        let cancel = cancel.child_token();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let spec = ContainerSpec {
            image: language.image.clone(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                request.entrypoint_cmd.clone(),
            ],
            host_path: project_dir.to_string_lossy().into_owned(),
            mount_target: self.stager.mount_target().to_string(),
        };
        tracing::info!(
            language = %language.id,
            image = %spec.image,
            project_dir = %spec.host_path,
            entrypoint = %request.entrypoint_cmd,
            "Running project"
        );

        let (tx, rx) = oneshot::channel();
        let driver = self.driver.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let outcome = driver.launch(&spec, &task_cancel).await;
            let _ = tx.send(outcome);
        });

        let reporter = ProgressReporter::new(notifier, request.progress_token, &self.progress);
        let container = reporter.supervise(rx, &cancel).await?;

        Ok(ProjectLaunch {
            logs_uri: container_logs_uri(&container.id),
            container,
        })
    }

    /// Remove a container created by an earlier run.
    pub async fn cleanup_container(&self, container_id: &str, force: bool) -> Result<()> {
        if container_id.trim().is_empty() {
            return Err(Error::invalid_request("Container ID is required"));
        }
        self.cleanup
            .cleanup(container_id, false, force, self.cleanup_timeout)
            .await
    }

    /// Full combined log of a container.
    pub async fn container_logs(&self, container_id: &str) -> Result<String> {
        self.runtime.container_logs(container_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFailure, MockRuntime, RecordingNotifier};
    use sandbox_mcp_core::ProgressToken;

    fn orchestrator(mock: &Arc<MockRuntime>) -> ExecutionOrchestrator {
        ExecutionOrchestrator::new(
            mock.clone(),
            Arc::new(LanguageCatalog::builtin()),
            &AppConfig::default(),
        )
    }

    fn request(language: &str, cleanup: bool) -> ExecutionRequest {
        ExecutionRequest {
            code: "print('hi')".into(),
            language: language.into(),
            cleanup_requested: cleanup,
            progress_token: None,
        }
    }

    #[tokio::test]
    async fn test_run_code_auto_cleanup() {
        let mock = Arc::new(MockRuntime::new().with_logs("hi\n"));
        let orchestrator = orchestrator(&mock);

        let result = orchestrator
            .run_code(
                request("python", true),
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!result.container_id.is_empty());
        assert!(result.logs.contains("hi"));

        let err = orchestrator
            .cleanup_container(&result.container_id, false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unsupported_language_creates_nothing() {
        let mock = Arc::new(MockRuntime::new());
        let err = orchestrator(&mock)
            .run_code(
                request("brainfuck", true),
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedLanguage(_)));
        assert!(err.container_id().is_none());
        assert_eq!(mock.container_count().await, 0);
        assert!(mock.pulled_images().await.is_empty());
    }

    #[tokio::test]
    async fn test_workspace_is_mounted_then_released() {
        let base = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRuntime::new());
        let orchestrator = orchestrator(&mock)
            .with_stager(WorkspaceStager::default().with_base_dir(base.path()));

        let result = orchestrator
            .run_code(
                request("python", false),
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let spec = mock.spec_of(&result.container_id).await.unwrap();
        assert!(spec.host_path.starts_with(&*base.path().to_string_lossy()));
        assert_eq!(spec.mount_target, "/app");
        assert_eq!(spec.command, vec!["python", "main.py"]);
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_workspace_released_on_failure() {
        let base = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRuntime::new().failing_at(MockFailure::Wait));
        let orchestrator = orchestrator(&mock)
            .with_stager(WorkspaceStager::default().with_base_dir(base.path()));

        let err = orchestrator
            .run_code(
                request("python", true),
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::WaitError { .. }));
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_wait_error_leaves_service_usable() {
        let failing = Arc::new(MockRuntime::new().failing_at(MockFailure::Wait));
        let err = orchestrator(&failing)
            .run_code(
                request("python", false),
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WaitError { .. }));

        let healthy = Arc::new(MockRuntime::new().with_logs("second\n"));
        let result = orchestrator(&healthy)
            .run_code(
                request("python", true),
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.logs, "second\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reported_with_token() {
        let mock = Arc::new(MockRuntime::new().with_run_duration(Duration::from_secs(7)));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut req = request("go", true);
        req.progress_token = Some(ProgressToken::String("tok".into()));

        orchestrator(&mock)
            .run_code(req, notifier.clone(), &CancellationToken::new())
            .await
            .unwrap();

        let values = notifier.progress_values().await;
        assert_eq!(values.first(), Some(&10));
        assert_eq!(values.last(), Some(&100));
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert!(values.len() >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_terminates_container() {
        let base = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRuntime::new().with_run_duration(Duration::from_secs(3600)));
        let orchestrator = orchestrator(&mock)
            .with_stager(WorkspaceStager::default().with_base_dir(base.path()));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            trigger.cancel();
        });

        let err = orchestrator
            .run_code(
                request("nodejs", false),
                Arc::new(RecordingNotifier::default()),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { .. }));
        assert_eq!(mock.container_count().await, 0);
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_project_binds_directory() {
        let project = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRuntime::new());

        let launch = orchestrator(&mock)
            .run_project(
                ProjectRequest {
                    project_dir: project.path().to_string_lossy().into_owned(),
                    language: "nodejs".into(),
                    entrypoint_cmd: "npm run dev".into(),
                    progress_token: None,
                },
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            launch.logs_uri,
            format!("containers://{}/logs", launch.container.id)
        );
        let spec = mock.spec_of(&launch.container.id).await.unwrap();
        assert_eq!(spec.command, vec!["sh", "-c", "npm run dev"]);
        assert_eq!(spec.image, "node:22-bookworm-slim");
        assert!(project.path().exists());
    }

    #[tokio::test]
    async fn test_run_project_rejects_missing_directory() {
        let mock = Arc::new(MockRuntime::new());
        let err = orchestrator(&mock)
            .run_project(
                ProjectRequest {
                    project_dir: "/definitely/not/here".into(),
                    language: "python".into(),
                    entrypoint_cmd: "python app.py".into(),
                    progress_token: None,
                },
                Arc::new(RecordingNotifier::default()),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(mock.container_count().await, 0);
    }
}
