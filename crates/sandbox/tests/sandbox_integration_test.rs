//! Sandbox integration tests.
//!
//! Tests the full pipeline: Tool → ExecutionOrchestrator → ContainerLifecycleDriver
//! → ContainerRuntime (MockRuntime). These tests do NOT require Docker, except
//! the `#[ignore]`d ones at the end.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use sandbox_mcp_core::config::AppConfig;
use sandbox_mcp_core::{Error, ExecutionRequest, ProgressToken, Tool, ToolContext};
use sandbox_mcp_engine::{
    CleanupContainerTool, ContainerRuntime, DockerRuntime, ExecutionOrchestrator,
    LanguageCatalog, MockFailure, MockRuntime, RecordingNotifier, RunCodeTool,
};

// =============================================================================
// Helpers
// =============================================================================

fn orchestrator_with(runtime: Arc<dyn ContainerRuntime>) -> Arc<ExecutionOrchestrator> {
    Arc::new(ExecutionOrchestrator::new(
        runtime,
        Arc::new(LanguageCatalog::builtin()),
        &AppConfig::default(),
    ))
}

fn run_code_args(code: &str, language: &str, cleanup: bool) -> serde_json::Value {
    json!({
        "code": code,
        "language": language,
        "cleanup": cleanup.to_string(),
    })
}

// =============================================================================
// 1. Scenario A: python "hi" with auto-cleanup
// =============================================================================

#[tokio::test]
async fn test_python_hello_is_auto_cleaned() {
    let mock = Arc::new(MockRuntime::new().with_logs("hi\n"));
    let orchestrator = orchestrator_with(mock.clone());
    let run = RunCodeTool::new(orchestrator.clone());
    let cleanup = CleanupContainerTool::new(orchestrator);

    let output = run
        .execute(run_code_args("print('hi')", "python", true), ToolContext::default())
        .await
        .unwrap();

    assert!(output.success);
    assert!(output.content.contains("hi"));
    let container_id = output.data.unwrap()["container_id"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(!container_id.is_empty());
    assert_eq!(mock.container_count().await, 0);

    let output = cleanup
        .execute(
            json!({"containerId": container_id, "force": "false"}),
            ToolContext::default(),
        )
        .await
        .unwrap();
    assert!(!output.success);
    assert_eq!(output.data.unwrap()["not_found"], json!(true));
}

// =============================================================================
// 2. Scenario B: unsupported language
// =============================================================================

#[tokio::test]
async fn test_unsupported_language_creates_no_container() {
    let mock = Arc::new(MockRuntime::new());
    let run = RunCodeTool::new(orchestrator_with(mock.clone()));

    let output = run
        .execute(run_code_args("+[]", "brainfuck", true), ToolContext::default())
        .await
        .unwrap();

    assert!(!output.success);
    assert!(output.content.contains("Language not supported: brainfuck"));
    assert!(!output.content.contains("Container ID"));
    assert_eq!(mock.container_count().await, 0);
}

// =============================================================================
// 3. Scenario C: wait failure is a normal error and the service keeps going
// =============================================================================

#[tokio::test]
async fn test_wait_failure_is_reported_and_recoverable() {
    let failing = Arc::new(MockRuntime::new().failing_at(MockFailure::Wait));
    let orchestrator = orchestrator_with(failing.clone());

    let err = orchestrator
        .run_code(
            ExecutionRequest {
                code: "print(1)".into(),
                language: "python".into(),
                cleanup_requested: true,
                progress_token: None,
            },
            Arc::new(RecordingNotifier::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WaitError { .. }));
    let stranded = err.container_id().unwrap().to_string();

    // The stranded container can still be removed by id.
    orchestrator.cleanup_container(&stranded, true).await.unwrap();

    // A later request on a healthy runtime is served normally.
    let run = RunCodeTool::new(orchestrator_with(Arc::new(MockRuntime::new())));
    let output = run
        .execute(run_code_args("print(2)", "python", true), ToolContext::default())
        .await
        .unwrap();
    assert!(output.success);
}

// =============================================================================
// 4. Partial failures name the container
// =============================================================================

#[tokio::test]
async fn test_partial_failures_report_container_id() {
    for (failure, stage) in [
        (MockFailure::Start, "Failed to start container"),
        (MockFailure::Logs, "Failed to get logs of container"),
    ] {
        let run = RunCodeTool::new(orchestrator_with(Arc::new(
            MockRuntime::new().failing_at(failure),
        )));
        let output = run
            .execute(run_code_args("x", "nodejs", false), ToolContext::default())
            .await
            .unwrap();

        assert!(!output.success);
        assert!(output.content.contains(stage), "{}", output.content);
        assert!(output.content.contains("mock-"), "{}", output.content);
    }
}

#[tokio::test]
async fn test_pull_failure_names_image() {
    let run = RunCodeTool::new(orchestrator_with(Arc::new(
        MockRuntime::new().failing_at(MockFailure::Pull),
    )));
    let output = run
        .execute(run_code_args("x", "go", true), ToolContext::default())
        .await
        .unwrap();

    assert!(!output.success);
    assert!(output.content.contains("Failed to pull image golang:1.22-alpine"));
}

#[tokio::test]
async fn test_unreachable_daemon_is_client_unavailable() {
    let mock = Arc::new(MockRuntime::new().unavailable());
    let orchestrator = orchestrator_with(mock.clone());

    let err = orchestrator
        .run_code(
            ExecutionRequest {
                code: "print(1)".into(),
                language: "python".into(),
                cleanup_requested: true,
                progress_token: None,
            },
            Arc::new(RecordingNotifier::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ClientUnavailable(_)));
    assert!(err.container_id().is_none());

    let output = RunCodeTool::new(orchestrator)
        .execute(run_code_args("print(1)", "python", true), ToolContext::default())
        .await
        .unwrap();
    assert!(!output.success);
    assert!(output.content.contains("Container runtime unavailable"));
    assert_eq!(mock.container_count().await, 0);
}

// =============================================================================
// 5. Progress through the tool layer
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_progress_reaches_total() {
    let mock = Arc::new(MockRuntime::new().with_run_duration(Duration::from_secs(25)));
    let run = RunCodeTool::new(orchestrator_with(mock));
    let notifier = Arc::new(RecordingNotifier::default());

    let output = run
        .execute(
            run_code_args("import time; time.sleep(25)", "python", true),
            ToolContext::new(notifier.clone())
                .with_progress_token(Some(ProgressToken::Integer(42))),
        )
        .await
        .unwrap();
    assert!(output.success);

    let values = notifier.progress_values().await;
    assert_eq!(values.first(), Some(&10));
    assert_eq!(values.last(), Some(&100));
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert!(values[..values.len() - 1].iter().all(|v| *v < 100));
    assert!(notifier
        .sent()
        .await
        .iter()
        .all(|n| n.progress_token == ProgressToken::Integer(42)));
}

// =============================================================================
// 6. Docker (requires a running daemon)
// =============================================================================

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn test_docker_python_hello() {
    let runtime = Arc::new(DockerRuntime::default());
    assert!(runtime.is_available().await, "Docker daemon not reachable");
    let orchestrator = orchestrator_with(runtime);

    let result = orchestrator
        .run_code(
            ExecutionRequest {
                code: "print('hi')".into(),
                language: "python".into(),
                cleanup_requested: true,
                progress_token: None,
            },
            Arc::new(RecordingNotifier::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.logs.contains("hi"));
    assert_eq!(result.exit_code, Some(0));
    assert!(result.cleanup_warning.is_none());

    let err = orchestrator
        .cleanup_container(&result.container_id, false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn test_docker_non_zero_exit_keeps_logs() {
    let orchestrator = orchestrator_with(Arc::new(DockerRuntime::default()));

    let result = orchestrator
        .run_code(
            ExecutionRequest {
                code: "import sys\nprint('out')\nsys.stderr.write('err\\n')\nsys.exit(3)".into(),
                language: "python".into(),
                cleanup_requested: true,
                progress_token: None,
            },
            Arc::new(RecordingNotifier::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.exit_code, Some(3));
    assert!(result.logs.contains("out"));
    assert!(result.logs.contains("err"));
}
