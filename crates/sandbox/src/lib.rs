#![deny(unused)]
//! Sandboxed code execution engine.
//!
//! This crate runs caller-supplied code, or whole project directories, inside
//! short-lived Docker containers and reports the combined output back.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │  Tools (RunCodeTool, RunProjectTool,   │
//! │         CleanupContainerTool)          │
//! │    ↓ delegates to                      │
//! ├────────────────────────────────────────┤
//! │  ExecutionOrchestrator                 │
//! │    LanguageCatalog → WorkspaceStager   │
//! │    ProgressReporter  ⇄  lifecycle task │
//! ├────────────────────────────────────────┤
//! │  ContainerLifecycleDriver              │
//! │    pull → create → start → wait → logs │
//! │    CleanupCoordinator                  │
//! ├────────────────────────────────────────┤
//! │  ContainerRuntime (DockerRuntime)      │
//! │    ↓ Docker API via bollard            │
//! └────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sandbox_mcp_engine::{DockerRuntime, ExecutionOrchestrator, LanguageCatalog, RunCodeTool};
//!
//! let runtime = Arc::new(DockerRuntime::new(&config.docker));
//! let catalog = Arc::new(LanguageCatalog::builtin());
//! let orchestrator = Arc::new(ExecutionOrchestrator::new(runtime, catalog, &config));
//!
//! let tool = RunCodeTool::new(orchestrator.clone());
//! ```

pub mod catalog;
pub mod cleanup;
pub mod driver;
pub mod mock;
pub mod orchestrator;
pub mod progress;
pub mod resources;
pub mod runtime;
pub mod tools;
pub mod workspace;

pub use catalog::LanguageCatalog;
pub use cleanup::CleanupCoordinator;
pub use driver::ContainerLifecycleDriver;
pub use mock::{MockFailure, MockRuntime, RecordingNotifier};
pub use orchestrator::ExecutionOrchestrator;
pub use progress::{ProgressReporter, ProgressState};
pub use resources::ContainerLogsResource;
pub use runtime::{ContainerRuntime, ContainerSpec, DockerRuntime};
pub use tools::{CleanupContainerTool, RunCodeTool, RunProjectTool};
pub use workspace::{StagedWorkspace, WorkspaceStager};
