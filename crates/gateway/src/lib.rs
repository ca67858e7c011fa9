#![deny(unused)]
//! Tool-protocol gateway for the code sandbox.
//!
//! This crate speaks JSON-RPC 2.0 over newline-delimited stdio, routes
//! `tools/call` to registered tools, serves readable resources and forwards
//! progress notifications back to the client.

pub mod jsonrpc;
pub mod registry;
pub mod server;
pub mod telemetry;
pub mod transport;

pub use registry::ToolRegistry;
pub use server::{McpServer, ServerInfo};
pub use telemetry::configure_tracing;
pub use transport::{ClientNotifier, Outbound};
