//! Core type definitions for the code sandbox.
//!
//! Broken down into submodules by concern; everything is re-exported here.

pub mod execution;
pub mod language;
pub mod progress;
pub mod tool;

pub use execution::*;
pub use language::*;
pub use progress::*;
pub use tool::*;
