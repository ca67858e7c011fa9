#![deny(unused)]
//! Core types, traits, and error definitions for the code sandbox.
//!
//! This crate provides the building blocks shared by the execution engine and
//! the tool-protocol gateway.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{CleanupError, Error, Result};
pub use traits::*;
pub use types::*;
