//! Core traits for the code sandbox.
//!
//! - `tool`: tools callable through the transport (Tool, ToolContext)
//! - `notify`: outbound notification delivery (NotificationSink)
//! - `resource`: readable resources addressed by URI (ResourceProvider)

pub mod notify;
pub mod resource;
pub mod tool;

pub use notify::*;
pub use resource::*;
pub use tool::*;
