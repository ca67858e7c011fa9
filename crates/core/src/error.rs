//! Error types for the code sandbox.
//!
//! Every variant names the lifecycle stage that failed. Variants raised after a
//! container exists carry its id so the caller can still clean it up.

use thiserror::Error;

/// Result type alias using the sandbox's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the code sandbox.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to stage workspace: {0}")]
    Staging(String),

    // =========================================================================
    // Container Lifecycle Errors
    // =========================================================================
    #[error("Container runtime unavailable: {0}")]
    ClientUnavailable(String),

    #[error("Failed to pull image {image}: {reason}")]
    ImagePullFailed { image: String, reason: String },

    #[error("Failed to create container from image {image}: {reason}")]
    ContainerCreateFailed { image: String, reason: String },

    #[error("Failed to start container {container_id}: {reason}")]
    ContainerStartFailed {
        container_id: String,
        reason: String,
    },

    #[error("Error waiting for container {container_id}: {reason}")]
    WaitError {
        container_id: String,
        reason: String,
    },

    #[error("Failed to get logs of container {container_id}: {reason}")]
    LogRetrievalFailed {
        container_id: String,
        reason: String,
    },

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error("Execution cancelled{}", container_suffix(.container_id))]
    Cancelled { container_id: Option<String> },

    // =========================================================================
    // Service Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure to remove a container.
///
/// `NotFound` is split out so callers can treat an already-removed container
/// as a no-op.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanupError {
    #[error("Container {0} not found")]
    NotFound(String),

    #[error("Failed to remove container {container_id}: {reason}")]
    RemovalFailed {
        container_id: String,
        reason: String,
    },
}

fn container_suffix(container_id: &Option<String>) -> String {
    match container_id {
        Some(id) => format!(" (container {})", id),
        None => String::new(),
    }
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an unsupported language error.
    pub fn unsupported_language(language: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(language.into())
    }

    /// Create a staging error.
    pub fn staging(msg: impl Into<String>) -> Self {
        Self::Staging(msg.into())
    }

    /// Create a client unavailable error.
    pub fn client_unavailable(msg: impl Into<String>) -> Self {
        Self::ClientUnavailable(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Id of the container left behind by a partially failed run, if any.
    pub fn container_id(&self) -> Option<&str> {
        match self {
            Self::ContainerStartFailed { container_id, .. }
            | Self::WaitError { container_id, .. }
            | Self::LogRetrievalFailed { container_id, .. } => Some(container_id),
            Self::Cancelled { container_id } => container_id.as_deref(),
            Self::Cleanup(CleanupError::NotFound(container_id))
            | Self::Cleanup(CleanupError::RemovalFailed { container_id, .. }) => {
                Some(container_id)
            }
            _ => None,
        }
    }

    /// Whether this is a cleanup of a container that no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Cleanup(CleanupError::NotFound(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failures_keep_container_id() {
        let err = Error::ContainerStartFailed {
            container_id: "abc123".into(),
            reason: "port in use".into(),
        };
        assert_eq!(err.container_id(), Some("abc123"));

        let err = Error::WaitError {
            container_id: "abc123".into(),
            reason: "stream closed".into(),
        };
        assert_eq!(err.container_id(), Some("abc123"));
        assert!(err.to_string().contains("waiting"));

        let err = Error::ImagePullFailed {
            image: "python:3.12".into(),
            reason: "denied".into(),
        };
        assert_eq!(err.container_id(), None);
    }

    #[test]
    fn test_not_found_is_distinct() {
        let gone: Error = CleanupError::NotFound("abc".into()).into();
        assert!(gone.is_not_found());
        assert_eq!(gone.to_string(), "Container abc not found");

        let failed: Error = CleanupError::RemovalFailed {
            container_id: "abc".into(),
            reason: "device busy".into(),
        }
        .into();
        assert!(!failed.is_not_found());
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(
            Error::Cancelled { container_id: None }.to_string(),
            "Execution cancelled"
        );
        assert_eq!(
            Error::Cancelled {
                container_id: Some("c1".into())
            }
            .to_string(),
            "Execution cancelled (container c1)"
        );
    }
}
