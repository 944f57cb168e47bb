//! Unified error types for shipwright

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all shipwright operations
#[derive(Error, Debug)]
pub enum ShipError {
    // Task descriptor errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Generative service errors
    #[error("Generation failed: {0}")]
    Generation(String),

    // Publish errors
    #[error("Transport conflict on {path}: {message}")]
    TransportConflict { path: String, message: String },

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Git command failed: {0}")]
    Git(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Non-fatal stages
    #[error("Static site provisioning failed: {0}")]
    Provisioning(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    // Infrastructure
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Coarse error classes reported on a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Generation,
    TransportConflict,
    Publish,
    ProvisioningWarning,
    NotificationError,
    Internal,
}

impl ShipError {
    /// Map the error onto the run-level taxonomy.
    ///
    /// Git, HTTP and missing-file failures only occur while talking to the
    /// hosting service, so they count as publish failures.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Generation(_) => ErrorCategory::Generation,
            Self::TransportConflict { .. } => ErrorCategory::TransportConflict,
            Self::Publish(_) | Self::Git(_) | Self::NotFound(_) | Self::Http(_) => {
                ErrorCategory::Publish
            }
            Self::Provisioning(_) => ErrorCategory::ProvisioningWarning,
            Self::Notification(_) => ErrorCategory::NotificationError,
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) | Self::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Build a conflict error for a file path
    pub fn conflict(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportConflict {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Generation => write!(f, "generation"),
            Self::TransportConflict => write!(f, "transport_conflict"),
            Self::Publish => write!(f, "publish"),
            Self::ProvisioningWarning => write!(f, "provisioning_warning"),
            Self::NotificationError => write!(f, "notification_error"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Result type alias using ShipError
pub type Result<T> = std::result::Result<T, ShipError>;
