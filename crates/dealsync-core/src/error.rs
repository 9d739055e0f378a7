//! Error types for the dealsync sync core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown when a remote rejection carries no usable text.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Message shown when an action needs the live connection and it is down.
pub const TRANSPORT_UNAVAILABLE_MESSAGE: &str =
    "You appear to be offline. Reconnect and try again.";

/// A shared error type for every dealsync crate.
///
/// Variants are structured so stores can decide between rollback, warning and
/// user-facing text without inspecting message strings.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The persistent connection is down; the action was not attempted.
    #[error("Transport unavailable")]
    TransportUnavailable,

    /// The remote side refused the mutation.
    #[error("Remote rejected the request: {}", .message.as_deref().unwrap_or("no details"))]
    Rejected { message: Option<String> },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// A push payload could not be interpreted at all.
    #[error("Invalid payload for '{event}': {message}")]
    InvalidPayload { event: String, message: String },

    /// The operation was cancelled by its caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a Rejected error carrying the server-provided message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: Some(message.into()),
        }
    }

    /// Creates a Rejected error without any server-provided message.
    pub fn rejected_without_message() -> Self {
        Self::Rejected { message: None }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    /// Creates an InvalidPayload error
    pub fn invalid_payload(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if the action was refused because the transport is down
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable)
    }

    /// Check if this is a remote rejection
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Check if the operation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the stable, human-readable text for presenting this error inline.
    ///
    /// Remote rejections surface the server's message when it carries one and
    /// fall back to [`GENERIC_FAILURE_MESSAGE`] otherwise. Raw transport or IO
    /// details are never exposed.
    pub fn user_message(&self) -> String {
        match self {
            Self::TransportUnavailable => TRANSPORT_UNAVAILABLE_MESSAGE.to_string(),
            Self::Rejected {
                message: Some(message),
            } if !message.trim().is_empty() => message.trim().to_string(),
            Self::NotFound { entity_type, .. } => {
                format!("The {} no longer exists.", entity_type.to_lowercase())
            }
            Self::Cancelled => "The operation was cancelled.".to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<version_migrate::MigrationError> for SyncError {
    fn from(err: version_migrate::MigrationError) -> Self {
        use version_migrate::MigrationError;

        match err {
            MigrationError::DeserializationError(_) | MigrationError::SerializationError(_) => {
                Self::Serialization {
                    format: "migration".to_string(),
                    message: err.to_string(),
                }
            }
            _ => Self::Migration(err.to_string()),
        }
    }
}

/// Conversion from anyhow::Error (used at the binary edge)
impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;
