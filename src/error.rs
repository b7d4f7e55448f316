//! Error types for hub operations.
//!
//! Single-target operations return these directly. Aggregate operations keep
//! them per server so one backend's failure never fails the whole request.

use thiserror::Error;

use crate::mcp_client::SessionError;

/// Errors produced by the connection registry, discovery engine and call router.
#[derive(Debug, Clone, Error)]
pub enum HubError {
    /// The server name is already registered.
    #[error("Already connected to server '{0}'")]
    AlreadyConnected(String),

    /// The server name is not registered.
    #[error("Not connected to server '{0}'")]
    NotConnected(String),

    /// The descriptor cannot be used to establish a connection.
    #[error("Invalid configuration for server '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// Spawning, dialing or the session handshake failed.
    #[error("Failed to connect to server '{name}': {cause}")]
    ConnectionFailed { name: String, cause: SessionError },

    /// The backend is connected but its tool listing failed.
    #[error("Failed to get tools list from server '{name}': {cause}")]
    CatalogUnavailable { name: String, cause: SessionError },

    /// The search expression is not a valid regular expression.
    #[error("Invalid search pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The backend rejected the call or the transport failed mid-call.
    #[error("Tool '{tool_name}' on server '{name}' failed: {cause}")]
    InvocationFailed {
        name: String,
        tool_name: String,
        cause: SessionError,
    },

    /// No tool with this exact name in the backend's current catalog.
    #[error("Tool '{tool_name}' not found in server '{name}'")]
    ToolNotFound { name: String, tool_name: String },

    /// The close handshake failed. The entry has already been removed.
    #[error("Failed to disconnect from server '{name}': {cause}")]
    CloseFailed { name: String, cause: SessionError },
}

impl HubError {
    /// Stable machine-readable tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlreadyConnected(_) => "already_connected",
            Self::NotConnected(_) => "not_connected",
            Self::InvalidDescriptor { .. } => "invalid_descriptor",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::CatalogUnavailable { .. } => "catalog_unavailable",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::InvocationFailed { .. } => "invocation_failed",
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::CloseFailed { .. } => "close_failed",
        }
    }

    /// The underlying session error, when the failure came from a backend.
    pub fn session_cause(&self) -> Option<&SessionError> {
        match self {
            Self::ConnectionFailed { cause, .. }
            | Self::CatalogUnavailable { cause, .. }
            | Self::InvocationFailed { cause, .. }
            | Self::CloseFailed { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;
