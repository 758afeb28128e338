//! Error types for the sync core.
//!
//! This module defines the centralized error type [`SyncError`] and a type alias
//! [`Result`] used throughout the crate. Domain failures reported by remote
//! calls are *not* errors of this type: they travel on the change-event stream
//! as [`ErrorInfo`] values so that every observer sees them.

use crate::domain::ids::LocalId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for bus and coordinator operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A post was registered for upload while a pending record already exists.
    ///
    /// The caller must resolve, cancel or clear the existing record before
    /// registering the post again.
    #[error("post {post_id} is already registered for upload")]
    AlreadyRegistered {
        /// Local id of the post.
        post_id: LocalId,
    },

    /// A single handler returned an error while processing an action or event.
    #[error("handler `{handler}` failed: {message}")]
    Handler {
        /// Name reported by the failing handler.
        handler: String,
        /// Description of the failure.
        message: String,
    },

    /// One or more handlers failed during a single dispatch or publish.
    ///
    /// Every registered handler was still offered the action or event; the
    /// failures are collected here in delivery order.
    #[error("{} handler(s) failed during delivery of {subject}", failures.len())]
    Delivery {
        /// Short description of what was being delivered.
        subject: String,
        /// The individual handler failures.
        failures: Vec<SyncError>,
    },

    /// Model store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem or I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Builds a [`SyncError::Handler`] from a handler name and any displayable cause.
    pub fn handler(handler: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: message.to_string(),
        }
    }
}

/// A specialized `Result` type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Typed category of a domain failure carried by a change event.
///
/// Renders as its type name (`"UnknownPost"`, `"RequestTooLarge"`, ...), which
/// is the string recorded on failed upload records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The action payload could not be interpreted.
    MalformedPayload,
    /// The remote entity does not exist.
    NotFound,
    /// The request exceeded the remote size limit.
    RequestTooLarge,
    /// The remote side does not know the post being pushed.
    UnknownPost,
    /// The remote side does not know the media item.
    UnknownMedia,
    /// Credentials were rejected.
    Unauthorized,
    /// The remote side failed.
    ServerError,
    /// Any other failure, identified by its own type string.
    Other(String),
}

impl ErrorKind {
    /// Returns the type string of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MalformedPayload => "MalformedPayload",
            Self::NotFound => "NotFound",
            Self::RequestTooLarge => "RequestTooLarge",
            Self::UnknownPost => "UnknownPost",
            Self::UnknownMedia => "UnknownMedia",
            Self::Unauthorized => "Unauthorized",
            Self::ServerError => "ServerError",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error detail attached to a failed change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Typed failure category.
    pub kind: ErrorKind,

    /// Optional human-readable detail from the remote side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorInfo {
    /// Creates error info without a message.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self { kind, message: None }
    }

    /// Attaches a human-readable message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {message}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_renders_type_string() {
        assert_eq!(ErrorKind::UnknownPost.to_string(), "UnknownPost");
        assert_eq!(ErrorKind::Other("Throttled".into()).as_str(), "Throttled");
    }

    #[test]
    fn delivery_error_counts_failures() {
        let err = SyncError::Delivery {
            subject: "PushPost".to_string(),
            failures: vec![
                SyncError::handler("a", "boom"),
                SyncError::handler("b", "bang"),
            ],
        };
        assert_eq!(err.to_string(), "2 handler(s) failed during delivery of PushPost");
    }

    #[test]
    fn error_info_display_includes_message() {
        let info = ErrorInfo::new(ErrorKind::NotFound).with_message("post 4 is gone");
        assert_eq!(info.to_string(), "NotFound: post 4 is gone");
    }
}
