//! Error types module
//!
//! Every failure of the upload workflow is an `UploadError`. Each variant maps to
//! one phase of the workflow (or to the caller/auth surroundings) and describes
//! itself through `ErrorMetadata`, so callers can decide whether to restart an
//! attempt from `initiate` without parsing messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like expired sessions
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse classification of an upload failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadErrorKind {
    Validation,
    Session,
    Transfer,
    SessionExpired,
    Verification,
    Cancelled,
    Auth,
}

/// Metadata for upload errors - lets an error describe how it should be handled
pub trait ErrorMetadata {
    /// Error classification
    fn kind(&self) -> UploadErrorKind;

    /// Machine-readable error code (e.g., "SESSION_EXPIRED")
    fn error_code(&self) -> &'static str;

    /// Whether a fresh attempt (restarting from initiate) may succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Human-readable message safe to show to an end user
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Bad local input. Never sent over the wire.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backend rejected initiate/complete, or answered with a malformed body.
    #[error("Session error: {message}")]
    Session {
        message: String,
        status: Option<u16>,
    },

    /// Network or storage failure while transferring bytes.
    #[error("Transfer error: {message}")]
    Transfer {
        message: String,
        status: Option<u16>,
    },

    #[error("Upload session {session_id} expired at {expires_at}")]
    SessionExpired {
        session_id: String,
        expires_at: DateTime<Utc>,
    },

    /// The backend could not match the committed checksum to the stored bytes.
    #[error("Checksum verification failed: {0}")]
    Verification(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Authentication unavailable: {0}")]
    Auth(String),
}

impl UploadError {
    pub fn session(message: impl Into<String>) -> Self {
        UploadError::Session {
            message: message.into(),
            status: None,
        }
    }

    pub fn session_status(status: u16, message: impl Into<String>) -> Self {
        UploadError::Session {
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn transfer(message: impl Into<String>) -> Self {
        UploadError::Transfer {
            message: message.into(),
            status: None,
        }
    }

    pub fn transfer_status(status: u16, message: impl Into<String>) -> Self {
        UploadError::Transfer {
            message: message.into(),
            status: Some(status),
        }
    }

    /// HTTP status the backend or storage answered with, when there was one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            UploadError::Session { status, .. } | UploadError::Transfer { status, .. } => *status,
            _ => None,
        }
    }
}

/// Static metadata for each kind: (error_code, recoverable, suggested_action, log_level).
fn upload_error_static_metadata(
    kind: UploadErrorKind,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match kind {
        UploadErrorKind::Validation => (
            "VALIDATION_ERROR",
            false,
            Some("Check file size and type against the upload policy"),
            LogLevel::Debug,
        ),
        UploadErrorKind::Session => (
            "SESSION_ERROR",
            true,
            Some("Retry the upload from the start after a short delay"),
            LogLevel::Error,
        ),
        UploadErrorKind::Transfer => (
            "TRANSFER_ERROR",
            true,
            Some("Check connectivity and retry the upload from the start"),
            LogLevel::Warn,
        ),
        UploadErrorKind::SessionExpired => (
            "SESSION_EXPIRED",
            true,
            Some("Start a new upload session"),
            LogLevel::Warn,
        ),
        UploadErrorKind::Verification => (
            "CHECKSUM_MISMATCH",
            true,
            Some("Retry the upload from the start; the stored bytes were corrupt"),
            LogLevel::Error,
        ),
        UploadErrorKind::Cancelled => ("CANCELLED", true, None, LogLevel::Debug),
        UploadErrorKind::Auth => (
            "AUTH_UNAVAILABLE",
            false,
            Some("Sign in again or configure an API token"),
            LogLevel::Warn,
        ),
    }
}

impl ErrorMetadata for UploadError {
    fn kind(&self) -> UploadErrorKind {
        match self {
            UploadError::Validation(_) => UploadErrorKind::Validation,
            UploadError::Session { .. } => UploadErrorKind::Session,
            UploadError::Transfer { .. } => UploadErrorKind::Transfer,
            UploadError::SessionExpired { .. } => UploadErrorKind::SessionExpired,
            UploadError::Verification(_) => UploadErrorKind::Verification,
            UploadError::Cancelled => UploadErrorKind::Cancelled,
            UploadError::Auth(_) => UploadErrorKind::Auth,
        }
    }

    fn error_code(&self) -> &'static str {
        upload_error_static_metadata(self.kind()).0
    }

    fn is_recoverable(&self) -> bool {
        upload_error_static_metadata(self.kind()).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        upload_error_static_metadata(self.kind()).2
    }

    fn log_level(&self) -> LogLevel {
        upload_error_static_metadata(self.kind()).3
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::Validation(ref msg) => msg.clone(),
            UploadError::Session { .. } => "The server could not process the upload".to_string(),
            UploadError::Transfer { .. } => "The file could not be transferred".to_string(),
            UploadError::SessionExpired { .. } => "The upload took too long and expired".to_string(),
            UploadError::Verification(_) => {
                "The uploaded file was corrupted in transit".to_string()
            }
            UploadError::Cancelled => "The upload was cancelled".to_string(),
            UploadError::Auth(_) => "You are not signed in".to_string(),
        }
    }
}
