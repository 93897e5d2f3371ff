//! Shared pieces of the `flare` binary: tracing setup and the per-file result
//! printed for every command.

use flare_core::{
    CompletionRecord, CompletionStatus, ErrorMetadata, MediaType, UploadError, UploadErrorKind,
    ValidatedFile,
};
use serde::Serialize;
use std::path::Path;

/// Initialize tracing for the CLI. Logs go to stderr so stdout carries only results.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Error details attached to a failed outcome.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeError {
    pub kind: UploadErrorKind,
    pub code: &'static str,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
}

impl From<&UploadError> for OutcomeError {
    fn from(err: &UploadError) -> Self {
        Self {
            kind: err.kind(),
            code: err.error_code(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
        }
    }
}

/// One line of output per file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CompletionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl FileOutcome {
    fn empty(path: &Path, ok: bool) -> Self {
        Self {
            file: path.display().to_string(),
            ok,
            media_type: None,
            content_type: None,
            size_bytes: None,
            asset_id: None,
            url: None,
            status: None,
            error: None,
        }
    }

    pub fn validated(path: &Path, result: Result<ValidatedFile, UploadError>) -> Self {
        match result {
            Ok(file) => Self {
                media_type: Some(file.media_type()),
                content_type: Some(file.content_type().to_string()),
                size_bytes: Some(file.size_bytes()),
                ..Self::empty(path, true)
            },
            Err(err) => Self::failed(path, &err),
        }
    }

    pub fn uploaded(path: &Path, result: Result<CompletionRecord, UploadError>) -> Self {
        match result {
            Ok(record) => Self {
                asset_id: Some(record.asset_id),
                url: Some(record.final_url),
                status: Some(record.status),
                ..Self::empty(path, true)
            },
            Err(err) => Self::failed(path, &err),
        }
    }

    pub fn failed(path: &Path, err: &UploadError) -> Self {
        Self {
            error: Some(OutcomeError::from(err)),
            ..Self::empty(path, false)
        }
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
