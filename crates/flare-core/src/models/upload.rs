//! Upload workflow models and the JSON bodies exchanged with the upload broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksum::{Checksum, ChecksumAlgorithm};
use crate::error::UploadError;
use crate::models::MediaType;
use crate::validation::content_type::{content_type_for_path, media_type_for_path};

/// What the caller declares about a local file before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    path: PathBuf,
    media_type: MediaType,
    size_bytes: u64,
    mime_type: String,
}

impl UploadRequest {
    pub fn new(
        path: impl Into<PathBuf>,
        media_type: MediaType,
        size_bytes: u64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            media_type,
            size_bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Declare a file from its metadata and extension.
    pub fn from_path(path: impl AsRef<Path>, media_type: MediaType) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            UploadError::Validation(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(UploadError::Validation(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let mime_type = content_type_for_path(path).unwrap_or("application/octet-stream");

        Ok(Self::new(path, media_type, metadata.len(), mime_type))
    }

    /// Like `from_path`, with the media type guessed from the file extension.
    pub fn detect(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let media_type = media_type_for_path(path).ok_or_else(|| {
            UploadError::Validation(format!(
                "Cannot determine media type of {}; declare it explicitly",
                path.display()
            ))
        })?;
        Self::from_path(path, media_type)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// A request that passed local validation. Only these reach the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFile {
    request: UploadRequest,
    content_type: String,
    size_bytes: u64,
}

impl ValidatedFile {
    pub(crate) fn new(request: UploadRequest, content_type: String, size_bytes: u64) -> Self {
        Self {
            request,
            content_type,
            size_bytes,
        }
    }

    pub fn request(&self) -> &UploadRequest {
        &self.request
    }

    pub fn path(&self) -> &Path {
        self.request.path()
    }

    pub fn media_type(&self) -> MediaType {
        self.request.media_type()
    }

    /// Effective MIME type: the sniffed type when the content was recognized.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Actual on-disk size observed during validation.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn file_name(&self) -> String {
        self.request
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload.{}", self.media_type()))
    }

    pub fn to_initiate_request(&self) -> InitiateUploadRequest {
        InitiateUploadRequest {
            media_type: self.media_type(),
            size_bytes: self.size_bytes,
            mime_type: self.content_type.clone(),
            file_name: self.request.file_name().map(str::to_string),
        }
    }
}

/// Backend-issued, time-bounded authorization for one upload destination.
///
/// Not `Clone`: `complete` takes it by value, so one handle commits at most once.
#[derive(Debug, PartialEq, Eq)]
pub struct UploadSession {
    session_id: String,
    upload_url: String,
    expires_at: DateTime<Utc>,
    checksum_algorithm: ChecksumAlgorithm,
}

impl UploadSession {
    pub fn new(
        session_id: impl Into<String>,
        upload_url: impl Into<String>,
        expires_at: DateTime<Utc>,
        checksum_algorithm: ChecksumAlgorithm,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            upload_url: upload_url.into(),
            expires_at,
            checksum_algorithm,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn checksum_algorithm(&self) -> ChecksumAlgorithm {
        self.checksum_algorithm
    }

    /// True once `now + margin` reaches the expiry instant.
    /// A margin too large to represent counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match chrono::Duration::from_std(margin)
            .ok()
            .and_then(|margin| now.checked_add_signed(margin))
        {
            Some(deadline) => deadline >= self.expires_at,
            None => true,
        }
    }

    pub fn expired_error(&self) -> UploadError {
        UploadError::SessionExpired {
            session_id: self.session_id.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Final state the backend reports for a completed asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    /// Asset stored and ready
    Completed,
    /// Asset stored, post-processing (transcoding, moderation) still running
    Processing,
}

/// The only artifact that outlives an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRecord {
    pub asset_id: String,
    pub final_url: String,
    pub status: CompletionStatus,
}

/// Phase 1 request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadRequest {
    pub media_type: MediaType,
    pub size_bytes: u64,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Phase 1 response body. Fields are optional so a malformed body is reported
/// as a session error rather than a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checksum_algorithm: Option<String>,
}

impl InitiateUploadResponse {
    pub fn into_session(self) -> Result<UploadSession, UploadError> {
        let session_id = non_empty(self.session_id)
            .ok_or_else(|| UploadError::session("Initiate response is missing sessionId"))?;
        let upload_url = non_empty(self.upload_url)
            .ok_or_else(|| UploadError::session("Initiate response is missing uploadUrl"))?;
        let expires_at = self
            .expires_at
            .ok_or_else(|| UploadError::session("Initiate response is missing expiresAt"))?;
        let checksum_algorithm = match self.checksum_algorithm.as_deref() {
            None => ChecksumAlgorithm::default(),
            Some(name) => name
                .parse::<ChecksumAlgorithm>()
                .map_err(UploadError::session)?,
        };

        Ok(UploadSession::new(
            session_id,
            upload_url,
            expires_at,
            checksum_algorithm,
        ))
    }
}

/// Phase 3 request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub session_id: String,
    pub checksum: String,
    pub checksum_algorithm: ChecksumAlgorithm,
}

impl CompleteUploadRequest {
    pub fn new(session: &UploadSession, checksum: &Checksum) -> Self {
        Self {
            session_id: session.session_id().to_string(),
            checksum: checksum.hex().to_string(),
            checksum_algorithm: checksum.algorithm(),
        }
    }
}

/// Status value a backend uses to report that the committed checksum did not match.
pub const CHECKSUM_MISMATCH_STATUS: &str = "checksum_mismatch";

/// Error code a backend uses in an error body for the same condition.
pub const CHECKSUM_MISMATCH_CODE: &str = "CHECKSUM_MISMATCH";

/// Phase 3 response body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CompleteUploadResponse {
    pub fn into_record(self) -> Result<CompletionRecord, UploadError> {
        let status = self
            .status
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "completed".to_string());

        let status = match status.as_str() {
            "completed" | "complete" | "stored" => CompletionStatus::Completed,
            "processing" | "pending" => CompletionStatus::Processing,
            CHECKSUM_MISMATCH_STATUS => {
                return Err(UploadError::Verification(
                    "Backend reported a checksum mismatch".to_string(),
                ))
            }
            other => {
                return Err(UploadError::session(format!(
                    "Upload was not accepted (status: {})",
                    other
                )))
            }
        };

        let asset_id = non_empty(self.asset_id)
            .ok_or_else(|| UploadError::session("Complete response is missing assetId"))?;
        let final_url = non_empty(self.url)
            .ok_or_else(|| UploadError::session("Complete response is missing url"))?;

        Ok(CompletionRecord {
            asset_id,
            final_url,
            status,
        })
    }
}

/// Error body shape shared by the broker's non-success responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Parse leniently: a non-JSON body becomes the message.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| ErrorBody {
            message: Some(text.to_string()),
            ..Default::default()
        })
    }

    pub fn is_checksum_mismatch(&self) -> bool {
        [self.code.as_deref(), self.error.as_deref()]
            .into_iter()
            .flatten()
            .any(|c| c.eq_ignore_ascii_case(CHECKSUM_MISMATCH_CODE))
    }

    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
