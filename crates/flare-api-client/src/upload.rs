//! Three-phase media upload coordinator.
//!
//! initiate -> transfer -> complete, with local validation gating the first
//! network call. Every phase is one round trip; none is retried here. A failed
//! attempt is restarted by the caller from `initiate`.

use bytes::Bytes;
use chrono::Utc;
use flare_core::models::{
    CompleteUploadRequest, CompleteUploadResponse, ErrorBody, InitiateUploadResponse,
};
use flare_core::{
    validate_media, Checksum, CompletionRecord, ErrorMetadata, LogLevel, UploadError,
    UploadPolicy, UploadRequest, UploadSession, UploadTransport, ValidatedFile,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{error_text, ApiClient, REQUEST_ID_HEADER};

const INITIATE_PATH: &str = "/uploads/initiate";
const COMPLETE_PATH: &str = "/uploads/complete";

/// Drives one file at a time from local storage to a durable asset record.
///
/// Cheap to clone and holds no mutable state, so independent uploads can run
/// concurrently on clones of the same uploader.
#[derive(Clone, Debug)]
pub struct MediaUploader {
    api: ApiClient,
    policy: Arc<UploadPolicy>,
}

impl MediaUploader {
    pub fn new(api: ApiClient, policy: UploadPolicy) -> Self {
        Self {
            api,
            policy: Arc::new(policy),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Check the file against the policy. No network I/O.
    pub fn validate(&self, request: &UploadRequest) -> Result<ValidatedFile, UploadError> {
        validate_media(request, &self.policy)
    }

    /// Phase 1: ask the backend for an upload session.
    pub async fn initiate(&self, file: &ValidatedFile) -> Result<UploadSession, UploadError> {
        self.initiate_with_id(file, Uuid::new_v4()).await
    }

    /// Phase 2: hash the file and transfer the same bytes to the session destination.
    ///
    /// Returns the checksum of exactly what was sent.
    pub async fn upload(
        &self,
        session: &UploadSession,
        file: &ValidatedFile,
    ) -> Result<Checksum, UploadError> {
        self.upload_with_id(session, file, Uuid::new_v4()).await
    }

    /// Phase 3: commit the checksum. Consumes the session.
    pub async fn complete(
        &self,
        session: UploadSession,
        checksum: Checksum,
    ) -> Result<CompletionRecord, UploadError> {
        self.complete_with_id(session, checksum, Uuid::new_v4())
            .await
    }

    /// Run validate, initiate, upload and complete in order. The first failure
    /// aborts the sequence and is returned unchanged.
    pub async fn upload_media(
        &self,
        request: &UploadRequest,
    ) -> Result<CompletionRecord, UploadError> {
        self.upload_media_cancellable(request, &CancellationToken::new())
            .await
    }

    /// `upload_media`, abandoned as soon as `cancel` fires. Dropping the phase
    /// future releases the open file and any in-flight request.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(
            path = %request.path().display(),
            media_type = %request.media_type(),
            size_bytes = request.size_bytes(),
            request_id = tracing::field::Empty,
        )
    )]
    pub async fn upload_media_cancellable(
        &self,
        request: &UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionRecord, UploadError> {
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(request_id));
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UploadError::Cancelled),
            result = self.run_phases(request, request_id) => result,
        };

        // Runs for every exit: success, failure and cancellation.
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(record) => tracing::info!(
                asset_id = %record.asset_id,
                status = ?record.status,
                elapsed_ms,
                "Media upload completed"
            ),
            Err(err) => log_failure(err, elapsed_ms),
        }

        result
    }

    async fn run_phases(
        &self,
        request: &UploadRequest,
        request_id: Uuid,
    ) -> Result<CompletionRecord, UploadError> {
        let file = self.validate(request)?;
        let session = self.initiate_with_id(&file, request_id).await?;
        let checksum = self.upload_with_id(&session, &file, request_id).await?;
        self.complete_with_id(session, checksum, request_id).await
    }

    #[tracing::instrument(
        skip(self, file),
        fields(media_type = %file.media_type(), size_bytes = file.size_bytes())
    )]
    async fn initiate_with_id(
        &self,
        file: &ValidatedFile,
        request_id: Uuid,
    ) -> Result<UploadSession, UploadError> {
        let url = self.api.api_url(INITIATE_PATH);
        let request = self
            .api
            .http()
            .post(&url)
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .json(&file.to_initiate_request());
        let request = self.api.authorize(request).await?;

        tracing::debug!(url = %url, content_type = %file.content_type(), "Requesting upload session");

        let response = request
            .send()
            .await
            .map_err(|e| UploadError::session(format!("Failed to send initiate request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = ErrorBody::parse(&error_text(response).await);
            return Err(UploadError::session_status(
                status.as_u16(),
                format!("Initiate failed with status {}: {}", status, body.describe()),
            ));
        }

        let body: InitiateUploadResponse = response.json().await.map_err(|e| {
            UploadError::session(format!("Failed to parse initiate response as JSON: {}", e))
        })?;
        let session = body.into_session()?;

        tracing::info!(
            session_id = %session.session_id(),
            expires_at = %session.expires_at(),
            checksum_algorithm = %session.checksum_algorithm(),
            "Upload session created"
        );

        Ok(session)
    }

    #[tracing::instrument(
        skip(self, session, file),
        fields(session_id = %session.session_id(), size_bytes = file.size_bytes())
    )]
    async fn upload_with_id(
        &self,
        session: &UploadSession,
        file: &ValidatedFile,
        request_id: Uuid,
    ) -> Result<Checksum, UploadError> {
        // Expiry is checked before touching the destination.
        self.ensure_active(session)?;

        let data = read_validated(file).await?;
        let checksum = session.checksum_algorithm().digest(&data);

        self.transfer(session, file, data, request_id).await?;

        // A transfer that finished after expiry did not land in a usable session.
        self.ensure_active(session)?;

        tracing::info!(checksum = %checksum, "File transferred");
        Ok(checksum)
    }

    async fn transfer(
        &self,
        session: &UploadSession,
        file: &ValidatedFile,
        data: Bytes,
        request_id: Uuid,
    ) -> Result<(), UploadError> {
        let url = self.api.resolve_url(session.upload_url());
        let transport = self.api.config().transport;

        let request = match transport {
            // Presigned destinations carry their own authorization.
            UploadTransport::Put => self
                .api
                .transfer_http()
                .put(&url)
                .header(CONTENT_TYPE, file.content_type())
                .header(REQUEST_ID_HEADER, request_id.to_string())
                .body(data),
            UploadTransport::Multipart => {
                let part = reqwest::multipart::Part::bytes(Vec::<u8>::from(data))
                    .file_name(file.file_name())
                    .mime_str(file.content_type())
                    .map_err(|e| {
                        UploadError::transfer(format!("Invalid content type for transfer: {}", e))
                    })?;
                let form = reqwest::multipart::Form::new()
                    .text("sessionId", session.session_id().to_string())
                    .part("file", part);
                let request = self
                    .api
                    .transfer_http()
                    .post(&url)
                    .header(REQUEST_ID_HEADER, request_id.to_string())
                    .multipart(form);
                self.api.authorize(request).await?
            }
        };

        tracing::debug!(url = %url, transport = ?transport, "Transferring file bytes");

        let response = request
            .send()
            .await
            .map_err(|e| UploadError::transfer(format!("Failed to transfer file: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = error_text(response).await;
            return Err(UploadError::transfer_status(
                status.as_u16(),
                format!("Transfer failed with status {}: {}", status, error_text),
            ));
        }

        Ok(())
    }

    #[tracing::instrument(
        skip(self, session, checksum),
        fields(session_id = %session.session_id())
    )]
    async fn complete_with_id(
        &self,
        session: UploadSession,
        checksum: Checksum,
        request_id: Uuid,
    ) -> Result<CompletionRecord, UploadError> {
        self.ensure_active(&session)?;

        if checksum.algorithm() != session.checksum_algorithm() {
            return Err(UploadError::Verification(format!(
                "Checksum uses {} but the session requires {}",
                checksum.algorithm(),
                session.checksum_algorithm()
            )));
        }

        let url = self.api.api_url(COMPLETE_PATH);
        let request = self
            .api
            .http()
            .post(&url)
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .json(&CompleteUploadRequest::new(&session, &checksum));
        let request = self.api.authorize(request).await?;

        let response = request
            .send()
            .await
            .map_err(|e| UploadError::session(format!("Failed to send complete request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = ErrorBody::parse(&error_text(response).await);
            return Err(completion_failure(status, &body, &session));
        }

        let body: CompleteUploadResponse = response.json().await.map_err(|e| {
            UploadError::session(format!("Failed to parse complete response as JSON: {}", e))
        })?;

        body.into_record()
    }

    fn ensure_active(&self, session: &UploadSession) -> Result<(), UploadError> {
        if session.is_expired(Utc::now(), self.api.config().expiry_margin) {
            return Err(session.expired_error());
        }
        Ok(())
    }
}

/// Map a non-success completion response to the matching error.
fn completion_failure(status: StatusCode, body: &ErrorBody, session: &UploadSession) -> UploadError {
    if body.is_checksum_mismatch() {
        return UploadError::Verification(format!(
            "Backend rejected checksum for session {}: {}",
            session.session_id(),
            body.describe()
        ));
    }

    if status == StatusCode::GONE {
        return session.expired_error();
    }

    UploadError::session_status(
        status.as_u16(),
        format!("Complete failed with status {}: {}", status, body.describe()),
    )
}

/// Read the whole file, refusing it if it changed size since validation.
async fn read_validated(file: &ValidatedFile) -> Result<Bytes, UploadError> {
    let data = tokio::fs::read(file.path()).await.map_err(|e| {
        UploadError::Validation(format!(
            "Failed to read file {}: {}",
            file.path().display(),
            e
        ))
    })?;

    if data.len() as u64 != file.size_bytes() {
        return Err(UploadError::Validation(format!(
            "File changed after validation: expected {} bytes, read {}",
            file.size_bytes(),
            data.len()
        )));
    }

    Ok(Bytes::from(data))
}

fn log_failure(err: &UploadError, elapsed_ms: u64) {
    let code = err.error_code();
    let recoverable = err.is_recoverable();
    match err.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %err, code, recoverable, elapsed_ms, "Media upload failed")
        }
        LogLevel::Warn => {
            tracing::warn!(error = %err, code, recoverable, elapsed_ms, "Media upload failed")
        }
        LogLevel::Error => {
            tracing::error!(error = %err, code, recoverable, elapsed_ms, "Media upload failed")
        }
    }
}
