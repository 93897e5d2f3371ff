//! Local validation of a file against the upload policy.
//!
//! Reads file metadata and at most `SNIFF_LEN` leading bytes. Nothing here
//! touches the network.

use std::fs::File;
use std::io::Read;

use crate::config::UploadPolicy;
use crate::error::UploadError;
use crate::models::{MediaType, UploadRequest, ValidatedFile};
use crate::validation::content_type::{
    is_ambiguous_container, is_generic_content_type, normalize_content_type, sniff_content_type,
};

/// Bytes read from the start of a file for signature detection.
pub const SNIFF_LEN: u64 = 8192;

const MB: u64 = 1024 * 1024;

/// Check a declared upload against the policy for its media type.
///
/// Fails with `UploadError::Validation` when the file is missing or empty, its
/// actual size exceeds the per-type limit or disagrees with the declared size,
/// the declared MIME type does not belong to the declared media type, the
/// content signature contradicts the declaration, or the effective MIME type is
/// not on the allow-list.
pub fn validate_media(
    request: &UploadRequest,
    policy: &UploadPolicy,
) -> Result<ValidatedFile, UploadError> {
    let media_type = request.media_type();
    let limits = policy.limits_for(media_type).ok_or_else(|| {
        UploadError::Validation(format!("Uploads of type {} are not allowed", media_type))
    })?;

    let path = request.path();
    let metadata = std::fs::metadata(path).map_err(|e| {
        UploadError::Validation(format!("Failed to read file {}: {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(UploadError::Validation(format!(
            "Not a regular file: {}",
            path.display()
        )));
    }

    let actual_size = metadata.len();
    if actual_size == 0 {
        return Err(UploadError::Validation("File is empty".to_string()));
    }

    if actual_size > limits.max_file_size {
        return Err(UploadError::Validation(format!(
            "File size {} bytes exceeds maximum allowed for {} ({} MB)",
            actual_size,
            media_type,
            limits.max_file_size / MB
        )));
    }

    if actual_size != request.size_bytes() {
        return Err(UploadError::Validation(format!(
            "Declared size {} bytes does not match actual size {} bytes",
            request.size_bytes(),
            actual_size
        )));
    }

    let head = read_head(request)?;
    let sniffed = sniff_content_type(&head);

    // A generic declaration (e.g. a file without extension) defers to the signature.
    let declared = normalize_content_type(request.mime_type());
    if is_generic_content_type(&declared) {
        if sniffed.is_none() {
            return Err(UploadError::Validation(format!(
                "Cannot determine the content type of {}; declare a {} MIME type",
                path.display(),
                media_type
            )));
        }
    } else if MediaType::from_content_type(&declared) != Some(media_type)
        && !is_ambiguous_container(&declared)
    {
        return Err(UploadError::Validation(format!(
            "Content-Type '{}' is not a {} type",
            request.mime_type(),
            media_type
        )));
    }

    let content_type = effective_content_type(media_type, &declared, sniffed)?;

    if !limits.allows(&content_type) {
        return Err(UploadError::Validation(format!(
            "Content-Type '{}' is not allowed for {}. Allowed: {}",
            content_type,
            media_type,
            limits.allowed_content_types.join(", ")
        )));
    }

    tracing::debug!(
        path = %path.display(),
        media_type = %media_type,
        content_type = %content_type,
        size_bytes = actual_size,
        "File passed upload validation"
    );

    Ok(ValidatedFile::new(
        request.clone(),
        content_type,
        actual_size,
    ))
}

fn read_head(request: &UploadRequest) -> Result<Vec<u8>, UploadError> {
    let file = File::open(request.path()).map_err(|e| {
        UploadError::Validation(format!(
            "Failed to open file {}: {}",
            request.path().display(),
            e
        ))
    })?;

    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut head).map_err(|e| {
        UploadError::Validation(format!(
            "Failed to read file {}: {}",
            request.path().display(),
            e
        ))
    })?;

    Ok(head)
}

/// Reconcile the declared MIME type with the sniffed one.
///
/// A recognized signature wins unless it is a container shared by audio and
/// video, in which case the declared media type decides (images never come in
/// those).
fn effective_content_type(
    media_type: MediaType,
    declared: &str,
    sniffed: Option<&'static str>,
) -> Result<String, UploadError> {
    let Some(sniffed) = sniffed else {
        return Ok(declared.to_string());
    };

    if is_ambiguous_container(sniffed) {
        if media_type == MediaType::Image {
            return Err(UploadError::Validation(format!(
                "File content looks like {}, not an image",
                sniffed
            )));
        }
        if MediaType::from_content_type(declared) == Some(media_type) {
            return Ok(declared.to_string());
        }
        let subtype = sniffed.split_once('/').map_or(sniffed, |(_, subtype)| subtype);
        return Ok(format!("{}/{}", media_type.as_str(), subtype));
    }

    if MediaType::from_content_type(sniffed) != Some(media_type) {
        return Err(UploadError::Validation(format!(
            "File content looks like {}, not {}",
            sniffed, media_type
        )));
    }

    Ok(sniffed.to_string())
}
