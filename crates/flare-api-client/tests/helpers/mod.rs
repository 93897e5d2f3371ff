//! Test helpers: fixture files and an uploader pointed at a mock broker.
//!
//! Run with: `cargo test -p flare-api-client --test upload_test`

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use flare_api_client::{ApiClient, MediaUploader, StaticToken};
use flare_core::{ClientConfig, MediaLimits, MediaType, UploadPolicy, UploadTransport};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const MB: u64 = 1024 * 1024;
pub const TEST_TOKEN: &str = "test-token-123";
pub const INITIATE_PATH: &str = "/api/v1/uploads/initiate";
pub const COMPLETE_PATH: &str = "/api/v1/uploads/complete";
pub const STORAGE_PATH: &str = "/storage/session-1";

const JPEG_HEAD: [u8; 10] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// 5 MB images, 10 MB audio, 100 MB video.
pub fn test_policy() -> UploadPolicy {
    UploadPolicy::empty()
        .with_limits(
            MediaType::Image,
            MediaLimits::new(5 * MB, ["image/jpeg", "image/png"]),
        )
        .with_limits(
            MediaType::Audio,
            MediaLimits::new(10 * MB, ["audio/mpeg", "audio/mp4"]),
        )
        .with_limits(MediaType::Video, MediaLimits::new(100 * MB, ["video/mp4"]))
}

pub fn uploader(server: &mockito::Server) -> MediaUploader {
    uploader_with_transport(server, UploadTransport::Put)
}

pub fn uploader_with_transport(
    server: &mockito::Server,
    transport: UploadTransport,
) -> MediaUploader {
    let config = ClientConfig::new(server.url()).with_transport(transport);
    let api = ApiClient::new(config, Arc::new(StaticToken::new(TEST_TOKEN)))
        .expect("client config is valid");
    MediaUploader::new(api, test_policy())
}

/// JPEG signature padded with zeros to `len` bytes.
pub fn jpeg_file(len: u64) -> NamedTempFile {
    sized_file(&JPEG_HEAD, len, ".jpg")
}

/// File without a recognizable signature.
pub fn plain_file(len: u64, suffix: &str) -> NamedTempFile {
    sized_file(&[], len, suffix)
}

fn sized_file(head: &[u8], len: u64, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(head).expect("write file head");
    file.as_file().set_len(len).expect("size temp file");
    file
}

pub fn file_bytes(file: &NamedTempFile) -> Vec<u8> {
    std::fs::read(file.path()).expect("read fixture")
}

pub fn in_fifteen_minutes() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(15)
}

pub fn initiate_body(upload_url: &str, expires_at: DateTime<Utc>) -> Value {
    json!({
        "sessionId": "session-1",
        "uploadUrl": upload_url,
        "expiresAt": expires_at.to_rfc3339(),
        "checksumAlgorithm": "sha256"
    })
}

pub fn complete_body() -> Value {
    json!({
        "assetId": "asset-42",
        "url": "https://cdn.example.org/assets/asset-42.jpg",
        "status": "completed"
    })
}
