//! Upload coordinator integration tests against a mock broker.
//!
//! Run with: `cargo test -p flare-api-client --test upload_test`

mod helpers;

use chrono::{Duration, Utc};
use flare_core::{
    ChecksumAlgorithm, CompletionStatus, ErrorMetadata, MediaType, UploadErrorKind, UploadRequest,
    UploadSession, UploadTransport,
};
use helpers::*;
use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_jpeg_upload_runs_each_phase_once() {
    let mut server = mockito::Server::new_async().await;
    let file = jpeg_file(2 * MB);
    let expected = ChecksumAlgorithm::Sha256.digest(&file_bytes(&file));

    let initiate = server
        .mock("POST", INITIATE_PATH)
        .match_header("authorization", format!("Bearer {}", TEST_TOKEN).as_str())
        .match_header("x-request-id", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "mediaType": "image",
            "sizeBytes": 2 * MB,
            "mimeType": "image/jpeg"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), in_fifteen_minutes())
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let transfer = server
        .mock("PUT", STORAGE_PATH)
        .match_header("content-type", "image/jpeg")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let complete = server
        .mock("POST", COMPLETE_PATH)
        .match_header("authorization", format!("Bearer {}", TEST_TOKEN).as_str())
        .match_body(Matcher::PartialJson(json!({
            "sessionId": "session-1",
            "checksum": expected.hex(),
            "checksumAlgorithm": "sha256"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(complete_body().to_string())
        .expect(1)
        .create_async()
        .await;

    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let record = uploader(&server).upload_media(&request).await.unwrap();

    assert_eq!(record.asset_id, "asset-42");
    assert!(!record.asset_id.is_empty());
    assert_eq!(record.status, CompletionStatus::Completed);
    assert_eq!(
        record.final_url,
        "https://cdn.example.org/assets/asset-42.jpg"
    );

    initiate.assert_async().await;
    transfer.assert_async().await;
    complete.assert_async().await;
}

#[tokio::test]
async fn test_oversized_audio_makes_no_network_call() {
    let mut server = mockito::Server::new_async().await;
    let initiate = server
        .mock("POST", INITIATE_PATH)
        .expect(0)
        .create_async()
        .await;
    let complete = server
        .mock("POST", COMPLETE_PATH)
        .expect(0)
        .create_async()
        .await;

    let file = plain_file(50 * MB, ".mp3");
    let request = UploadRequest::new(file.path(), MediaType::Audio, 50 * MB, "audio/mpeg");

    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Validation);
    assert!(!err.is_recoverable());
    initiate.assert_async().await;
    complete.assert_async().await;
}

#[tokio::test]
async fn test_expired_session_never_reaches_transfer() {
    let mut server = mockito::Server::new_async().await;
    let expired = Utc::now() - Duration::minutes(1);

    let initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), expired).to_string())
        .expect(1)
        .create_async()
        .await;
    let transfer = server
        .mock("PUT", STORAGE_PATH)
        .expect(0)
        .create_async()
        .await;
    let complete = server
        .mock("POST", COMPLETE_PATH)
        .expect(0)
        .create_async()
        .await;

    let file = jpeg_file(1024);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::SessionExpired);
    assert!(err.to_string().contains("session-1"));
    initiate.assert_async().await;
    transfer.assert_async().await;
    complete.assert_async().await;
}

#[tokio::test]
async fn test_upload_phase_checks_expiry_before_transfer() {
    let mut server = mockito::Server::new_async().await;
    let transfer = server
        .mock("PUT", STORAGE_PATH)
        .expect(0)
        .create_async()
        .await;

    let uploader = uploader(&server);
    let file = jpeg_file(1024);
    let validated = uploader
        .validate(&UploadRequest::from_path(file.path(), MediaType::Image).unwrap())
        .unwrap();

    // Inside the default 5 second safety margin.
    let session = UploadSession::new(
        "session-1",
        format!("{}{}", server.url(), STORAGE_PATH),
        Utc::now() + Duration::seconds(2),
        ChecksumAlgorithm::Sha256,
    );

    let err = uploader.upload(&session, &validated).await.unwrap_err();
    assert_eq!(err.kind(), UploadErrorKind::SessionExpired);
    transfer.assert_async().await;
}

#[tokio::test]
async fn test_checksum_mismatch_conflict_is_verification_error() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), in_fifteen_minutes())
                .to_string(),
        )
        .create_async()
        .await;
    let _transfer = server
        .mock("PUT", STORAGE_PATH)
        .with_status(200)
        .create_async()
        .await;
    let complete = server
        .mock("POST", COMPLETE_PATH)
        .with_status(409)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "code": "CHECKSUM_MISMATCH", "message": "stored object digest differs" })
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let file = jpeg_file(4096);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Verification);
    assert_eq!(err.error_code(), "CHECKSUM_MISMATCH");
    assert!(err.to_string().contains("stored object digest differs"));
    complete.assert_async().await;
}

#[tokio::test]
async fn test_checksum_mismatch_status_discards_record() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), in_fifteen_minutes())
                .to_string(),
        )
        .create_async()
        .await;
    let _transfer = server
        .mock("PUT", STORAGE_PATH)
        .with_status(200)
        .create_async()
        .await;
    let _complete = server
        .mock("POST", COMPLETE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "assetId": "asset-42",
                "url": "https://cdn.example.org/assets/asset-42.jpg",
                "status": "checksum_mismatch"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let file = jpeg_file(4096);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let result = uploader(&server).upload_media(&request).await;

    let err = result.expect_err("a mismatched upload must not surface a record");
    assert_eq!(err.kind(), UploadErrorKind::Verification);
}

#[tokio::test]
async fn test_malformed_initiate_response_is_session_error() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "sessionId": "session-1" }).to_string())
        .create_async()
        .await;
    let transfer = server
        .mock("PUT", STORAGE_PATH)
        .expect(0)
        .create_async()
        .await;

    let file = jpeg_file(1024);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Session);
    assert!(err.to_string().contains("uploadUrl"));
    transfer.assert_async().await;
}

#[tokio::test]
async fn test_rejected_initiate_keeps_status() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let file = jpeg_file(1024);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Session);
    assert_eq!(err.http_status(), Some(503));
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn test_transfer_failure_skips_complete() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), in_fifteen_minutes())
                .to_string(),
        )
        .create_async()
        .await;
    let transfer = server
        .mock("PUT", STORAGE_PATH)
        .with_status(500)
        .with_body("storage unavailable")
        .expect(1)
        .create_async()
        .await;
    let complete = server
        .mock("POST", COMPLETE_PATH)
        .expect(0)
        .create_async()
        .await;

    let file = jpeg_file(1024);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Transfer);
    assert_eq!(err.http_status(), Some(500));
    transfer.assert_async().await;
    complete.assert_async().await;
}

#[tokio::test]
async fn test_completion_after_server_side_expiry() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), in_fifteen_minutes())
                .to_string(),
        )
        .create_async()
        .await;
    let _transfer = server
        .mock("PUT", STORAGE_PATH)
        .with_status(200)
        .create_async()
        .await;
    let _complete = server
        .mock("POST", COMPLETE_PATH)
        .with_status(410)
        .create_async()
        .await;

    let file = jpeg_file(1024);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::SessionExpired);
}

#[tokio::test]
async fn test_multipart_transport_posts_to_relative_broker_url() {
    let mut server = mockito::Server::new_async().await;
    let broker_path = "/api/v1/uploads/broker/session-1";

    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(initiate_body(broker_path, in_fifteen_minutes()).to_string())
        .create_async()
        .await;
    let broker = server
        .mock("POST", broker_path)
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data".to_string()),
        )
        .match_header("authorization", format!("Bearer {}", TEST_TOKEN).as_str())
        .with_status(201)
        .expect(1)
        .create_async()
        .await;
    let _complete = server
        .mock("POST", COMPLETE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "assetId": "asset-7", "url": "https://cdn/asset-7.mp4", "status": "processing" })
                .to_string(),
        )
        .create_async()
        .await;

    let file = plain_file(3 * MB, ".mp4");
    let request = UploadRequest::from_path(file.path(), MediaType::Video).unwrap();
    let record = uploader_with_transport(&server, UploadTransport::Multipart)
        .upload_media(&request)
        .await
        .unwrap();

    assert_eq!(record.asset_id, "asset-7");
    assert_eq!(record.status, CompletionStatus::Processing);
    broker.assert_async().await;
}

#[tokio::test]
async fn test_cancelled_upload_makes_no_calls() {
    let mut server = mockito::Server::new_async().await;
    let initiate = server
        .mock("POST", INITIATE_PATH)
        .expect(0)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let file = jpeg_file(1024);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server)
        .upload_media_cancellable(&request, &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Cancelled);
    initiate.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_uploads_are_independent() {
    let mut server = mockito::Server::new_async().await;
    let initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), in_fifteen_minutes())
                .to_string(),
        )
        .expect(2)
        .create_async()
        .await;
    let _transfer = server
        .mock("PUT", STORAGE_PATH)
        .with_status(200)
        .expect(2)
        .create_async()
        .await;
    let _complete = server
        .mock("POST", COMPLETE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(complete_body().to_string())
        .expect(2)
        .create_async()
        .await;

    let uploader = uploader(&server);
    let first = jpeg_file(1024);
    let second = jpeg_file(2048);
    let first_request = UploadRequest::from_path(first.path(), MediaType::Image).unwrap();
    let second_request = UploadRequest::from_path(second.path(), MediaType::Image).unwrap();

    let (a, b) = tokio::join!(
        uploader.upload_media(&first_request),
        uploader.upload_media(&second_request)
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    initiate.assert_async().await;
}

#[tokio::test]
async fn test_cancel_during_transfer_abandons_upload() {
    let mut server = mockito::Server::new_async().await;

    // Accepts the transfer connection and never answers.
    let storage = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let storage_url = format!("http://{}{}", storage.local_addr().unwrap(), STORAGE_PATH);

    let initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(initiate_body(&storage_url, in_fifteen_minutes()).to_string())
        .expect(1)
        .create_async()
        .await;
    let complete = server
        .mock("POST", COMPLETE_PATH)
        .expect(0)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    let stalled = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let (socket, _) = storage.accept().await.expect("transfer connects");
            cancel.cancel();
            socket
        }
    });

    let file = jpeg_file(64 * 1024);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        uploader(&server).upload_media_cancellable(&request, &cancel),
    )
    .await
    .expect("cancellation ends the upload")
    .unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Cancelled);
    let _socket = stalled.await.unwrap();
    initiate.assert_async().await;
    complete.assert_async().await;
}

#[tokio::test]
async fn test_checksum_mismatch_on_bad_request_is_verification_error() {
    let mut server = mockito::Server::new_async().await;
    let _initiate = server
        .mock("POST", INITIATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            initiate_body(&format!("{}{}", server.url(), STORAGE_PATH), in_fifteen_minutes())
                .to_string(),
        )
        .create_async()
        .await;
    let _transfer = server
        .mock("PUT", STORAGE_PATH)
        .with_status(200)
        .create_async()
        .await;
    let _complete = server
        .mock("POST", COMPLETE_PATH)
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(json!({ "code": "CHECKSUM_MISMATCH", "message": "digest differs" }).to_string())
        .create_async()
        .await;

    let file = jpeg_file(4096);
    let request = UploadRequest::from_path(file.path(), MediaType::Image).unwrap();
    let err = uploader(&server).upload_media(&request).await.unwrap_err();

    assert_eq!(err.kind(), UploadErrorKind::Verification);
    assert!(err.to_string().contains("digest differs"));
}
