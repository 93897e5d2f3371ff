//! Domain models for the upload workflow

pub mod media;
pub mod upload;

pub use media::MediaType;
pub use upload::{
    CompleteUploadRequest, CompleteUploadResponse, CompletionRecord, CompletionStatus, ErrorBody,
    InitiateUploadRequest, InitiateUploadResponse, UploadRequest, UploadSession, ValidatedFile,
};
