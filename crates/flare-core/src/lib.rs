//! Flare Core Library
//!
//! Domain models, error types, configuration, checksums and local validation
//! shared by the upload client and the command-line tools.

pub mod checksum;
pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use checksum::{Checksum, ChecksumAlgorithm};
pub use config::{ClientConfig, MediaLimits, UploadPolicy, UploadTransport};
pub use error::{ErrorMetadata, LogLevel, UploadError, UploadErrorKind};
pub use models::{
    CompletionRecord, CompletionStatus, MediaType, UploadRequest, UploadSession, ValidatedFile,
};
pub use validation::validate_media;
