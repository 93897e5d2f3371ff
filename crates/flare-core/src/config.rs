//! Configuration module
//!
//! Upload policy (per media type size and MIME limits) and HTTP client settings.
//! Both can be built explicitly or loaded from the environment.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::MediaType;
use crate::validation::normalize_content_type;

// Common constants
const IMAGE_MAX_SIZE_MB: u64 = 5;
const AUDIO_MAX_SIZE_MB: u64 = 10;
const VIDEO_MAX_SIZE_MB: u64 = 100;
const IMAGE_ALLOWED_CONTENT_TYPES: &str =
    "image/jpeg,image/png,image/gif,image/webp,image/heic,image/heif";
const AUDIO_ALLOWED_CONTENT_TYPES: &str =
    "audio/mpeg,audio/mp4,audio/m4a,audio/aac,audio/wav,audio/x-wav,audio/ogg,audio/webm,audio/amr";
const VIDEO_ALLOWED_CONTENT_TYPES: &str = "video/mp4,video/quicktime,video/webm,video/3gpp";

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_API_VERSION: &str = "v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const TRANSFER_TIMEOUT_SECS: u64 = 300;
const EXPIRY_MARGIN_SECS: u64 = 5;
const MAX_EXPIRY_MARGIN_SECS: u64 = 3600;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Size and MIME limits for one media type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaLimits {
    pub max_file_size: u64,
    pub allowed_content_types: Vec<String>,
}

impl MediaLimits {
    pub fn new<I, S>(max_file_size: u64, allowed_content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            max_file_size,
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| normalize_content_type(ct.as_ref()))
                .filter(|ct| !ct.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, content_type: &str) -> bool {
        let content_type = normalize_content_type(content_type);
        self.allowed_content_types.iter().any(|ct| *ct == content_type)
    }
}

/// Per-type upload policy passed explicitly to validation.
///
/// A media type with no entry is not uploadable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    limits: HashMap<MediaType, MediaLimits>,
}

impl UploadPolicy {
    /// Policy that allows nothing; add types with `with_limits`.
    pub fn empty() -> Self {
        Self {
            limits: HashMap::new(),
        }
    }

    pub fn with_limits(mut self, media_type: MediaType, limits: MediaLimits) -> Self {
        self.limits.insert(media_type, limits);
        self
    }

    pub fn limits_for(&self, media_type: MediaType) -> Option<&MediaLimits> {
        self.limits.get(&media_type)
    }

    /// Load limits from `IMAGE_MAX_SIZE_MB`, `IMAGE_ALLOWED_CONTENT_TYPES` and the
    /// `AUDIO_`/`VIDEO_` equivalents, falling back to the defaults.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let mut policy = Self::empty();
        for media_type in MediaType::ALL {
            let (prefix, max_mb, content_types) = match media_type {
                MediaType::Image => ("IMAGE", IMAGE_MAX_SIZE_MB, IMAGE_ALLOWED_CONTENT_TYPES),
                MediaType::Audio => ("AUDIO", AUDIO_MAX_SIZE_MB, AUDIO_ALLOWED_CONTENT_TYPES),
                MediaType::Video => ("VIDEO", VIDEO_MAX_SIZE_MB, VIDEO_ALLOWED_CONTENT_TYPES),
            };

            let max_size_mb = match env::var(format!("{}_MAX_SIZE_MB", prefix)) {
                Ok(value) => value.trim().parse::<u64>().map_err(|_| {
                    anyhow::anyhow!("{}_MAX_SIZE_MB must be a whole number of megabytes", prefix)
                })?,
                Err(_) => max_mb,
            };

            let allowed = env::var(format!("{}_ALLOWED_CONTENT_TYPES", prefix))
                .unwrap_or_else(|_| content_types.to_string());

            let max_file_size = megabytes_to_bytes(prefix, max_size_mb)?;

            policy = policy.with_limits(media_type, MediaLimits::new(max_file_size, allowed.split(',')));
        }

        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (media_type, limits) in &self.limits {
            if limits.max_file_size == 0 {
                return Err(anyhow::anyhow!(
                    "Maximum {} size must be greater than zero",
                    media_type
                ));
            }
            if limits.allowed_content_types.is_empty() {
                return Err(anyhow::anyhow!(
                    "At least one content type must be allowed for {}",
                    media_type
                ));
            }
            if let Some(ct) = limits
                .allowed_content_types
                .iter()
                .find(|ct| MediaType::from_content_type(ct) != Some(*media_type))
            {
                return Err(anyhow::anyhow!(
                    "Content type {} cannot be allowed for {}",
                    ct,
                    media_type
                ));
            }
        }
        Ok(())
    }
}

fn megabytes_to_bytes(prefix: &str, megabytes: u64) -> Result<u64, anyhow::Error> {
    megabytes
        .checked_mul(BYTES_PER_MB)
        .ok_or_else(|| anyhow::anyhow!("{}_MAX_SIZE_MB is too large: {}", prefix, megabytes))
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::empty()
            .with_limits(
                MediaType::Image,
                MediaLimits::new(
                    IMAGE_MAX_SIZE_MB * BYTES_PER_MB,
                    IMAGE_ALLOWED_CONTENT_TYPES.split(','),
                ),
            )
            .with_limits(
                MediaType::Audio,
                MediaLimits::new(
                    AUDIO_MAX_SIZE_MB * BYTES_PER_MB,
                    AUDIO_ALLOWED_CONTENT_TYPES.split(','),
                ),
            )
            .with_limits(
                MediaType::Video,
                MediaLimits::new(
                    VIDEO_MAX_SIZE_MB * BYTES_PER_MB,
                    VIDEO_ALLOWED_CONTENT_TYPES.split(','),
                ),
            )
    }
}

/// How file bytes reach the destination named by the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadTransport {
    /// Direct PUT of the raw bytes to a presigned URL
    #[default]
    Put,
    /// Multipart POST to a broker endpoint
    Multipart,
}

impl FromStr for UploadTransport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "put" => Ok(UploadTransport::Put),
            "multipart" | "post" => Ok(UploadTransport::Multipart),
            other => Err(anyhow::anyhow!(
                "Invalid upload transport: {}. Must be 'put' or 'multipart'",
                other
            )),
        }
    }
}

/// HTTP client settings
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
    /// Timeout for initiate/complete calls
    pub request_timeout: Duration,
    /// Timeout for the byte transfer
    pub transfer_timeout: Duration,
    pub transport: UploadTransport,
    /// A session this close to expiry is treated as expired
    pub expiry_margin: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            transfer_timeout: Duration::from_secs(TRANSFER_TIMEOUT_SECS),
            transport: UploadTransport::default(),
            expiry_margin: Duration::from_secs(EXPIRY_MARGIN_SECS),
        }
    }

    pub fn with_transport(mut self, transport: UploadTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }

    /// API version prefix (e.g. "/api/v1").
    pub fn api_prefix(&self) -> String {
        format!("/api/{}", self.api_version)
    }

    /// Load from FLARE_API_URL (or API_URL), FLARE_API_VERSION, FLARE_REQUEST_TIMEOUT_SECS,
    /// FLARE_TRANSFER_TIMEOUT_SECS, FLARE_UPLOAD_TRANSPORT and FLARE_EXPIRY_MARGIN_SECS.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let base_url = env::var("FLARE_API_URL")
            .or_else(|_| env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let transport = env::var("FLARE_UPLOAD_TRANSPORT")
            .unwrap_or_else(|_| "put".to_string())
            .parse()?;

        let config = ClientConfig {
            api_version: env::var("FLARE_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            request_timeout: Duration::from_secs(
                env::var("FLARE_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
            transfer_timeout: Duration::from_secs(
                env::var("FLARE_TRANSFER_TIMEOUT_SECS")
                    .unwrap_or_else(|_| TRANSFER_TIMEOUT_SECS.to_string())
                    .parse()
                    .unwrap_or(TRANSFER_TIMEOUT_SECS),
            ),
            expiry_margin: Duration::from_secs(
                env::var("FLARE_EXPIRY_MARGIN_SECS")
                    .unwrap_or_else(|_| EXPIRY_MARGIN_SECS.to_string())
                    .parse()
                    .unwrap_or(EXPIRY_MARGIN_SECS),
            ),
            transport,
            ..ClientConfig::new(base_url)
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "FLARE_API_URL must be an http:// or https:// URL, got '{}'",
                self.base_url
            ));
        }

        if self.api_version.trim().is_empty() || self.api_version.contains('/') {
            return Err(anyhow::anyhow!(
                "FLARE_API_VERSION must be a single path segment such as 'v1'"
            ));
        }

        if self.request_timeout.is_zero() || self.transfer_timeout.is_zero() {
            return Err(anyhow::anyhow!("Request timeouts must be greater than zero"));
        }

        if self.expiry_margin > Duration::from_secs(MAX_EXPIRY_MARGIN_SECS) {
            return Err(anyhow::anyhow!(
                "FLARE_EXPIRY_MARGIN_SECS must be at most {} seconds",
                MAX_EXPIRY_MARGIN_SECS
            ));
        }

        Ok(())
    }
}
