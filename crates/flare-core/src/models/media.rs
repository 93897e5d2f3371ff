use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media a report attachment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Audio,
    Video,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Image, MediaType::Audio, MediaType::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Audio => "audio",
            MediaType::Video => "video",
        }
    }

    /// Media type implied by the top-level part of a MIME type (`image/png` -> Image).
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let top_level = content_type.split('/').next()?.trim().to_lowercase();
        match top_level.as_str() {
            "image" => Some(MediaType::Image),
            "audio" => Some(MediaType::Audio),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" | "images" => Ok(MediaType::Image),
            "audio" | "audios" => Ok(MediaType::Audio),
            "video" | "videos" => Ok(MediaType::Video),
            other => Err(format!(
                "Invalid media type: {}. Must be one of: image, audio, video",
                other
            )),
        }
    }
}
