//! Content-Type helpers: extension lookups and magic-byte sniffing.

use std::path::Path;

use crate::models::MediaType;

/// Containers whose magic bytes do not tell audio from video.
const AMBIGUOUS_CONTAINERS: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/3gpp",
    "video/quicktime",
    "audio/mp4",
    "audio/m4a",
    "audio/webm",
    "application/ogg",
];

/// Declared types that say nothing about the content.
const GENERIC_CONTENT_TYPES: &[&str] = &[
    "",
    "application/octet-stream",
    "binary/octet-stream",
    "application/unknown",
];

/// Lowercase, parameter-free form of a MIME type (`Image/JPEG; q=1` -> `image/jpeg`).
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Canonical Content-Type for a file extension.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    let content_type = match extension.to_lowercase().as_str() {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "weba" => "audio/webm",
        "amr" => "audio/amr",
        // Videos
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => return None,
    };
    Some(content_type)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    extension_of(path).and_then(|ext| content_type_for_extension(&ext))
}

pub fn media_type_for_path(path: &Path) -> Option<MediaType> {
    content_type_for_path(path).and_then(MediaType::from_content_type)
}

/// MIME type recognized from the leading bytes of a file, if any.
pub fn sniff_content_type(head: &[u8]) -> Option<&'static str> {
    infer::get(head).map(|kind| kind.mime_type())
}

pub fn is_ambiguous_container(content_type: &str) -> bool {
    AMBIGUOUS_CONTAINERS.contains(&normalize_content_type(content_type).as_str())
}

pub fn is_generic_content_type(content_type: &str) -> bool {
    GENERIC_CONTENT_TYPES.contains(&normalize_content_type(content_type).as_str())
}
