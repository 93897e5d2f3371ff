//! Validation modules

pub mod content_type;
pub mod media;

pub use content_type::{
    content_type_for_extension, content_type_for_path, is_generic_content_type,
    media_type_for_path, normalize_content_type, sniff_content_type,
};
pub use media::{validate_media, SNIFF_LEN};
