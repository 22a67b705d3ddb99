//! Extension based classification of library items.
//!
//! The same tables drive filtering, the `type` field of list responses and
//! the `Content-Type` of streamed payloads.

use std::path::Path;

use serde::{Deserialize, Serialize};

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".svg", ".ico", ".tif", ".tiff", ".heic",
    ".heif", ".avif",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".webm", ".mov", ".avi", ".mkv", ".m4v", ".flv", ".wmv", ".mpg", ".mpeg",
];

const AUDIO_EXTENSIONS: &[&str] = &[
    ".mp3", ".wav", ".ogg", ".flac", ".m4a", ".aac", ".opus", ".wma",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".txt", ".md", ".rtf", ".xls", ".xlsx", ".ppt", ".pptx", ".csv",
];

/// Coarse media category of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Document,
    Other,
}

impl FileKind {
    /// Classifies an extension. Accepts `png`, `.png` or `.PNG` alike.
    pub fn from_extension(extension: &str) -> Self {
        let extension = normalize_extension(extension);
        let extension = extension.as_str();

        if IMAGE_EXTENSIONS.contains(&extension) {
            FileKind::Image
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            FileKind::Video
        } else if AUDIO_EXTENSIONS.contains(&extension) {
            FileKind::Audio
        } else if DOCUMENT_EXTENSIONS.contains(&extension) {
            FileKind::Document
        } else {
            FileKind::Other
        }
    }

    /// Whether width and height are meaningful for this kind.
    pub fn is_visual(self) -> bool {
        matches!(self, FileKind::Image | FileKind::Video)
    }

    /// Lower-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Audio => "audio",
            FileKind::Document => "document",
            FileKind::Other => "other",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cases an extension and guarantees a single leading dot.
///
/// Blank input stays blank so that extension-less files never compare equal
/// to a bare `"."`.
pub fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return String::new();
    }
    format!(".{}", trimmed.to_lowercase())
}

/// Extracts the normalized extension of a file name.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

/// MIME type served for an extension, `application/octet-stream` when unknown.
pub fn mime_for_extension(extension: &str) -> String {
    let extension = normalize_extension(extension);
    mime_guess::from_ext(extension.trim_start_matches('.'))
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup_is_case_and_dot_insensitive() {
        assert_eq!(FileKind::from_extension("png"), FileKind::Image);
        assert_eq!(FileKind::from_extension(".PNG"), FileKind::Image);
        assert_eq!(FileKind::from_extension("Mp4"), FileKind::Video);
        assert_eq!(FileKind::from_extension(".flac"), FileKind::Audio);
        assert_eq!(FileKind::from_extension("pdf"), FileKind::Document);
        assert_eq!(FileKind::from_extension(".xyz"), FileKind::Other);
        assert_eq!(FileKind::from_extension(""), FileKind::Other);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("JPG"), ".jpg");
        assert_eq!(normalize_extension(".Jpg"), ".jpg");
        assert_eq!(normalize_extension("  .webm "), ".webm");
        assert_eq!(normalize_extension(""), "");
        assert_eq!(normalize_extension("."), "");
    }

    #[test]
    fn test_extension_of_file_names() {
        assert_eq!(extension_of("holiday.JPEG"), ".jpeg");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_mime_lookup() {
        assert_eq!(mime_for_extension(".png"), "image/png");
        assert_eq!(mime_for_extension("mp4"), "video/mp4");
        assert_eq!(mime_for_extension(".pdf"), "application/pdf");
        assert_eq!(mime_for_extension(".nope-such-ext"), "application/octet-stream");
        assert_eq!(mime_for_extension(""), "application/octet-stream");
    }

    #[test]
    fn test_visual_kinds() {
        assert!(FileKind::Image.is_visual());
        assert!(FileKind::Video.is_visual());
        assert!(!FileKind::Audio.is_visual());
        assert!(!FileKind::Other.is_visual());
    }
}
