//! Day content model
//!
//! A day folder in the content store holds one optional text file plus any
//! number of binary items. Every file is classified exactly once by
//! extension into a closed [`FileKind`]; everything downstream matches on
//! that enum instead of re-inspecting paths.

pub mod fetch;

use std::path::{Path, PathBuf};

use crate::channel::MediaKind;

pub use fetch::{ContentFetcher, FetchOutcome};

const TEXT_EXTENSIONS: &[&str] = &["txt", "text"];
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tiff", "tif",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v", "3gp", "ogv",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "ogg", "flac", "aac", "m4a", "wma", "opus", "amr",
];
const DOCUMENT_EXTENSIONS: &[&str] = &["doc", "docx", "pdf"];

/// Classification of a content file, computed once per file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Unknown,
}

impl FileKind {
    /// Classify a file by its extension (case-insensitive).
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let ext = ext.as_str();

        if TEXT_EXTENSIONS.contains(&ext) {
            Self::Text
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext) {
            Self::Video
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Self::Audio
        } else if DOCUMENT_EXTENSIONS.contains(&ext) {
            Self::Document
        } else {
            Self::Unknown
        }
    }

    /// Channel send method for this kind. Unknown files degrade to plain
    /// document attachments.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Self::Image => Some(MediaKind::Photo),
            Self::Video => Some(MediaKind::Video),
            Self::Audio => Some(MediaKind::Audio),
            Self::Document | Self::Unknown => Some(MediaKind::Document),
            Self::Text => None,
        }
    }

    /// Images, videos and audio are sent as protected (non-forwardable)
    /// media; documents go out as plain attachments.
    pub fn is_protected_media(&self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::Audio)
    }
}

/// One downloaded binary item of a day package
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Local path of the downloaded file
    pub local_path: PathBuf,

    /// Send method for the item
    pub kind: MediaKind,
}

/// Everything one day folder delivers to one subscriber.
///
/// Transient: built fresh on every fetch, never persisted.
#[derive(Debug, Clone, Default)]
pub struct ContentPackage {
    /// Formatted text message, if the folder has a text file
    pub text: Option<String>,

    /// Protected media items (images, videos, audio), in listing order
    pub media: Vec<MediaItem>,

    /// Plain document attachments, in listing order
    pub documents: Vec<MediaItem>,
}

impl ContentPackage {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.media.is_empty() && self.documents.is_empty()
    }

    /// Number of binary items in the package.
    pub fn binary_count(&self) -> usize {
        self.media.len() + self.documents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_by_extension() {
        assert_eq!(FileKind::from_path("day.txt"), FileKind::Text);
        assert_eq!(FileKind::from_path("photo.JPG"), FileKind::Image);
        assert_eq!(FileKind::from_path("clip.mp4"), FileKind::Video);
        assert_eq!(FileKind::from_path("lesson.mp3"), FileKind::Audio);
        assert_eq!(FileKind::from_path("workbook.pdf"), FileKind::Document);
        assert_eq!(FileKind::from_path("archive.zip"), FileKind::Unknown);
        assert_eq!(FileKind::from_path("noext"), FileKind::Unknown);
    }

    #[test]
    fn test_classification_uses_full_path() {
        assert_eq!(
            FileKind::from_path("course_a/1_day/intro.webp"),
            FileKind::Image
        );
    }

    #[test]
    fn test_media_kind_mapping() {
        assert_eq!(FileKind::Image.media_kind(), Some(MediaKind::Photo));
        assert_eq!(FileKind::Video.media_kind(), Some(MediaKind::Video));
        assert_eq!(FileKind::Audio.media_kind(), Some(MediaKind::Audio));
        assert_eq!(FileKind::Document.media_kind(), Some(MediaKind::Document));
        // Unknown content still reaches the subscriber, as a document.
        assert_eq!(FileKind::Unknown.media_kind(), Some(MediaKind::Document));
        assert_eq!(FileKind::Text.media_kind(), None);
    }

    #[test]
    fn test_protection_split() {
        assert!(FileKind::Image.is_protected_media());
        assert!(FileKind::Video.is_protected_media());
        assert!(FileKind::Audio.is_protected_media());
        assert!(!FileKind::Document.is_protected_media());
        assert!(!FileKind::Unknown.is_protected_media());
    }

    #[test]
    fn test_package_counts() {
        let mut package = ContentPackage::default();
        assert!(package.is_empty());
        assert_eq!(package.binary_count(), 0);

        package.text = Some("day one".to_string());
        package.media.push(MediaItem {
            local_path: PathBuf::from("a.jpg"),
            kind: MediaKind::Photo,
        });
        package.documents.push(MediaItem {
            local_path: PathBuf::from("b.pdf"),
            kind: MediaKind::Document,
        });

        assert!(!package.is_empty());
        assert_eq!(package.binary_count(), 2);
    }
}
