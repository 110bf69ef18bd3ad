//! Media type detection from URLs

use serde::{Deserialize, Serialize};
use std::fmt;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "heic", "heif", "svg", "tif", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv", "m4v", "3gp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac", "flac", "opus"];

/// Category of an inspection attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaType {
    /// Classify a media URL by its file extension; unknown extensions are documents
    pub fn from_url(media_url: &str) -> Self {
        let extension = match extension_of(media_url) {
            Some(ext) => ext,
            None => return MediaType::Document,
        };

        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            MediaType::Image
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            MediaType::Video
        } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            MediaType::Audio
        } else {
            MediaType::Document
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Document => "document",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of the path component, ignoring query and fragment
fn extension_of(media_url: &str) -> Option<String> {
    let path = match url::Url::parse(media_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => media_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let file_name = path.rsplit('/').next()?;
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_types_by_extension() {
        assert_eq!(MediaType::from_url("https://cdn.example.com/inspections/photo.JPG"), MediaType::Image);
        assert_eq!(MediaType::from_url("https://cdn.example.com/walkthrough.mp4"), MediaType::Video);
        assert_eq!(MediaType::from_url("https://cdn.example.com/note.m4a"), MediaType::Audio);
        assert_eq!(MediaType::from_url("https://cdn.example.com/report.pdf"), MediaType::Document);
    }

    #[test]
    fn test_ignores_query_string_and_fragment() {
        assert_eq!(
            MediaType::from_url("https://x.supabase.co/storage/v1/object/sign/media/a.png?token=abc.def"),
            MediaType::Image
        );
        assert_eq!(MediaType::from_url("media/clip.webm#t=10"), MediaType::Video);
    }

    #[test]
    fn test_no_extension_is_document() {
        assert_eq!(MediaType::from_url("https://cdn.example.com/blob/1234"), MediaType::Document);
        assert_eq!(MediaType::from_url("https://cdn.example.com/.hidden"), MediaType::Document);
    }
}
