//! Extension filter for supported media files.

use std::path::Path;

/// Audio extensions used for MIME guessing.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a"];

/// Decides whether a path names a supported audio/video file.
#[derive(Debug, Clone)]
pub struct MediaFilter {
    extensions: Vec<String>,
}

impl MediaFilter {
    /// Build a filter over the configured extension allow-list
    /// (lowercase, without leading dots).
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Whether the path carries a supported extension (case-insensitive).
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Guess a MIME type from the extension: `audio/<ext>` for audio
    /// extensions, `video/<ext>` for the rest of the allow-list, and
    /// `application/octet-stream` for anything else.
    pub fn guess_mime_type(&self, path: &Path) -> String {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => return "application/octet-stream".to_string(),
        };

        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            format!("audio/{}", ext)
        } else if self.extensions.contains(&ext) {
            format!("video/{}", ext)
        } else {
            "application/octet-stream".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    fn filter() -> MediaFilter {
        MediaFilter::new(&Config::default_extensions())
    }

    #[test]
    fn test_matches_supported_extensions() {
        let filter = filter();
        assert!(filter.matches(&PathBuf::from("/media/episode1.mp3")));
        assert!(filter.matches(&PathBuf::from("/media/Clip.MKV")));
        assert!(filter.matches(&PathBuf::from("/media/talk.M4A")));
        assert!(!filter.matches(&PathBuf::from("/media/notes.txt")));
        assert!(!filter.matches(&PathBuf::from("/media/no_extension")));
    }

    #[test]
    fn test_mime_guess() {
        let filter = filter();
        assert_eq!(
            filter.guess_mime_type(&PathBuf::from("a.mp3")),
            "audio/mp3"
        );
        assert_eq!(
            filter.guess_mime_type(&PathBuf::from("a.MOV")),
            "video/mov"
        );
        assert_eq!(
            filter.guess_mime_type(&PathBuf::from("a.txt")),
            "application/octet-stream"
        );
    }
}
