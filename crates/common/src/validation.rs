//! Upload validation.
//!
//! Checks applied to every incoming video before any temp file is written:
//! extension allowlist, `video/` content type, and a hard byte cap. Failures
//! map to 4xx responses at the HTTP layer.

use std::path::Path;
use thiserror::Error;

/// Video container extensions accepted for analysis (lowercase, no dot)
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "avi", "mov", "mkv", "m4v"];

/// Hard cap on uploaded video size (500 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Why an upload was rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("missing filename")]
    MissingFilename,

    #[error("unsupported file extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("unsupported content type: {0:?}")]
    UnsupportedContentType(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

impl UploadError {
    /// Short label used for rejection metrics
    pub fn reason(&self) -> &'static str {
        match self {
            UploadError::MissingFilename => "missing_filename",
            UploadError::UnsupportedExtension(_) => "extension",
            UploadError::UnsupportedContentType(_) => "content_type",
            UploadError::TooLarge { .. } => "too_large",
        }
    }
}

/// Lowercased extension of an uploaded filename, if it has one
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Validate an uploaded video against extension, content type and size rules
pub fn validate_upload(
    filename: Option<&str>,
    content_type: Option<&str>,
    size_bytes: u64,
) -> Result<(), UploadError> {
    let filename = match filename {
        Some(name) if !name.is_empty() => name,
        _ => return Err(UploadError::MissingFilename),
    };

    match file_extension(filename) {
        Some(ext) if ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()) => {}
        other => {
            return Err(UploadError::UnsupportedExtension(
                other.unwrap_or_default(),
            ))
        }
    }

    match content_type {
        Some(ct) if ct.starts_with("video/") => {}
        other => {
            return Err(UploadError::UnsupportedContentType(
                other.unwrap_or_default().to_string(),
            ))
        }
    }

    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size: size_bytes,
            limit: MAX_UPLOAD_BYTES,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_containers() {
        for name in ["lecture.mp4", "talk.WEBM", "recording.MoV", "class.m4v"] {
            assert_eq!(validate_upload(Some(name), Some("video/mp4"), 1024), Ok(()));
        }
    }

    #[test]
    fn test_rejects_missing_filename() {
        assert_eq!(
            validate_upload(None, Some("video/mp4"), 1024),
            Err(UploadError::MissingFilename)
        );
        assert_eq!(
            validate_upload(Some(""), Some("video/mp4"), 1024),
            Err(UploadError::MissingFilename)
        );
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let result = validate_upload(Some("notes.pdf"), Some("video/mp4"), 1024);
        assert_eq!(
            result,
            Err(UploadError::UnsupportedExtension("pdf".to_string()))
        );

        let result = validate_upload(Some("noext"), Some("video/mp4"), 1024);
        assert_eq!(
            result,
            Err(UploadError::UnsupportedExtension(String::new()))
        );
    }

    #[test]
    fn test_rejects_non_video_content_type() {
        let result = validate_upload(Some("a.mp4"), Some("application/pdf"), 1024);
        assert_eq!(
            result,
            Err(UploadError::UnsupportedContentType(
                "application/pdf".to_string()
            ))
        );

        let result = validate_upload(Some("a.mp4"), None, 1024);
        assert_eq!(
            result,
            Err(UploadError::UnsupportedContentType(String::new()))
        );
    }

    #[test]
    fn test_rejects_oversized_upload() {
        let result = validate_upload(Some("a.mp4"), Some("video/mp4"), MAX_UPLOAD_BYTES + 1);
        assert_eq!(
            result,
            Err(UploadError::TooLarge {
                size: MAX_UPLOAD_BYTES + 1,
                limit: MAX_UPLOAD_BYTES,
            })
        );

        // Exactly at the limit is allowed
        assert_eq!(
            validate_upload(Some("a.mp4"), Some("video/mp4"), MAX_UPLOAD_BYTES),
            Ok(())
        );
    }

    #[test]
    fn test_rejection_reasons_are_stable() {
        assert_eq!(UploadError::MissingFilename.reason(), "missing_filename");
        assert_eq!(
            UploadError::TooLarge { size: 1, limit: 0 }.reason(),
            "too_large"
        );
    }
}
