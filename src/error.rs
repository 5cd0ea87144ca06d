//! Crate error type. Only `SourceNotFound` and `ExecutorUnavailable` abort a
//! pipeline run; every other variant is absorbed per clip by the batch code.

use std::path::PathBuf;

use crate::ffmpeg::parse_ffmpeg_error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("Source video not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("{0}")]
    ExecutorUnavailable(String),

    #[error("FFmpeg failed (code {code}): {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    #[error("FFmpeg timed out after {secs}s")]
    TimedOut { secs: u64 },

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Aborted")]
    Aborted,
}

impl AppError {
    pub fn aborted() -> Self {
        Self::Aborted
    }

    pub fn ffmpeg_failed(code: i32, stderr: impl Into<String>) -> Self {
        Self::FfmpegFailed {
            code,
            stderr: stderr.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// True for the conditions that must abort the whole request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceNotFound(_) | Self::ExecutorUnavailable(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AppError::FfmpegFailed { code, stderr } => {
                let payload = parse_ffmpeg_error(stderr, Some(*code));
                let json =
                    serde_json::json!({ "summary": payload.summary, "detail": payload.detail });
                serializer.serialize_str(&json.to_string())
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        if s == "Aborted" {
            AppError::Aborted
        } else {
            AppError::FfmpegFailed {
                code: -1,
                stderr: s,
            }
        }
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_aborted_string() {
        let e = AppError::from("Aborted");
        assert!(matches!(e, AppError::Aborted));
    }

    #[test]
    fn from_other_string() {
        let e = AppError::from("some error message");
        match &e {
            AppError::FfmpegFailed { code, stderr } => {
                assert_eq!(*code, -1);
                assert_eq!(stderr, "some error message");
            }
            _ => panic!("expected FfmpegFailed"),
        }
    }

    #[test]
    fn only_source_and_executor_errors_are_fatal() {
        assert!(AppError::SourceNotFound(PathBuf::from("/nope.mp4")).is_fatal());
        assert!(AppError::ExecutorUnavailable("missing".into()).is_fatal());
        assert!(!AppError::ffmpeg_failed(1, "boom").is_fatal());
        assert!(!AppError::TimedOut { secs: 5 }.is_fatal());
        assert!(!AppError::Aborted.is_fatal());
    }

    #[test]
    fn ffmpeg_failure_serializes_summary_and_detail() {
        let e = AppError::ffmpeg_failed(1, "Invalid data found");
        let json = serde_json::to_string(&e).unwrap();
        let inner: String = serde_json::from_str(&json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&inner).unwrap();
        assert_eq!(value["summary"], "FFmpeg failed.");
        assert_eq!(value["detail"], "Invalid data found");
    }

    #[test]
    fn source_not_found_mentions_path() {
        let e = AppError::SourceNotFound(PathBuf::from("/videos/missing.mp4"));
        assert!(e.to_string().contains("/videos/missing.mp4"));
    }
}
