//! Source media probing with fallback-first defaults.
//!
//! A missing file is the only fatal outcome. Unreadable metadata, an
//! unavailable ffprobe or a hung probe all fall back to a 60 second,
//! 1920x1080 source so the rest of the pipeline can still run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::ffmpeg::ffprobe::{ProbedStreams, probe_streams};
use crate::ffmpeg::{FfmpegLocator, ToolLimits, describe_error};

pub const DEFAULT_DURATION_SECS: f64 = 60.0;
pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMedia {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
}

impl SourceMedia {
    /// Apply the fallback policy field by field to whatever ffprobe returned.
    pub fn from_probe(path: impl Into<PathBuf>, probed: Option<&ProbedStreams>) -> Self {
        let path = path.into();
        let duration = probed.and_then(|p| p.duration);
        let dims = probed.and_then(|p| p.width.zip(p.height));
        if duration.is_none() {
            log::warn!(
                target: "clipforge::probe",
                "Duration unavailable for {}, assuming {}s",
                path.display(),
                DEFAULT_DURATION_SECS
            );
        }
        if dims.is_none() {
            log::warn!(
                target: "clipforge::probe",
                "Dimensions unavailable for {}, assuming {}x{}",
                path.display(),
                DEFAULT_WIDTH,
                DEFAULT_HEIGHT
            );
        }
        let (width, height) = dims.unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT));
        Self {
            path,
            duration_seconds: duration.unwrap_or(DEFAULT_DURATION_SECS),
            width,
            height,
        }
    }
}

#[derive(Clone)]
pub struct MediaProbe {
    locator: Arc<FfmpegLocator>,
    timeout: Duration,
}

impl MediaProbe {
    pub fn new(locator: Arc<FfmpegLocator>) -> Self {
        Self {
            locator,
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn probe(&self, source: &Path) -> Result<SourceMedia, AppError> {
        if !source.is_file() {
            return Err(AppError::SourceNotFound(source.to_path_buf()));
        }
        let probed = self
            .locator
            .ffprobe_path()
            .and_then(|ffprobe| {
                probe_streams(&ffprobe, source, &ToolLimits::with_timeout(self.timeout))
            })
            .map_err(|err| {
                log::warn!(
                    target: "clipforge::probe",
                    "Probe failed for {}: {}",
                    source.display(),
                    describe_error(&err).summary
                );
                err
            })
            .ok();
        let media = SourceMedia::from_probe(source, probed.as_ref());
        log::debug!(
            target: "clipforge::probe",
            "Probed {}: duration={:.3}s, {}x{}",
            media.path.display(),
            media.duration_seconds,
            media.width,
            media.height
        );
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_probe_is_used_verbatim() {
        let probed = ProbedStreams {
            duration: Some(42.5),
            width: Some(1280),
            height: Some(720),
            ..ProbedStreams::default()
        };
        let media = SourceMedia::from_probe("/v.mp4", Some(&probed));
        assert_eq!(media.duration_seconds, 42.5);
        assert_eq!((media.width, media.height), (1280, 720));
    }

    #[test]
    fn failed_probe_uses_defaults() {
        let media = SourceMedia::from_probe("/v.mp4", None);
        assert_eq!(media.duration_seconds, DEFAULT_DURATION_SECS);
        assert_eq!((media.width, media.height), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
    }

    #[test]
    fn partial_probe_falls_back_per_field() {
        let probed = ProbedStreams {
            duration: Some(9.0),
            width: Some(640),
            height: None,
            ..ProbedStreams::default()
        };
        let media = SourceMedia::from_probe("/v.mp4", Some(&probed));
        assert_eq!(media.duration_seconds, 9.0);
        assert_eq!((media.width, media.height), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
    }

    #[test]
    fn missing_source_is_fatal() {
        let probe = MediaProbe::new(Arc::new(FfmpegLocator::with_candidates(vec![])));
        let err = probe.probe(Path::new("/no/such/video.mp4")).unwrap_err();
        assert!(matches!(err, AppError::SourceNotFound(_)));
    }

    #[test]
    fn unavailable_engine_still_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        std::fs::write(&source, b"not really a video").unwrap();
        let probe = MediaProbe::new(Arc::new(FfmpegLocator::with_candidates(vec![])));
        let media = probe.probe(&source).unwrap();
        assert_eq!(media.duration_seconds, DEFAULT_DURATION_SECS);
        assert_eq!(media.width, DEFAULT_WIDTH);
    }
}
