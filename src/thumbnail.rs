//! Still-frame extraction from encoded clips.
//!
//! Extraction never fails a clip: a missing thumbnail is logged and the
//! clip is reported without one.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{StoredClip, thumbnail_url};
use crate::error::AppError;
use crate::ffmpeg::{
    CancelFlag, FfmpegLocator, ToolLimits, build_thumbnail_args, describe_error, path_to_string,
    run_ffmpeg_blocking,
};
use crate::plan::{AI_SAMPLE_FRAME, ClipId, Transform, plan_samples};
use crate::probe::MediaProbe;
use crate::transcode::{BatchControl, EncodedClip, PartialOutput, run_bounded};

pub const AI_THUMBNAIL_TYPE: &str = "ai_generated";

/// One candidate frame sampled from a stored clip.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiThumbnail {
    pub clip_id: String,
    pub thumbnail: String,
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Offset for the standard thumbnail: the configured offset, pulled back
/// to the middle of clips too short to reach it.
pub fn standard_offset(configured: f64, clip_length: f64) -> f64 {
    if clip_length > 0.0 && configured >= clip_length {
        clip_length / 2.0
    } else {
        configured
    }
}

#[derive(Clone)]
pub struct ThumbnailExtractor {
    locator: Arc<FfmpegLocator>,
    timeout: Duration,
}

impl ThumbnailExtractor {
    pub fn new(locator: Arc<FfmpegLocator>, timeout: Duration) -> Self {
        Self { locator, timeout }
    }

    fn try_extract(
        &self,
        clip_path: &Path,
        offset: f64,
        output: &Path,
        frame: Option<Transform>,
        cancel: Option<&CancelFlag>,
    ) -> Result<(), AppError> {
        let ffmpeg = self.locator.ffmpeg_path()?;
        let args = build_thumbnail_args(
            &path_to_string(clip_path),
            &path_to_string(output),
            offset,
            frame.map(|f| (f.width, f.height)),
        );
        let partial = PartialOutput::new(output);
        let limits = ToolLimits::with_timeout(self.timeout).cancellable(cancel.cloned());
        run_ffmpeg_blocking(ffmpeg, &args, &limits)?;
        if !output.is_file() {
            return Err(AppError::ffmpeg_failed(0, "Output file is empty"));
        }
        partial.keep();
        Ok(())
    }

    /// Grab the frame at `offset` seconds into `clip_path` as JPEG.
    /// `None` on any failure.
    pub fn extract(
        &self,
        clip_path: &Path,
        offset: f64,
        output: &Path,
        frame: Option<Transform>,
        cancel: Option<&CancelFlag>,
    ) -> Option<PathBuf> {
        match self.try_extract(clip_path, offset, output, frame, cancel) {
            Ok(()) => Some(output.to_path_buf()),
            Err(err) => {
                log::warn!(
                    target: "clipforge::thumbnail",
                    "Thumbnail at {:.3}s of {} failed: {}",
                    offset,
                    clip_path.display(),
                    describe_error(&err).summary
                );
                None
            }
        }
    }

    /// One standard thumbnail per clip, written next to it as `{id}.jpg`.
    pub async fn attach_thumbnails(
        &self,
        clips: Vec<EncodedClip>,
        offset: f64,
        control: &BatchControl,
    ) -> Result<Vec<EncodedClip>, AppError> {
        let extractor = self.clone();
        let job_cancel = control.cancel.clone();
        let clips = run_bounded(
            clips,
            control.workers,
            control.cancel.as_ref(),
            move |mut clip: EncodedClip| {
                let output = clip.output_path.with_file_name(clip.id.thumbnail_file_name());
                let at = standard_offset(offset, clip.length);
                clip.thumbnail_path =
                    extractor.extract(&clip.output_path, at, &output, None, job_cancel.as_ref());
                clip
            },
        )
        .await?;
        let generated = clips.iter().filter(|c| c.thumbnail_path.is_some()).count();
        log::info!(
            target: "clipforge::thumbnail",
            "Generated {} of {} thumbnails",
            generated,
            clips.len()
        );
        Ok(clips)
    }

    /// Sample candidate frames from one stored clip at each AI offset that
    /// falls inside it.
    pub fn sample_clip(
        &self,
        probe: &MediaProbe,
        id: &ClipId,
        clip_path: &Path,
        cancel: Option<&CancelFlag>,
    ) -> Vec<AiThumbnail> {
        let duration = match probe.probe(clip_path) {
            Ok(media) => media.duration_seconds,
            Err(err) => {
                log::warn!(
                    target: "clipforge::thumbnail",
                    "Skipping {}: {}",
                    id,
                    describe_error(&err).summary
                );
                return Vec::new();
            }
        };
        plan_samples(duration)
            .into_iter()
            .filter_map(|(sample_index, offset)| {
                let name = id.ai_sample_file_name(sample_index);
                let output = clip_path.with_file_name(&name);
                self.extract(clip_path, offset, &output, Some(AI_SAMPLE_FRAME), cancel)?;
                Some(AiThumbnail {
                    clip_id: id.to_string(),
                    thumbnail: thumbnail_url(&id.project_id, &name),
                    timestamp: offset,
                    kind: AI_THUMBNAIL_TYPE,
                })
            })
            .collect()
    }

    /// AI samples for every stored clip, flattened in clip order.
    pub async fn sample_all(
        &self,
        probe: &MediaProbe,
        clips: Vec<StoredClip>,
        control: &BatchControl,
    ) -> Result<Vec<AiThumbnail>, AppError> {
        self.locator.ffmpeg_path()?;
        let extractor = self.clone();
        let probe = probe.clone();
        let job_cancel = control.cancel.clone();
        let per_clip = run_bounded(
            clips,
            control.workers,
            control.cancel.as_ref(),
            move |stored: StoredClip| {
                extractor.sample_clip(&probe, &stored.id, &stored.path, job_cancel.as_ref())
            },
        )
        .await?;
        let samples: Vec<AiThumbnail> = per_clip.into_iter().flatten().collect();
        log::info!(
            target: "clipforge::thumbnail",
            "Generated {} AI thumbnail candidates",
            samples.len()
        );
        Ok(samples)
    }
}
