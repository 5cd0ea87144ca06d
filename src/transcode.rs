//! Clip encoding through the external engine.
//!
//! One engine call per planned clip. A failing call only drops its own clip;
//! the batch keeps going. Only an unavailable engine stops a batch, and that
//! is checked before any clip is started.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::AppError;
use crate::ffmpeg::{
    CancelFlag, FfmpegLocator, ToolLimits, build_clip_args, describe_error,
    format_args_for_display_multiline, path_to_string, run_ffmpeg_blocking,
};
use crate::plan::{ClipId, ClipKind, PlannedClip};
use crate::probe::SourceMedia;

/// A clip whose engine call finished and left a file behind.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedClip {
    pub id: ClipId,
    pub title: &'static str,
    pub output_path: PathBuf,
    pub length: f64,
    pub aspect: &'static str,
    pub platform: &'static str,
    pub thumbnail_path: Option<PathBuf>,
}

impl EncodedClip {
    fn from_planned(id: ClipId, planned: &PlannedClip, output_path: PathBuf) -> Self {
        Self {
            id,
            title: planned.title,
            output_path,
            length: planned.length,
            aspect: planned.aspect,
            platform: planned.platform,
            thumbnail_path: None,
        }
    }
}

/// Removes an output file on drop unless `keep` was called; an engine
/// that dies mid-write must not leave a truncated file behind.
pub(crate) struct PartialOutput {
    path: PathBuf,
    keep: bool,
}

impl PartialOutput {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            keep: false,
        }
    }

    pub(crate) fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if fs::remove_file(&self.path).is_ok() {
            log::debug!(
                target: "clipforge::transcode",
                "Removed incomplete output {}",
                self.path.display()
            );
        }
    }
}

/// Concurrency and cancellation shared by the clip and thumbnail batches.
#[derive(Debug, Clone)]
pub struct BatchControl {
    pub workers: usize,
    pub cancel: Option<CancelFlag>,
}

impl BatchControl {
    pub fn new(workers: usize, cancel: Option<CancelFlag>) -> Self {
        Self { workers, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// Runs `job` over `items` on the blocking pool with at most `workers`
/// running at once. Results come back in input order. Once `cancel` is set
/// no further items are started and the whole run reports `Aborted`.
pub(crate) async fn run_bounded<T, R, F>(
    items: Vec<T>,
    workers: usize,
    cancel: Option<&CancelFlag>,
    job: F,
) -> Result<Vec<R>, AppError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let is_cancelled = || cancel.is_some_and(CancelFlag::is_cancelled);
    let job = Arc::new(job);
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| AppError::from(e.to_string()))?;
        if is_cancelled() {
            break;
        }
        let job = Arc::clone(&job);
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job(item)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.map_err(|e| AppError::from(e.to_string()))?);
    }
    if is_cancelled() {
        return Err(AppError::aborted());
    }
    Ok(results)
}

#[derive(Clone)]
pub struct TranscodeExecutor {
    locator: Arc<FfmpegLocator>,
    timeout: Duration,
}

impl TranscodeExecutor {
    pub fn new(locator: Arc<FfmpegLocator>, timeout: Duration) -> Self {
        Self { locator, timeout }
    }

    /// Resolves the engine; `ExecutorUnavailable` when there is none.
    pub fn ensure_available(&self) -> Result<&Path, AppError> {
        self.locator.ffmpeg_path()
    }

    /// Encode one planned window of `source` into `output`.
    pub fn transcode(
        &self,
        source: &SourceMedia,
        clip: &PlannedClip,
        output: &Path,
        cancel: Option<&CancelFlag>,
    ) -> Result<(), AppError> {
        let ffmpeg = self.locator.ffmpeg_path()?;
        let args = build_clip_args(
            &path_to_string(&source.path),
            &path_to_string(output),
            clip.start,
            clip.length,
            &clip.transform.video_filter(),
        );
        log::trace!(
            target: "clipforge::transcode",
            "ffmpeg\n{}",
            format_args_for_display_multiline(&args)
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

    /// Encode every planned clip into `out_dir`. Failed clips are logged and
    /// left out; survivors keep their planned order.
    pub async fn transcode_batch(
        &self,
        source: &SourceMedia,
        project_id: &str,
        kind: ClipKind,
        planned: Vec<PlannedClip>,
        out_dir: &Path,
        control: &BatchControl,
    ) -> Result<Vec<EncodedClip>, AppError> {
        self.ensure_available()?;
        let requested = planned.len();
        let jobs: Vec<(ClipId, PlannedClip, PathBuf)> = planned
            .into_iter()
            .map(|clip| {
                let id = ClipId::new(project_id, kind, clip.index);
                let output = out_dir.join(id.video_file_name());
                (id, clip, output)
            })
            .collect();

        let executor = self.clone();
        let source_for_jobs = source.clone();
        let job_cancel = control.cancel.clone();
        let results = run_bounded(
            jobs,
            control.workers,
            control.cancel.as_ref(),
            move |(id, clip, output)| {
                let result =
                    executor.transcode(&source_for_jobs, &clip, &output, job_cancel.as_ref());
                (id, clip, output, result)
            },
        )
        .await?;

        let mut encoded = Vec::with_capacity(results.len());
        for (id, clip, output, result) in results {
            match result {
                Ok(()) => {
                    log::debug!(
                        target: "clipforge::transcode",
                        "Encoded {} ({:.3}s from {:.3}s)",
                        id,
                        clip.length,
                        clip.start
                    );
                    encoded.push(EncodedClip::from_planned(id, &clip, output));
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    let payload = describe_error(&err);
                    log::warn!(
                        target: "clipforge::transcode",
                        "Dropping {}: {}",
                        id,
                        payload.summary
                    );
                    log::debug!(
                        target: "clipforge::transcode",
                        "{} failure detail: {}",
                        id,
                        payload.detail
                    );
                }
            }
        }
        log::info!(
            target: "clipforge::transcode",
            "Encoded {} of {} {} clips for {}",
            encoded.len(),
            requested,
            kind.prefix(),
            project_id
        );
        Ok(encoded)
    }
}
