#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clipforge_core::config::PipelineOptions;
use clipforge_core::ffmpeg::FfmpegLocator;
use clipforge_core::pipeline::ClipPipeline;
use clipforge_core::project::ProjectStore;
use tempfile::TempDir;

pub const PROJECT: &str = "p1";

/// Stand-in ffmpeg/ffprobe pair. ffmpeg writes a few bytes to its last
/// argument (the output path) and logs that path; ffprobe reports a fixed
/// duration for every file.
pub struct FakeEngine {
    dir: TempDir,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    calls: PathBuf,
}

#[derive(Default)]
pub struct FakeEngineBuilder {
    fail_marker: Option<String>,
    hang_marker: Option<String>,
    probe_duration: Option<f64>,
}

impl FakeEngineBuilder {
    /// Outputs whose path contains `marker` get a partial file and exit 1.
    pub fn fail_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Outputs whose path contains `marker` get a partial file, then hang.
    pub fn hang_on(mut self, marker: &str) -> Self {
        self.hang_marker = Some(marker.to_string());
        self
    }

    pub fn probe_duration(mut self, seconds: f64) -> Self {
        self.probe_duration = Some(seconds);
        self
    }

    pub fn build(self) -> FakeEngine {
        let dir = tempfile::tempdir().expect("create engine dir");
        let calls = dir.path().join("calls.log");
        let mut ffmpeg_body = String::from(
            "if [ \"$1\" = \"-version\" ]; then echo 'ffmpeg version 0.0-fake'; exit 0; fi\n\
             for last; do :; done\n",
        );
        ffmpeg_body.push_str(&format!("echo \"$last\" >> '{}'\n", calls.display()));
        if let Some(marker) = &self.fail_marker {
            ffmpeg_body.push_str(&format!(
                "case \"$last\" in *'{}'*) printf partial > \"$last\"; \
                 echo 'Invalid data found when processing input' >&2; exit 1 ;; esac\n",
                marker
            ));
        }
        if let Some(marker) = &self.hang_marker {
            ffmpeg_body.push_str(&format!(
                "case \"$last\" in *'{}'*) printf partial > \"$last\"; exec sleep 30 ;; esac\n",
                marker
            ));
        }
        ffmpeg_body.push_str("printf encoded > \"$last\"\nexit 0\n");

        let duration = self.probe_duration.unwrap_or(60.0);
        let ffprobe_body = format!(
            "cat <<'JSON'\n{{\"format\":{{\"duration\":\"{:.3}\",\"format_name\":\"mov,mp4\"}},\
             \"streams\":[{{\"codec_type\":\"video\",\"codec_name\":\"h264\",\
             \"width\":1920,\"height\":1080,\"r_frame_rate\":\"30/1\"}}]}}\nJSON\n",
            duration
        );

        let ffmpeg = write_script(dir.path(), "ffmpeg", &ffmpeg_body);
        let ffprobe = write_script(dir.path(), "ffprobe", &ffprobe_body);
        FakeEngine {
            dir,
            ffmpeg,
            ffprobe,
            calls,
        }
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

impl FakeEngine {
    pub fn builder() -> FakeEngineBuilder {
        FakeEngineBuilder::default()
    }

    pub fn healthy() -> Self {
        Self::builder().build()
    }

    pub fn locator(&self) -> Arc<FfmpegLocator> {
        Arc::new(FfmpegLocator::with_candidates(vec![self.ffmpeg.clone()]))
    }

    /// Output paths ffmpeg was asked to write, in call order.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(&self.calls)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Data root with one uploaded source video.
pub struct Workspace {
    dir: TempDir,
    pub source: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create workspace");
        let source = dir.path().join("upload.mp4");
        fs::write(&source, b"source video").expect("write source");
        Self { dir, source }
    }

    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> ProjectStore {
        ProjectStore::under_data_dir(self.dir.path())
    }

    pub fn project_dir(&self) -> PathBuf {
        self.dir.path().join("clips").join(PROJECT)
    }

    pub fn pipeline(&self, locator: Arc<FfmpegLocator>) -> ClipPipeline {
        self.pipeline_with(locator, PipelineOptions::default())
    }

    pub fn pipeline_with(
        &self,
        locator: Arc<FfmpegLocator>,
        options: PipelineOptions,
    ) -> ClipPipeline {
        let options = PipelineOptions {
            workers: options.workers.or(Some(2)),
            ..options
        };
        ClipPipeline::new(self.store(), locator).with_options(options)
    }

    /// Sorted file names in the project directory; empty when it is absent.
    pub fn project_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.project_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
