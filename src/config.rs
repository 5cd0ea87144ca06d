//! Pipeline tuning. Every field is optional; `effective_*` applies defaults
//! and bounds so callers never see out-of-range values.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DATA_DIR_ENV: &str = "CLIPFORGE_DATA_DIR";
pub const WORKERS_ENV: &str = "CLIPFORGE_WORKERS";
pub const TRANSCODE_TIMEOUT_ENV: &str = "CLIPFORGE_TRANSCODE_TIMEOUT_SECS";
pub const THUMBNAIL_TIMEOUT_ENV: &str = "CLIPFORGE_THUMBNAIL_TIMEOUT_SECS";
pub const BASE_SCORE_ENV: &str = "CLIPFORGE_BASE_SCORE";

const DEFAULT_MAX_WORKERS: usize = 4;
const MAX_WORKERS: usize = 16;
const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_THUMBNAIL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BASE_SCORE: i32 = 90;
const DEFAULT_THUMBNAIL_OFFSET_SECS: f64 = 1.0;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Concurrent engine invocations per batch.
    pub workers: Option<usize>,
    pub transcode_timeout_secs: Option<u64>,
    pub thumbnail_timeout_secs: Option<u64>,
    /// Score of clip index 0; each later index scores one less.
    pub base_score: Option<i32>,
    pub thumbnail_offset_secs: Option<f64>,
}

impl PipelineOptions {
    pub fn effective_workers(&self) -> usize {
        let default = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(DEFAULT_MAX_WORKERS);
        self.workers.unwrap_or(default).clamp(1, MAX_WORKERS)
    }

    pub fn effective_transcode_timeout(&self) -> Duration {
        Duration::from_secs(
            self.transcode_timeout_secs
                .unwrap_or(DEFAULT_TRANSCODE_TIMEOUT_SECS)
                .max(1),
        )
    }

    pub fn effective_thumbnail_timeout(&self) -> Duration {
        Duration::from_secs(
            self.thumbnail_timeout_secs
                .unwrap_or(DEFAULT_THUMBNAIL_TIMEOUT_SECS)
                .max(1),
        )
    }

    pub fn effective_base_score(&self) -> i32 {
        self.base_score.unwrap_or(DEFAULT_BASE_SCORE)
    }

    pub fn effective_thumbnail_offset(&self) -> f64 {
        self.thumbnail_offset_secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .unwrap_or(DEFAULT_THUMBNAIL_OFFSET_SECS)
    }

    /// Options from `CLIPFORGE_*` variables. Unparsable values are skipped.
    pub fn from_env() -> Self {
        Self {
            workers: env_parse(WORKERS_ENV),
            transcode_timeout_secs: env_parse(TRANSCODE_TIMEOUT_ENV),
            thumbnail_timeout_secs: env_parse(THUMBNAIL_TIMEOUT_ENV),
            base_score: env_parse(BASE_SCORE_ENV),
            thumbnail_offset_secs: None,
        }
    }

    /// Fields set in `overrides` win over `self`.
    pub fn merged_with(&self, overrides: &PipelineOptions) -> PipelineOptions {
        PipelineOptions {
            workers: overrides.workers.or(self.workers),
            transcode_timeout_secs: overrides
                .transcode_timeout_secs
                .or(self.transcode_timeout_secs),
            thumbnail_timeout_secs: overrides
                .thumbnail_timeout_secs
                .or(self.thumbnail_timeout_secs),
            base_score: overrides.base_score.or(self.base_score),
            thumbnail_offset_secs: overrides
                .thumbnail_offset_secs
                .or(self.thumbnail_offset_secs),
        }
    }
}

/// Root holding `clips/`; `CLIPFORGE_DATA_DIR` or `./data`.
pub fn data_dir_from_env() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!(
                target: "clipforge::config",
                "Ignoring {}={:?}: not a valid value",
                name,
                raw
            );
            None
        }
    }
}
