//! Locates a working FFmpeg binary once and hands it to every engine caller.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use super::runner::{ToolLimits, run_tool};
use crate::error::AppError;

/// Env override checked before any other location.
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const INSTALL_HINT: &str = "FFmpeg not found. Please install FFmpeg on your system:\n  - macOS: brew install ffmpeg\n  - Linux: sudo apt install ffmpeg\n  - Windows: winget install Gyan.FFmpeg or download from https://ffmpeg.org/download.html";

#[cfg(target_os = "windows")]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const FFMPEG_BINARY: &str = "ffmpeg";

fn common_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/opt/local/bin/ffmpeg"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        let mut paths = vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files (x86)\\ffmpeg\\bin\\ffmpeg.exe"),
        ];
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            paths.extend(winget_paths(&PathBuf::from(local)));
        }
        paths
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/snap/bin/ffmpeg"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

/// WinGet unpacks Gyan builds into a versioned folder, so scan for it.
#[cfg(target_os = "windows")]
fn winget_paths(local_app_data: &Path) -> Vec<PathBuf> {
    let packages = local_app_data.join("Microsoft").join("WinGet").join("Packages");
    let Ok(entries) = std::fs::read_dir(&packages) else {
        return vec![];
    };
    let mut found = Vec::new();
    for pkg in entries.flatten() {
        if !pkg.file_name().to_string_lossy().starts_with("Gyan.FFmpeg") {
            continue;
        }
        let Ok(builds) = std::fs::read_dir(pkg.path()) else {
            continue;
        };
        for build in builds.flatten() {
            let candidate = build.path().join("bin").join(FFMPEG_BINARY);
            if candidate.exists() {
                found.push(candidate);
            }
        }
    }
    found
}

fn find_in_path() -> Vec<PathBuf> {
    let Some(path_var) = std::env::var_os("PATH") else {
        return vec![];
    };
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(FFMPEG_BINARY))
        .filter(|p| p.is_file())
        .collect()
}

/// Where to look, in priority order.
#[derive(Debug, Clone)]
enum SearchPlan {
    /// FFMPEG_PATH, well-known install locations, then PATH.
    System,
    /// Exactly these candidates; used for bundled or test binaries.
    Explicit(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
struct ResolvedEngine {
    path: PathBuf,
    version: String,
}

/// Resolves the engine path behind a single initialize-once guard. A failed
/// resolution is cached too, so a missing engine is reported without
/// re-probing the filesystem on every clip.
#[derive(Debug)]
pub struct FfmpegLocator {
    plan: SearchPlan,
    resolved: OnceLock<Result<ResolvedEngine, String>>,
}

impl Default for FfmpegLocator {
    fn default() -> Self {
        Self::system()
    }
}

impl FfmpegLocator {
    pub fn system() -> Self {
        Self {
            plan: SearchPlan::System,
            resolved: OnceLock::new(),
        }
    }

    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self {
            plan: SearchPlan::Explicit(candidates),
            resolved: OnceLock::new(),
        }
    }

    fn candidates(&self) -> Vec<PathBuf> {
        match &self.plan {
            SearchPlan::Explicit(paths) => paths.clone(),
            SearchPlan::System => {
                let mut paths = Vec::new();
                if let Some(env_path) = std::env::var_os(FFMPEG_PATH_ENV) {
                    paths.push(PathBuf::from(env_path));
                }
                paths.extend(common_paths());
                paths.extend(find_in_path());
                paths
            }
        }
    }

    fn resolve(&self) -> Result<ResolvedEngine, String> {
        for candidate in self.candidates() {
            if !candidate.exists() {
                continue;
            }
            match probe_version(&candidate) {
                Some(version) => {
                    log::info!(
                        target: "clipforge::ffmpeg::discovery",
                        "FFmpeg resolved: path={}, version={}",
                        candidate.display(),
                        version
                    );
                    return Ok(ResolvedEngine {
                        path: candidate,
                        version,
                    });
                }
                None => {
                    log::debug!(
                        target: "clipforge::ffmpeg::discovery",
                        "FFmpeg candidate rejected (no working -version): {}",
                        candidate.display()
                    );
                }
            }
        }
        log::error!(
            target: "clipforge::ffmpeg::discovery",
            "FFmpeg not found in PATH or common locations"
        );
        Err(INSTALL_HINT.to_string())
    }

    fn engine(&self) -> Result<&ResolvedEngine, AppError> {
        self.resolved
            .get_or_init(|| self.resolve())
            .as_ref()
            .map_err(|hint| AppError::ExecutorUnavailable(hint.clone()))
    }

    /// Path of the working FFmpeg binary, or `ExecutorUnavailable`.
    pub fn ffmpeg_path(&self) -> Result<&Path, AppError> {
        self.engine().map(|e| e.path.as_path())
    }

    /// First line of `ffmpeg -version` for the resolved engine.
    pub fn version(&self) -> Result<&str, AppError> {
        self.engine().map(|e| e.version.as_str())
    }

    /// ffprobe ships next to ffmpeg; look there first, suffix-matched.
    pub fn ffprobe_path(&self) -> Result<PathBuf, AppError> {
        let ffmpeg = self.ffmpeg_path()?;
        ffprobe_candidates(ffmpeg)
            .into_iter()
            .find(|c| c.exists())
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "ffprobe not found next to {}",
                    ffmpeg.display()
                ))
            })
    }
}

fn probe_version(candidate: &Path) -> Option<String> {
    let args = vec!["-version".to_string()];
    let output = run_tool(candidate, &args, &ToolLimits::with_timeout(VERSION_CHECK_TIMEOUT)).ok()?;
    let first = output.stdout.lines().next().unwrap_or("").trim().to_string();
    Some(if first.is_empty() {
        "unknown".to_string()
    } else {
        first
    })
}

/// ffprobe locations for a given ffmpeg binary: suffixed twin first, then plain.
pub fn ffprobe_candidates(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let Some(parent) = ffmpeg_path.parent() else {
        return vec![];
    };
    let mut candidates = Vec::with_capacity(2);
    let stem = ffmpeg_path.file_stem().and_then(|s| s.to_str());
    if let Some(suffix) = stem.and_then(|s| s.strip_prefix("ffmpeg"))
        && !suffix.is_empty()
    {
        #[cfg(target_os = "windows")]
        candidates.push(parent.join(format!("ffprobe{suffix}.exe")));
        #[cfg(not(target_os = "windows"))]
        candidates.push(parent.join(format!("ffprobe{suffix}")));
    }
    #[cfg(target_os = "windows")]
    candidates.push(parent.join("ffprobe.exe"));
    #[cfg(not(target_os = "windows"))]
    candidates.push(parent.join("ffprobe"));
    candidates
}
