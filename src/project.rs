//! Project-scoped storage: one directory per project under the clip root,
//! plus the source registry that records which file a project was built from.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::{load_sidecar, save_sidecar};
use crate::error::AppError;

pub const SOURCE_FILE: &str = "source.json";
pub const CLIPS_DIR: &str = "clips";

static PROJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").expect("invalid project id regex")
});

pub fn validate_project_id(project_id: &str) -> Result<(), AppError> {
    if PROJECT_ID.is_match(project_id) {
        Ok(())
    } else {
        Err(AppError::invalid_input(format!(
            "Invalid project id: {:?}",
            project_id
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceRecord {
    source_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProjectStore {
    clips_root: PathBuf,
}

impl ProjectStore {
    pub fn new(clips_root: impl Into<PathBuf>) -> Self {
        Self {
            clips_root: clips_root.into(),
        }
    }

    /// Store rooted at `{data_dir}/clips`.
    pub fn under_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CLIPS_DIR))
    }

    pub fn clips_root(&self) -> &Path {
        &self.clips_root
    }

    pub fn project_dir(&self, project_id: &str) -> Result<PathBuf, AppError> {
        validate_project_id(project_id)?;
        Ok(self.clips_root.join(project_id))
    }

    pub fn ensure_project_dir(&self, project_id: &str) -> Result<PathBuf, AppError> {
        let dir = self.project_dir(project_id)?;
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Record `source` as the input for `project_id`. The path is stored
    /// absolute so later runs do not depend on the working directory.
    pub fn register_source(&self, project_id: &str, source: &Path) -> Result<PathBuf, AppError> {
        if !source.is_file() {
            return Err(AppError::SourceNotFound(source.to_path_buf()));
        }
        let source_path = fs::canonicalize(source)?;
        let dir = self.ensure_project_dir(project_id)?;
        save_sidecar(
            &dir,
            SOURCE_FILE,
            &SourceRecord {
                source_path: source_path.clone(),
            },
        )?;
        log::info!(
            target: "clipforge::project",
            "Registered source for {}: {}",
            project_id,
            source_path.display()
        );
        Ok(source_path)
    }

    /// Registered source path; `NotFound` when nothing was registered.
    pub fn source_path(&self, project_id: &str) -> Result<PathBuf, AppError> {
        let dir = self.project_dir(project_id)?;
        let record: SourceRecord = load_sidecar(&dir, SOURCE_FILE).map_err(|err| match err {
            AppError::NotFound(_) => {
                AppError::not_found(format!("No source registered for project {}", project_id))
            }
            other => other,
        })?;
        Ok(record.source_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_ids_are_validated() {
        for ok in ["abc", "a1-b2_c3", "7f3c2a10-1b2c-4d5e-8f90-a1b2c3d4e5f6"] {
            assert!(validate_project_id(ok).is_ok(), "{}", ok);
        }
        let too_long = "a".repeat(129);
        for bad in ["", "-lead", "../up", "a/b", "a b", too_long.as_str()] {
            assert!(validate_project_id(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn register_then_resolve_source() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("upload.mp4");
        fs::write(&video, b"v").unwrap();
        let store = ProjectStore::under_data_dir(dir.path());

        let registered = store.register_source("p1", &video).unwrap();
        assert_eq!(store.source_path("p1").unwrap(), registered);
        assert!(dir.path().join("clips/p1/source.json").is_file());
    }

    #[test]
    fn unregistered_project_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::under_data_dir(dir.path());
        let err = store.source_path("p1").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn registering_missing_file_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::under_data_dir(dir.path());
        let err = store
            .register_source("p1", &dir.path().join("missing.mp4"))
            .unwrap_err();
        assert!(matches!(err, AppError::SourceNotFound(_)));
        assert!(!dir.path().join("clips/p1").exists());
    }
}
