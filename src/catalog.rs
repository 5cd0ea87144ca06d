//! Catalog records for encoded clips, discovery of stored clips, and JSON
//! sidecar documents kept next to them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::plan::{ClipId, ClipKind};
use crate::transcode::EncodedClip;

pub const CLIP_FORMAT: &str = "mp4";
const UNKNOWN_LABEL: &str = "unknown";

pub fn download_url(project_id: &str, file_name: &str) -> String {
    format!("/api/clips/{}/{}", project_id, file_name)
}

pub fn thumbnail_url(project_id: &str, file_name: &str) -> String {
    format!("/api/thumbnails/{}/{}", project_id, file_name)
}

/// `m:ss`, whole seconds truncated.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        // Absorb float noise such as 9.9999999 from clamping arithmetic.
        (seconds + 1e-6).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Placeholder relevance: `base - index`, saturating.
pub fn score_for(base_score: i32, index: usize) -> i32 {
    base_score.saturating_sub(i32::try_from(index).unwrap_or(i32::MAX))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipCatalogEntry {
    pub id: String,
    pub index: usize,
    pub kind: ClipKind,
    pub title: String,
    /// Unknown for clips found on disk without planning state.
    pub duration: Option<String>,
    pub score: i32,
    pub path: String,
    pub format: &'static str,
    pub aspect: String,
    pub platform: String,
    pub download_url: String,
    /// Always set, even when extraction failed; see `thumbnail_generated`.
    pub thumbnail: String,
    pub thumbnail_generated: bool,
}

struct EntryParts<'a> {
    id: &'a ClipId,
    title: String,
    duration: Option<String>,
    aspect: String,
    platform: String,
    thumbnail_generated: bool,
}

fn entry(parts: EntryParts<'_>, base_score: i32) -> ClipCatalogEntry {
    let file_name = parts.id.video_file_name();
    ClipCatalogEntry {
        id: parts.id.to_string(),
        index: parts.id.index,
        kind: parts.id.kind,
        title: parts.title,
        duration: parts.duration,
        score: score_for(base_score, parts.id.index),
        download_url: download_url(&parts.id.project_id, &file_name),
        thumbnail: thumbnail_url(&parts.id.project_id, &parts.id.thumbnail_file_name()),
        path: file_name,
        format: CLIP_FORMAT,
        aspect: parts.aspect,
        platform: parts.platform,
        thumbnail_generated: parts.thumbnail_generated,
    }
}

/// Catalog entries for freshly encoded clips, in the order given.
pub fn assemble(clips: &[EncodedClip], base_score: i32) -> Vec<ClipCatalogEntry> {
    clips
        .iter()
        .map(|clip| {
            entry(
                EntryParts {
                    id: &clip.id,
                    title: clip.title.to_string(),
                    duration: Some(format_duration(clip.length)),
                    aspect: clip.aspect.to_string(),
                    platform: clip.platform.to_string(),
                    thumbnail_generated: clip.thumbnail_path.is_some(),
                },
                base_score,
            )
        })
        .collect()
}

/// A clip file found in a project directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredClip {
    pub id: ClipId,
    pub path: PathBuf,
    pub thumbnail_exists: bool,
}

/// Clip files in `project_dir` named `{project_id}-{clip|mobile}-{n}.mp4`,
/// ordered by kind then index. Anything else is ignored.
pub fn scan(project_dir: &Path, project_id: &str) -> Result<Vec<StoredClip>, AppError> {
    if !project_dir.is_dir() {
        return Err(AppError::not_found(format!(
            "No clips found for project {}",
            project_id
        )));
    }
    let mut clips = Vec::new();
    for dir_entry in fs::read_dir(project_dir)? {
        let path = dir_entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(CLIP_FORMAT) || !path.is_file() {
            continue;
        }
        let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|stem| ClipId::parse(project_id, stem))
        else {
            continue;
        };
        let thumbnail_exists = project_dir.join(id.thumbnail_file_name()).is_file();
        clips.push(StoredClip {
            id,
            path,
            thumbnail_exists,
        });
    }
    clips.sort_by_key(|c| (c.id.kind, c.id.index));
    log::debug!(
        target: "clipforge::catalog",
        "Found {} stored clips for {}",
        clips.len(),
        project_id
    );
    Ok(clips)
}

/// Catalog rebuilt from storage alone. Labels come from the template table
/// for the clip's kind and index.
pub fn discover(
    project_dir: &Path,
    project_id: &str,
    base_score: i32,
) -> Result<Vec<ClipCatalogEntry>, AppError> {
    let entries = scan(project_dir, project_id)?
        .iter()
        .map(|stored| {
            let template = stored.id.kind.template(stored.id.index);
            entry(
                EntryParts {
                    id: &stored.id,
                    title: template
                        .map(|t| t.title.to_string())
                        .unwrap_or_else(|| stored.id.index.to_string()),
                    duration: None,
                    aspect: template.map_or(UNKNOWN_LABEL, |t| t.aspect).to_string(),
                    platform: template.map_or(UNKNOWN_LABEL, |t| t.platform).to_string(),
                    thumbnail_generated: stored.thumbnail_exists,
                },
                base_score,
            )
        })
        .collect();
    Ok(entries)
}

/// Overwrite `dir/name` with pretty JSON. Written to a temp file and
/// renamed so readers never see a half-written document.
pub fn save_sidecar<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<PathBuf, AppError> {
    fs::create_dir_all(dir)?;
    let target = dir.join(name);
    let tmp = dir.join(format!(".{}.tmp", name));
    let json = serde_json::to_vec_pretty(value)?;
    if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &target)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    log::debug!(
        target: "clipforge::catalog",
        "Wrote sidecar {}",
        target.display()
    );
    Ok(target)
}

/// Read `dir/name`; `NotFound` when it was never written.
pub fn load_sidecar<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, AppError> {
    let path = dir.join(name);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::not_found(format!("{} not found", name)));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(project: &str, kind: ClipKind, index: usize, length: f64) -> EncodedClip {
        let id = ClipId::new(project, kind, index);
        let template = kind.template(index).unwrap();
        EncodedClip {
            output_path: PathBuf::from(id.video_file_name()),
            id,
            title: template.title,
            length,
            aspect: template.aspect,
            platform: template.platform,
            thumbnail_path: None,
        }
    }

    #[test]
    fn durations_are_minutes_and_padded_seconds() {
        assert_eq!(format_duration(15.0), "0:15");
        assert_eq!(format_duration(5.0), "0:05");
        assert_eq!(format_duration(60.0), "1:00");
        assert_eq!(format_duration(83.7), "1:23");
        assert_eq!(format_duration(9.9999999), "0:10");
        assert_eq!(format_duration(f64::NAN), "0:00");
    }

    #[test]
    fn scores_decrease_with_index() {
        let clips = vec![
            encoded("p", ClipKind::Clip, 0, 15.0),
            encoded("p", ClipKind::Clip, 2, 18.0),
        ];
        let entries = assemble(&clips, 90);
        assert_eq!(entries[0].score, 90);
        assert_eq!(entries[1].score, 88);
        assert!(entries[0].score > entries[1].score);
    }

    #[test]
    fn thumbnail_reference_present_without_thumbnail() {
        let entries = assemble(&[encoded("p", ClipKind::Mobile, 1, 30.0)], 90);
        let e = &entries[0];
        assert_eq!(e.id, "p-mobile-1");
        assert_eq!(e.thumbnail, "/api/thumbnails/p/p-mobile-1.jpg");
        assert!(!e.thumbnail_generated);
        assert_eq!(e.download_url, "/api/clips/p/p-mobile-1.mp4");
        assert_eq!(e.duration.as_deref(), Some("0:30"));
    }

    #[test]
    fn entry_json_uses_camel_case() {
        let entries = assemble(&[encoded("p", ClipKind::Clip, 0, 15.0)], 90);
        let value = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(value["downloadUrl"], "/api/clips/p/p-clip-0.mp4");
        assert_eq!(value["thumbnailGenerated"], false);
        assert_eq!(value["kind"], "clip");
        assert_eq!(value["format"], "mp4");
        assert_eq!(value["platform"], "TikTok/Instagram Reels");
    }

    #[test]
    fn discover_parses_ids_and_ignores_strangers() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "p-clip-1.mp4",
            "p-clip-0.mp4",
            "p-clip-0.jpg",
            "p-mobile-0.mp4",
            "p-clip-0-ai-1.jpg",
            "other-clip-0.mp4",
            "p-clip-x.mp4",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let entries = discover(dir.path(), "p", 90).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["p-clip-0", "p-clip-1", "p-mobile-0"]);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[1].index, 1);
        assert!(entries[0].thumbnail_generated);
        assert!(!entries[1].thumbnail_generated);
        assert_eq!(entries[1].title, "Product Demo");
        assert_eq!(entries[2].title, "TikTok Vertical");
        assert_eq!(entries[0].duration, None);
    }

    #[test]
    fn discover_unknown_index_falls_back_to_index_title() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p-clip-7.mp4"), b"").unwrap();
        let entries = discover(dir.path(), "p", 90).unwrap();
        assert_eq!(entries[0].title, "7");
        assert_eq!(entries[0].aspect, UNKNOWN_LABEL);
        assert_eq!(entries[0].score, 83);
    }

    #[test]
    fn discover_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("nope"), "nope", 90).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn sidecar_overwrites_whole_document() {
        let dir = tempfile::tempdir().unwrap();
        save_sidecar(dir.path(), "doc.json", &vec![1, 2, 3]).unwrap();
        save_sidecar(dir.path(), "doc.json", &vec![4]).unwrap();
        let loaded: Vec<i32> = load_sidecar(dir.path(), "doc.json").unwrap();
        assert_eq!(loaded, vec![4]);
        assert!(!dir.path().join(".doc.json.tmp").exists());
    }

    #[test]
    fn missing_sidecar_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_sidecar::<Vec<i32>>(dir.path(), "captions.json").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
