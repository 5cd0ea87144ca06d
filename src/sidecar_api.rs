use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::captions::{CaptionDocument, LookupTranslator};
use crate::catalog::ClipCatalogEntry;
use crate::config::{PipelineOptions, data_dir_from_env};
use crate::error::AppError;
use crate::ffmpeg::{CancelFlag, FfmpegLocator};
use crate::pipeline::ClipPipeline;
use crate::plan::ClipKind;
use crate::probe::SourceMedia;
use crate::project::ProjectStore;
use crate::thumbnail::AiThumbnail;

const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCapabilitiesResult {
    pub protocol_version: u8,
    pub ffmpeg_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_version: Option<String>,
    pub clip_kinds: Vec<&'static str>,
    pub translation_languages: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipsResult {
    pub project_id: String,
    pub clips: Vec<ClipCatalogEntry>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiThumbnailsResult {
    pub project_id: String,
    pub thumbnails: Vec<AiThumbnail>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSourceResult {
    pub project_id: String,
    pub source_path: PathBuf,
}

fn block_on_async<T>(future: impl Future<Output = Result<T, AppError>>) -> Result<T, AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::from(format!("Failed to initialize async runtime: {}", e)))?;
    runtime.block_on(future)
}

/// Shared state for one sidecar process: storage root, the engine locator
/// and the baseline options every request starts from.
#[derive(Clone)]
pub struct SidecarContext {
    store: ProjectStore,
    locator: Arc<FfmpegLocator>,
    options: PipelineOptions,
}

impl SidecarContext {
    pub fn new(store: ProjectStore, locator: Arc<FfmpegLocator>, options: PipelineOptions) -> Self {
        Self {
            store,
            locator,
            options,
        }
    }

    /// `CLIPFORGE_*` environment plus the system engine search.
    pub fn from_env() -> Self {
        Self::new(
            ProjectStore::under_data_dir(&data_dir_from_env()),
            Arc::new(FfmpegLocator::system()),
            PipelineOptions::from_env(),
        )
    }

    fn pipeline(&self, overrides: Option<&PipelineOptions>) -> ClipPipeline {
        let options = match overrides {
            Some(o) => self.options.merged_with(o),
            None => self.options.clone(),
        };
        ClipPipeline::new(self.store.clone(), Arc::clone(&self.locator)).with_options(options)
    }
}

pub fn app_capabilities(ctx: &SidecarContext) -> Result<AppCapabilitiesResult, AppError> {
    let ffmpeg_version = ctx.locator.version().ok().map(str::to_string);
    Ok(AppCapabilitiesResult {
        protocol_version: PROTOCOL_VERSION,
        ffmpeg_available: ffmpeg_version.is_some(),
        ffmpeg_version,
        clip_kinds: ClipKind::ALL.iter().map(|k| k.prefix()).collect(),
        translation_languages: LookupTranslator::default()
            .languages()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

pub fn register_source(
    ctx: &SidecarContext,
    project_id: String,
    source_path: PathBuf,
) -> Result<RegisterSourceResult, AppError> {
    let source_path = ctx.store.register_source(&project_id, &source_path)?;
    Ok(RegisterSourceResult {
        project_id,
        source_path,
    })
}

/// Highlight clips. A given `source_path` is registered for the project
/// first; otherwise the registered source is used.
pub fn generate_clips(
    ctx: &SidecarContext,
    project_id: String,
    source_path: Option<PathBuf>,
    options: Option<PipelineOptions>,
    cancel: Option<CancelFlag>,
) -> Result<ClipsResult, AppError> {
    let source = match source_path {
        Some(path) => ctx.store.register_source(&project_id, &path)?,
        None => ctx.store.source_path(&project_id)?,
    };
    let pipeline = ctx.pipeline(options.as_ref());
    let clips = block_on_async(pipeline.generate_highlights(&project_id, &source, cancel))?;
    Ok(ClipsResult { project_id, clips })
}

pub fn generate_mobile_clips(
    ctx: &SidecarContext,
    project_id: String,
    options: Option<PipelineOptions>,
    cancel: Option<CancelFlag>,
) -> Result<ClipsResult, AppError> {
    let pipeline = ctx.pipeline(options.as_ref());
    let clips = block_on_async(pipeline.generate_mobile(&project_id, cancel))?;
    Ok(ClipsResult { project_id, clips })
}

pub fn list_clips(ctx: &SidecarContext, project_id: String) -> Result<ClipsResult, AppError> {
    let clips = ctx.pipeline(None).list_clips(&project_id)?;
    Ok(ClipsResult { project_id, clips })
}

pub fn generate_ai_thumbnails(
    ctx: &SidecarContext,
    project_id: String,
    cancel: Option<CancelFlag>,
) -> Result<AiThumbnailsResult, AppError> {
    let pipeline = ctx.pipeline(None);
    let thumbnails = block_on_async(pipeline.generate_ai_thumbnails(&project_id, cancel))?;
    Ok(AiThumbnailsResult {
        project_id,
        thumbnails,
    })
}

pub fn generate_captions(
    ctx: &SidecarContext,
    project_id: String,
) -> Result<CaptionDocument, AppError> {
    ctx.pipeline(None).generate_captions(&project_id)
}

pub fn translate_captions(
    ctx: &SidecarContext,
    project_id: String,
    language: String,
) -> Result<CaptionDocument, AppError> {
    ctx.pipeline(None).translate_captions(&project_id, &language)
}

pub fn probe_media(ctx: &SidecarContext, path: PathBuf) -> Result<SourceMedia, AppError> {
    let pipeline = ctx.pipeline(None);
    block_on_async(pipeline.probe_source(&path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(root: &std::path::Path) -> SidecarContext {
        SidecarContext::new(
            ProjectStore::under_data_dir(root),
            Arc::new(FfmpegLocator::with_candidates(vec![])),
            PipelineOptions::default(),
        )
    }

    #[test]
    fn capabilities_without_engine() {
        let dir = tempfile::tempdir().unwrap();
        let caps = app_capabilities(&context(dir.path())).unwrap();
        assert!(!caps.ffmpeg_available);
        assert_eq!(caps.clip_kinds, vec!["clip", "mobile"]);
        assert!(caps.translation_languages.contains(&"es".to_string()));
        let value = serde_json::to_value(&caps).unwrap();
        assert!(value.get("ffmpegVersion").is_none());
        assert_eq!(value["protocolVersion"], 1);
    }

    #[test]
    fn generate_without_engine_is_executor_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("in.mp4");
        std::fs::write(&video, b"v").unwrap();
        let err = generate_clips(
            &context(dir.path()),
            "p1".into(),
            Some(video),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ExecutorUnavailable(_)));
    }

    #[test]
    fn captions_then_translation() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("in.mp4");
        std::fs::write(&video, b"v").unwrap();
        let ctx = context(dir.path());
        register_source(&ctx, "p1".into(), video).unwrap();
        let doc = generate_captions(&ctx, "p1".into()).unwrap();
        assert_eq!(doc.language, "en");
        let de = translate_captions(&ctx, "p1".into(), "de".into()).unwrap();
        assert_eq!(de.segments[0].text, "Willkommen zu unserer erstaunlichen Produktdemo");
        assert!(dir.path().join("clips/p1/captions_de.json").is_file());
    }
}
