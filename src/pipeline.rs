//! End-to-end clip generation for a project.
//!
//! probe -> plan -> encode -> thumbnail -> assemble. Only a missing source
//! or a missing engine ends a run with an error; everything else shrinks
//! the result.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::captions::{
    CaptionDocument, LookupTranslator, MockTranscriber, Transcriber, Translator, load_captions,
    save_captions, translate_document, validate_language,
};
use crate::catalog::{self, ClipCatalogEntry};
use crate::config::PipelineOptions;
use crate::error::AppError;
use crate::ffmpeg::{CancelFlag, FfmpegLocator};
use crate::plan::{ClipKind, plan};
use crate::probe::{MediaProbe, SourceMedia};
use crate::project::ProjectStore;
use crate::thumbnail::{AiThumbnail, ThumbnailExtractor};
use crate::transcode::{BatchControl, TranscodeExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Created,
    Probed,
    Planned,
    Encoding,
    Assembled,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Created => "created",
            PipelineStage::Probed => "probed",
            PipelineStage::Planned => "planned",
            PipelineStage::Encoding => "encoding",
            PipelineStage::Assembled => "assembled",
        };
        f.write_str(name)
    }
}

struct RunLog<'a> {
    project_id: &'a str,
    kind: ClipKind,
}

impl RunLog<'_> {
    fn enter(&self, stage: PipelineStage, detail: fmt::Arguments<'_>) {
        log::info!(
            target: "clipforge::pipeline",
            "[{} {}] {}: {}",
            self.project_id,
            self.kind.prefix(),
            stage,
            detail
        );
    }
}

pub struct ClipPipeline {
    store: ProjectStore,
    locator: Arc<FfmpegLocator>,
    options: PipelineOptions,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
}

impl ClipPipeline {
    pub fn new(store: ProjectStore, locator: Arc<FfmpegLocator>) -> Self {
        Self {
            store,
            locator,
            options: PipelineOptions::default(),
            transcriber: Arc::new(MockTranscriber),
            translator: Arc::new(LookupTranslator::default()),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn locator(&self) -> &Arc<FfmpegLocator> {
        &self.locator
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn media_probe(&self) -> MediaProbe {
        MediaProbe::new(Arc::clone(&self.locator))
    }

    fn control(&self, cancel: Option<CancelFlag>) -> BatchControl {
        BatchControl::new(self.options.effective_workers(), cancel)
    }

    /// Probe `source` on the blocking pool.
    pub async fn probe_source(&self, source: &Path) -> Result<SourceMedia, AppError> {
        let probe = self.media_probe();
        let path = source.to_path_buf();
        tokio::task::spawn_blocking(move || probe.probe(&path))
            .await
            .map_err(|e| AppError::from(e.to_string()))?
    }

    /// Highlight clips for `project_id` cut from `source`.
    pub async fn generate_highlights(
        &self,
        project_id: &str,
        source: &Path,
        cancel: Option<CancelFlag>,
    ) -> Result<Vec<ClipCatalogEntry>, AppError> {
        self.run(project_id, source, ClipKind::Clip, cancel).await
    }

    /// Vertical clips from the project's registered source.
    pub async fn generate_mobile(
        &self,
        project_id: &str,
        cancel: Option<CancelFlag>,
    ) -> Result<Vec<ClipCatalogEntry>, AppError> {
        let source = self.store.source_path(project_id)?;
        self.run(project_id, &source, ClipKind::Mobile, cancel).await
    }

    async fn run(
        &self,
        project_id: &str,
        source: &Path,
        kind: ClipKind,
        cancel: Option<CancelFlag>,
    ) -> Result<Vec<ClipCatalogEntry>, AppError> {
        let run_log = RunLog { project_id, kind };
        let out_dir = self.store.project_dir(project_id)?;
        run_log.enter(
            PipelineStage::Created,
            format_args!("source={}", source.display()),
        );
        if !source.is_file() {
            return Err(AppError::SourceNotFound(source.to_path_buf()));
        }
        let executor = TranscodeExecutor::new(
            Arc::clone(&self.locator),
            self.options.effective_transcode_timeout(),
        );
        executor.ensure_available()?;

        let media = self.probe_source(source).await?;
        run_log.enter(
            PipelineStage::Probed,
            format_args!(
                "{:.3}s {}x{}",
                media.duration_seconds, media.width, media.height
            ),
        );

        let planned = plan(&media, kind.templates());
        run_log.enter(
            PipelineStage::Planned,
            format_args!("{} of {} variants", planned.len(), kind.templates().len()),
        );

        let control = self.control(cancel);
        if control.is_cancelled() {
            return Err(AppError::aborted());
        }
        fs::create_dir_all(&out_dir)?;
        run_log.enter(
            PipelineStage::Encoding,
            format_args!("workers={}", control.workers),
        );
        let encoded = executor
            .transcode_batch(&media, project_id, kind, planned, &out_dir, &control)
            .await?;

        let extractor = ThumbnailExtractor::new(
            Arc::clone(&self.locator),
            self.options.effective_thumbnail_timeout(),
        );
        let encoded = extractor
            .attach_thumbnails(encoded, self.options.effective_thumbnail_offset(), &control)
            .await?;

        let entries = catalog::assemble(&encoded, self.options.effective_base_score());
        run_log.enter(
            PipelineStage::Assembled,
            format_args!("{} clips", entries.len()),
        );
        Ok(entries)
    }

    /// Candidate frames for every clip already stored for `project_id`.
    pub async fn generate_ai_thumbnails(
        &self,
        project_id: &str,
        cancel: Option<CancelFlag>,
    ) -> Result<Vec<AiThumbnail>, AppError> {
        let dir = self.store.project_dir(project_id)?;
        let stored = catalog::scan(&dir, project_id)?;
        let extractor = ThumbnailExtractor::new(
            Arc::clone(&self.locator),
            self.options.effective_thumbnail_timeout(),
        );
        extractor
            .sample_all(&self.media_probe(), stored, &self.control(cancel))
            .await
    }

    /// Catalog rebuilt from the project directory.
    pub fn list_clips(&self, project_id: &str) -> Result<Vec<ClipCatalogEntry>, AppError> {
        let dir = self.store.project_dir(project_id)?;
        catalog::discover(&dir, project_id, self.options.effective_base_score())
    }

    /// Transcribe the registered source and store `captions.json`.
    pub fn generate_captions(&self, project_id: &str) -> Result<CaptionDocument, AppError> {
        let source = self.store.source_path(project_id)?;
        let doc = self.transcriber.transcribe(&source)?;
        let dir = self.store.ensure_project_dir(project_id)?;
        save_captions(&dir, None, &doc)?;
        Ok(doc)
    }

    /// Translate stored captions and write `captions_{language}.json`.
    pub fn translate_captions(
        &self,
        project_id: &str,
        language: &str,
    ) -> Result<CaptionDocument, AppError> {
        validate_language(language)?;
        let dir = self.store.project_dir(project_id)?;
        let original = load_captions(&dir, None)?;
        let translated = translate_document(&original, language, self.translator.as_ref());
        save_captions(&dir, Some(language), &translated)?;
        Ok(translated)
    }

    /// Registers `source` for `project_id` and returns the stored path.
    pub fn register_source(&self, project_id: &str, source: &Path) -> Result<PathBuf, AppError> {
        self.store.register_source(project_id, source)
    }
}
