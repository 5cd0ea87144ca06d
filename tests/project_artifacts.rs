#![cfg(unix)]

mod support;

use std::fs;
use std::sync::Arc;

use clipforge_core::captions::{CaptionDocument, Translator};
use clipforge_core::error::AppError;
use clipforge_core::plan::{ClipId, ClipKind};
use support::{FakeEngine, PROJECT, Workspace};

#[tokio::test]
async fn discover_after_restart_parses_ids_back() {
    let engine = FakeEngine::builder().probe_duration(10.0).build();
    let ws = Workspace::new();
    ws.pipeline(engine.locator())
        .generate_highlights(PROJECT, &ws.source, None)
        .await
        .unwrap();

    // A fresh pipeline has no planning state, only the files on disk.
    let listed = ws
        .pipeline(FakeEngine::healthy().locator())
        .list_clips(PROJECT)
        .unwrap();

    let indices: Vec<usize> = listed
        .iter()
        .map(|e| ClipId::parse(PROJECT, &e.id).unwrap().index)
        .collect();
    assert_eq!(indices, vec![0, 1]);
    assert!(listed.iter().all(|e| e.kind == ClipKind::Clip));
    assert_eq!(listed[0].title, "Hook Segment");
    assert_eq!(listed[1].score, 89);
    assert!(listed.iter().all(|e| e.thumbnail_generated));
}

#[test]
fn listing_unknown_project_is_not_found() {
    let ws = Workspace::new();
    let err = ws
        .pipeline(FakeEngine::healthy().locator())
        .list_clips("never-generated")
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn captions_are_generated_then_translated_into_sidecars() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(FakeEngine::healthy().locator());
    pipeline.register_source(PROJECT, &ws.source).unwrap();

    let original = pipeline.generate_captions(PROJECT).unwrap();
    assert_eq!(original.language, "en");
    assert_eq!(original.segments.len(), 3);

    let es = pipeline.translate_captions(PROJECT, "es").unwrap();
    assert_eq!(es.language, "es");
    assert_eq!(es.original_language.as_deref(), Some("en"));
    assert_eq!(
        es.segments[2].text,
        "No te pierdas esta increíble oportunidad"
    );

    let stored: CaptionDocument = serde_json::from_str(
        &fs::read_to_string(ws.project_dir().join("captions_es.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(stored, es);
    assert!(ws.project_dir().join("captions.json").is_file());
}

#[test]
fn unknown_language_passes_text_through() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(FakeEngine::healthy().locator());
    pipeline.register_source(PROJECT, &ws.source).unwrap();
    let original = pipeline.generate_captions(PROJECT).unwrap();

    let sv = pipeline.translate_captions(PROJECT, "sv").unwrap();
    let texts: Vec<&str> = sv.segments.iter().map(|s| s.text.as_str()).collect();
    let expected: Vec<&str> = original.segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, expected);
}

struct Shouting;

impl Translator for Shouting {
    fn translate(&self, text: &str, _target_language: &str) -> String {
        text.to_uppercase()
    }
}

#[test]
fn translator_is_pluggable() {
    let ws = Workspace::new();
    let pipeline = ws
        .pipeline(FakeEngine::healthy().locator())
        .with_translator(Arc::new(Shouting));
    pipeline.register_source(PROJECT, &ws.source).unwrap();
    pipeline.generate_captions(PROJECT).unwrap();

    let doc = pipeline.translate_captions(PROJECT, "en-US").unwrap();
    assert_eq!(doc.segments[0].text, "WELCOME TO OUR AMAZING PRODUCT DEMO");
}

#[test]
fn captions_need_a_registered_source() {
    let ws = Workspace::new();
    let err = ws
        .pipeline(FakeEngine::healthy().locator())
        .generate_captions(PROJECT)
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
