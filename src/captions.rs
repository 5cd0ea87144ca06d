//! Caption documents and the providers that produce them.
//!
//! Transcription and translation sit behind `Transcriber` and `Translator`.
//! The bundled implementations are offline stand-ins: a fixed three-segment
//! transcript and a phrase table for a handful of languages.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::{load_sidecar, save_sidecar};
use crate::error::AppError;

pub const CAPTIONS_FILE: &str = "captions.json";
pub const DEFAULT_LANGUAGE: &str = "en";

static LANGUAGE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})?$").expect("invalid language regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionDocument {
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(default)]
    pub segments: Vec<CaptionSegment>,
}

pub fn validate_language(code: &str) -> Result<(), AppError> {
    if LANGUAGE_CODE.is_match(code) {
        Ok(())
    } else {
        Err(AppError::invalid_input(format!(
            "Invalid language code: {:?}",
            code
        )))
    }
}

/// `captions.json` for the source language, `captions_{lang}.json` otherwise.
pub fn captions_file_name(language: Option<&str>) -> String {
    match language {
        None => CAPTIONS_FILE.to_string(),
        Some(lang) => format!("captions_{}.json", lang),
    }
}

/// Drops a leading `[Tag]` marker such as `[Hindi]`.
pub fn strip_tag(text: &str) -> &str {
    match text.split_once(']') {
        Some((_, rest)) => rest.trim(),
        None => text,
    }
}

pub trait Transcriber: Send + Sync {
    fn transcribe(&self, source: &Path) -> Result<CaptionDocument, AppError>;
}

pub trait Translator: Send + Sync {
    /// `text` in `target_language`; unknown text comes back unchanged.
    fn translate(&self, text: &str, target_language: &str) -> String;
}

/// Fixed English transcript, used when no speech model is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockTranscriber;

const MOCK_SEGMENTS: [(f64, f64, &str); 3] = [
    (0.0, 5.0, "Welcome to our amazing product demo"),
    (5.0, 10.0, "This revolutionary technology will change everything"),
    (10.0, 15.0, "Don't miss out on this incredible opportunity"),
];

impl Transcriber for MockTranscriber {
    fn transcribe(&self, source: &Path) -> Result<CaptionDocument, AppError> {
        if !source.is_file() {
            return Err(AppError::SourceNotFound(source.to_path_buf()));
        }
        Ok(CaptionDocument {
            language: DEFAULT_LANGUAGE.to_string(),
            original_language: None,
            segments: MOCK_SEGMENTS
                .iter()
                .map(|(start, end, text)| CaptionSegment {
                    start: *start,
                    end: *end,
                    text: text.trim().to_string(),
                })
                .collect(),
        })
    }
}

const PHRASES: [&str; 3] = [MOCK_SEGMENTS[0].2, MOCK_SEGMENTS[1].2, MOCK_SEGMENTS[2].2];

const PHRASE_TABLE: &[(&str, [&str; 3])] = &[
    (
        "es",
        [
            "Bienvenido a nuestra increíble demostración de producto",
            "Esta tecnología revolucionaria cambiará todo",
            "No te pierdas esta increíble oportunidad",
        ],
    ),
    (
        "fr",
        [
            "Bienvenue à notre incroyable démonstration de produit",
            "Cette technologie révolutionnaire va tout changer",
            "Ne manquez pas cette opportunité incroyable",
        ],
    ),
    (
        "de",
        [
            "Willkommen zu unserer erstaunlichen Produktdemo",
            "Diese revolutionäre Technologie wird alles verändern",
            "Verpassen Sie nicht diese unglaubliche Gelegenheit",
        ],
    ),
    (
        "it",
        [
            "Benvenuto alla nostra straordinaria demo del prodotto",
            "Questa tecnologia rivoluzionaria cambierà tutto",
            "Non perdere questa incredibile opportunità",
        ],
    ),
    (
        "pt",
        [
            "Bem-vindo à nossa incrível demonstração de produto",
            "Esta tecnologia revolucionária mudará tudo",
            "Não perca esta oportunidade incrível",
        ],
    ),
    (
        "ru",
        [
            "Добро пожаловать на нашу потрясающую демонстрацию продукта",
            "Эта революционная технология изменит все",
            "Не упустите эту невероятную возможность",
        ],
    ),
    (
        "ja",
        [
            "素晴らしい製品デモへようこそ",
            "この画期的な技術がすべてを変えるでしょう",
            "この信じられないほどの機会を見逃さないでください",
        ],
    ),
    (
        "ko",
        [
            "놀라운 제품 데모에 오신 것을 환영합니다",
            "이 혁명적인 기술이 모든 것을 바꿀 것입니다",
            "이 놀라운 기회를 놓치지 마세요",
        ],
    ),
    (
        "zh",
        [
            "欢迎来到我们惊人的产品演示",
            "这项革命性技术将改变一切",
            "不要错过这个令人难以置信的机会",
        ],
    ),
    (
        "ar",
        [
            "مرحبًا بك في عرضنا الرائع للمنتج",
            "هذه التقنية الثورية ستغير كل شيء",
            "لا تفوت هذه الفرصة المذهلة",
        ],
    ),
    (
        "hi",
        [
            "हमारे अद्भुत उत्पाद डेमो में आपका स्वागत है",
            "यह क्रांतिकारी तकनीक सब कुछ बदल देगी",
            "इस अविश्वसनीय अवसर को न चूकें",
        ],
    ),
];

/// Exact-phrase lookup per language.
#[derive(Debug, Clone)]
pub struct LookupTranslator {
    tables: HashMap<String, HashMap<String, String>>,
}

impl LookupTranslator {
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn insert(&mut self, language: &str, source: &str, translated: &str) {
        self.tables
            .entry(language.to_string())
            .or_default()
            .insert(source.to_string(), translated.to_string());
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }
}

impl Default for LookupTranslator {
    /// Table covering the mock transcript.
    fn default() -> Self {
        let mut translator = Self::empty();
        for (language, translations) in PHRASE_TABLE {
            for (source, translated) in PHRASES.iter().zip(translations) {
                translator.insert(language, source, translated);
            }
        }
        translator
    }
}

impl Translator for LookupTranslator {
    fn translate(&self, text: &str, target_language: &str) -> String {
        self.tables
            .get(target_language)
            .and_then(|table| table.get(text))
            .cloned()
            .unwrap_or_else(|| text.to_string())
    }
}

/// Translated copy of `doc`. Segment timing is kept; a leading `[Tag]` is
/// stripped before lookup.
pub fn translate_document(
    doc: &CaptionDocument,
    target_language: &str,
    translator: &dyn Translator,
) -> CaptionDocument {
    CaptionDocument {
        language: target_language.to_string(),
        original_language: Some(doc.language.clone()),
        segments: doc
            .segments
            .iter()
            .map(|segment| CaptionSegment {
                start: segment.start,
                end: segment.end,
                text: translator.translate(strip_tag(&segment.text), target_language),
            })
            .collect(),
    }
}

pub fn save_captions(
    project_dir: &Path,
    language: Option<&str>,
    doc: &CaptionDocument,
) -> Result<PathBuf, AppError> {
    let path = save_sidecar(project_dir, &captions_file_name(language), doc)?;
    log::info!(
        target: "clipforge::captions",
        "Saved {} captions ({} segments) to {}",
        doc.language,
        doc.segments.len(),
        path.display()
    );
    Ok(path)
}

pub fn load_captions(
    project_dir: &Path,
    language: Option<&str>,
) -> Result<CaptionDocument, AppError> {
    load_sidecar(project_dir, &captions_file_name(language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes_are_validated() {
        for ok in ["es", "fil", "pt-BR", "zh-Hant"] {
            assert!(validate_language(ok).is_ok(), "{}", ok);
        }
        for bad in ["", "E", "english", "es/../x", "es_ES", "ES"] {
            assert!(validate_language(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn file_names_follow_language() {
        assert_eq!(captions_file_name(None), "captions.json");
        assert_eq!(captions_file_name(Some("es")), "captions_es.json");
    }

    #[test]
    fn strip_tag_removes_bracket_prefix() {
        assert_eq!(strip_tag("[Hindi] Welcome"), "Welcome");
        assert_eq!(strip_tag("No tag here"), "No tag here");
    }

    #[test]
    fn lookup_translates_known_phrases_only() {
        let t = LookupTranslator::default();
        assert_eq!(
            t.translate("Welcome to our amazing product demo", "es"),
            "Bienvenido a nuestra increíble demostración de producto"
        );
        assert_eq!(t.translate("Something else", "es"), "Something else");
        assert_eq!(
            t.translate("Welcome to our amazing product demo", "xx"),
            "Welcome to our amazing product demo"
        );
        assert_eq!(t.languages().len(), 11);
    }

    #[test]
    fn translated_document_keeps_timing_and_source_language() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        std::fs::write(&source, b"v").unwrap();
        let mut doc = MockTranscriber.transcribe(&source).unwrap();
        doc.segments[1].text = format!("[English] {}", doc.segments[1].text);

        let fr = translate_document(&doc, "fr", &LookupTranslator::default());
        assert_eq!(fr.language, "fr");
        assert_eq!(fr.original_language.as_deref(), Some("en"));
        assert_eq!(fr.segments.len(), 3);
        assert_eq!((fr.segments[1].start, fr.segments[1].end), (5.0, 10.0));
        assert_eq!(
            fr.segments[1].text,
            "Cette technologie révolutionnaire va tout changer"
        );
    }

    #[test]
    fn captions_round_trip_through_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in.mp4");
        std::fs::write(&source, b"v").unwrap();
        let doc = MockTranscriber.transcribe(&source).unwrap();
        let path = save_captions(dir.path(), None, &doc).unwrap();
        assert!(path.ends_with("captions.json"));
        assert_eq!(load_captions(dir.path(), None).unwrap(), doc);
        let raw = std::fs::read_to_string(path).unwrap();
        assert!(!raw.contains("originalLanguage"));
    }
}
