//! Variant templates and the clip planner.
//!
//! A template describes a time window as a function of the source duration
//! `d`; every bound in the tables has the form `min(cap, d - reserve)`.
//! Planning is pure: the same source duration and template table always
//! yield the same clips with the same indices, which is what makes output
//! names deterministic.

use std::fmt;

use crate::ffmpeg::scale_pad_filter;
use crate::probe::SourceMedia;

/// Slack for float comparisons against the source duration.
pub const DURATION_EPSILON: f64 = 1e-6;

/// `min(cap, d - reserve)` for a source of duration `d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub cap: f64,
    pub reserve: f64,
}

impl Bound {
    pub const fn new(cap: f64, reserve: f64) -> Self {
        Self { cap, reserve }
    }

    pub const fn at_most(cap: f64) -> Self {
        Self { cap, reserve: 0.0 }
    }

    pub fn eval(&self, duration: f64) -> f64 {
        self.cap.min(duration - self.reserve)
    }
}

/// Target frame box; content is scaled to fit and padded to the exact size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Transform {
    pub width: u32,
    pub height: u32,
}

impl Transform {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn video_filter(&self) -> String {
        scale_pad_filter(self.width, self.height)
    }
}

const VERTICAL: Transform = Transform::new(360, 640);
const SQUARE: Transform = Transform::new(360, 360);
const LANDSCAPE: Transform = Transform::new(640, 360);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariantTemplate {
    pub title: &'static str,
    pub start: Bound,
    pub length: Bound,
    pub aspect: &'static str,
    pub transform: Transform,
    pub platform: &'static str,
}

pub static HIGHLIGHT_TEMPLATES: [VariantTemplate; 3] = [
    VariantTemplate {
        title: "Hook Segment",
        start: Bound::at_most(0.0),
        length: Bound::at_most(15.0),
        aspect: "9:16",
        transform: VERTICAL,
        platform: "TikTok/Instagram Reels",
    },
    VariantTemplate {
        title: "Product Demo",
        start: Bound::new(5.0, 10.0),
        length: Bound::new(23.0, 5.0),
        aspect: "1:1",
        transform: SQUARE,
        platform: "Instagram Post",
    },
    VariantTemplate {
        title: "Customer Testimonial",
        start: Bound::new(10.0, 15.0),
        length: Bound::new(18.0, 10.0),
        aspect: "16:9",
        transform: LANDSCAPE,
        platform: "YouTube Shorts",
    },
];

pub static MOBILE_TEMPLATES: [VariantTemplate; 4] = [
    VariantTemplate {
        title: "TikTok Vertical",
        start: Bound::at_most(0.0),
        length: Bound::at_most(15.0),
        aspect: "9:16",
        transform: VERTICAL,
        platform: "Mobile",
    },
    VariantTemplate {
        title: "Instagram Reels",
        start: Bound::new(5.0, 10.0),
        length: Bound::new(30.0, 5.0),
        aspect: "9:16",
        transform: VERTICAL,
        platform: "Mobile",
    },
    VariantTemplate {
        title: "YouTube Shorts",
        start: Bound::new(10.0, 15.0),
        length: Bound::new(60.0, 10.0),
        aspect: "9:16",
        transform: VERTICAL,
        platform: "Mobile",
    },
    VariantTemplate {
        title: "Instagram Story",
        start: Bound::new(15.0, 20.0),
        length: Bound::new(15.0, 15.0),
        aspect: "9:16",
        transform: VERTICAL,
        platform: "Mobile",
    },
];

/// Offsets (seconds into an encoded clip) sampled for AI thumbnail candidates.
pub const AI_SAMPLE_OFFSETS: [f64; 3] = [1.0, 3.0, 5.0];
pub const AI_SAMPLE_FRAME: Transform = LANDSCAPE;

/// Which template family produced a clip; also its file name infix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Clip,
    Mobile,
}

impl ClipKind {
    pub const ALL: [ClipKind; 2] = [ClipKind::Clip, ClipKind::Mobile];

    pub fn prefix(self) -> &'static str {
        match self {
            ClipKind::Clip => "clip",
            ClipKind::Mobile => "mobile",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }

    pub fn templates(self) -> &'static [VariantTemplate] {
        match self {
            ClipKind::Clip => &HIGHLIGHT_TEMPLATES,
            ClipKind::Mobile => &MOBILE_TEMPLATES,
        }
    }

    pub fn template(self, index: usize) -> Option<&'static VariantTemplate> {
        self.templates().get(index)
    }
}

/// `{projectId}-{kind}-{index}`; the stem of every artifact for one clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClipId {
    pub project_id: String,
    pub kind: ClipKind,
    pub index: usize,
}

impl ClipId {
    pub fn new(project_id: impl Into<String>, kind: ClipKind, index: usize) -> Self {
        Self {
            project_id: project_id.into(),
            kind,
            index,
        }
    }

    pub fn video_file_name(&self) -> String {
        format!("{}.mp4", self)
    }

    pub fn thumbnail_file_name(&self) -> String {
        format!("{}.jpg", self)
    }

    pub fn ai_sample_file_name(&self, sample_index: usize) -> String {
        format!("{}-ai-{}.jpg", self, sample_index)
    }

    /// Inverse of `Display` for ids belonging to `project_id`.
    pub fn parse(project_id: &str, stem: &str) -> Option<Self> {
        let rest = stem.strip_prefix(project_id)?.strip_prefix('-')?;
        let (prefix, index) = rest.split_once('-')?;
        let kind = ClipKind::from_prefix(prefix)?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(project_id, kind, index.parse().ok()?))
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.project_id, self.kind.prefix(), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedClip {
    /// Position of the template in its table, kept even when earlier
    /// templates were dropped.
    pub index: usize,
    pub title: &'static str,
    pub start: f64,
    pub length: f64,
    pub aspect: &'static str,
    pub transform: Transform,
    pub platform: &'static str,
}

/// Concrete clip for one template, or `None` when the source is too short.
pub fn plan_one(index: usize, template: &VariantTemplate, duration: f64) -> Option<PlannedClip> {
    if !duration.is_finite() || duration <= 0.0 {
        return None;
    }
    let start = template.start.eval(duration);
    if !start.is_finite() || start < 0.0 || start >= duration {
        return None;
    }
    let length = template.length.eval(duration).min(duration - start);
    if !length.is_finite() || length <= DURATION_EPSILON {
        return None;
    }
    Some(PlannedClip {
        index,
        title: template.title,
        start,
        length,
        aspect: template.aspect,
        transform: template.transform,
        platform: template.platform,
    })
}

pub fn plan(source: &SourceMedia, templates: &[VariantTemplate]) -> Vec<PlannedClip> {
    let planned: Vec<PlannedClip> = templates
        .iter()
        .enumerate()
        .filter_map(|(index, template)| {
            let clip = plan_one(index, template, source.duration_seconds);
            if clip.is_none() {
                log::debug!(
                    target: "clipforge::plan",
                    "Dropping template {} ({}) for {:.3}s source",
                    index,
                    template.title,
                    source.duration_seconds
                );
            }
            clip
        })
        .collect();
    log::info!(
        target: "clipforge::plan",
        "Planned {} of {} variants for {}",
        planned.len(),
        templates.len(),
        source.path.display()
    );
    planned
}

/// AI thumbnail sample offsets that fall inside a clip of `clip_duration`.
/// Each keeps its table position as the sample index.
pub fn plan_samples(clip_duration: f64) -> Vec<(usize, f64)> {
    AI_SAMPLE_OFFSETS
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, offset)| *offset < clip_duration)
        .collect()
}
