//! ffprobe JSON parsing. Fields stay optional here; callers decide what a
//! missing value falls back to.

use std::path::Path;

use serde::Deserialize;

use super::runner::{ToolLimits, run_tool};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbedStreams {
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub codec_name: Option<String>,
    pub format_name: Option<String>,
}

fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn positive_seconds(s: &str) -> Option<f64> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

pub fn parse_ffprobe_json(json: &str) -> Result<ProbedStreams, AppError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::from(format!("Failed to parse ffprobe JSON: {}", e)))?;

    let video_stream = output
        .streams
        .as_ref()
        .and_then(|streams| streams.iter().find(|s| s.codec_type.as_deref() == Some("video")));

    // Container duration first; some muxers only fill the stream entry.
    let duration = output
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(positive_seconds)
        .or_else(|| {
            video_stream
                .and_then(|s| s.duration.as_deref())
                .and_then(positive_seconds)
        });

    Ok(ProbedStreams {
        duration,
        width: video_stream.and_then(|s| s.width).filter(|w| *w > 0),
        height: video_stream.and_then(|s| s.height).filter(|h| *h > 0),
        fps: video_stream
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate),
        codec_name: video_stream.and_then(|s| s.codec_name.clone()),
        format_name: output.format.and_then(|f| f.format_name),
    })
}

/// Run ffprobe on a media file and parse its streams.
pub fn probe_streams(
    ffprobe: &Path,
    path: &Path,
    limits: &ToolLimits,
) -> Result<ProbedStreams, AppError> {
    log::debug!(
        target: "clipforge::ffmpeg::ffprobe",
        "probe_streams: path={}",
        path.display()
    );
    let args = vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        super::path_to_string(path),
    ];
    let output = run_tool(ffprobe, &args, limits)?;
    parse_ffprobe_json(&output.stdout)
}
