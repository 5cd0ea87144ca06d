//! Turn FFmpeg exit codes and stderr into short, loggable summaries.
//!
//! Exit codes come from ffmpeg.c: 1 (general), 69 (rate exceeded),
//! 123 (hard exit), 255 (signal). -1 marks a spawn failure. Full stderr is
//! kept as `detail`.

use serde::Serialize;

use crate::error::AppError;

const ELLIPSIS: &str = "…";
const SUMMARY_MAX_LEN: usize = 120;

/// Summary plus raw detail for one failed engine invocation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegErrorPayload {
    pub summary: String,
    pub detail: String,
}

/// Stderr fragments that say more than the exit code does.
const STDERR_HINTS: &[(&str, &str)] = &[
    ("invalid data found when processing input", "Input is not a readable video."),
    ("no such file or directory", "Input file is missing."),
    ("does not contain any stream", "Input has no usable streams."),
    ("output file is empty", "Nothing was encoded for the requested window."),
    ("unknown encoder", "Required encoder is not available in this FFmpeg build."),
];

pub fn parse_ffmpeg_error(stderr: &str, exit_code: Option<i32>) -> FfmpegErrorPayload {
    let summary = match stderr_hint(stderr) {
        Some(hint) => hint.to_string(),
        None => match exit_code {
            Some(code) => known_exit_code_summary(code)
                .unwrap_or_else(|| format!("FFmpeg failed (exit code {}).", code)),
            None => first_line_truncated(stderr, SUMMARY_MAX_LEN),
        },
    };
    FfmpegErrorPayload {
        summary,
        detail: stderr.trim().to_string(),
    }
}

/// Payload for any crate error, so per-clip warnings read the same way
/// whether the engine failed, timed out or never started.
pub fn describe_error(err: &AppError) -> FfmpegErrorPayload {
    match err {
        AppError::FfmpegFailed { code, stderr } => parse_ffmpeg_error(stderr, Some(*code)),
        other => {
            let text = other.to_string();
            FfmpegErrorPayload {
                summary: first_line_truncated(&text, SUMMARY_MAX_LEN),
                detail: text,
            }
        }
    }
}

fn stderr_hint(stderr: &str) -> Option<&'static str> {
    let lower = stderr.to_lowercase();
    STDERR_HINTS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, hint)| *hint)
}

fn known_exit_code_summary(code: i32) -> Option<String> {
    match code {
        -1 => Some("FFmpeg not found or failed to start.".into()),
        1 => Some("FFmpeg failed.".into()),
        69 => Some("Encoding rate limit exceeded.".into()),
        123 | 255 => Some("Encoding was stopped.".into()),
        _ => None,
    }
}

fn first_line_truncated(text: &str, max_len: usize) -> String {
    let first = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim())
        .unwrap_or("");
    if first.len() <= max_len {
        return first.to_string();
    }
    let mut cut = max_len.saturating_sub(ELLIPSIS.len());
    while !first.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &first[..cut], ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_1() {
        let p = parse_ffmpeg_error("", Some(1));
        assert_eq!(p.summary, "FFmpeg failed.");
    }

    #[test]
    fn exit_code_255() {
        let p = parse_ffmpeg_error("", Some(255));
        assert_eq!(p.summary, "Encoding was stopped.");
    }

    #[test]
    fn unknown_code_short_summary() {
        let p = parse_ffmpeg_error("something odd", Some(42));
        assert_eq!(p.summary, "FFmpeg failed (exit code 42).");
        assert_eq!(p.detail, "something odd");
    }

    #[test]
    fn stderr_hint_beats_exit_code() {
        let p = parse_ffmpeg_error(
            "in.mp4: Invalid data found when processing input\n",
            Some(1),
        );
        assert_eq!(p.summary, "Input is not a readable video.");
    }

    #[test]
    fn no_code_uses_first_stderr_line() {
        let p = parse_ffmpeg_error("\nSome random error\nSecond line", None);
        assert_eq!(p.summary, "Some random error");
    }

    #[test]
    fn long_stderr_truncated_on_char_boundary() {
        let long = "é".repeat(100);
        let p = parse_ffmpeg_error(&long, None);
        assert!(p.summary.len() <= SUMMARY_MAX_LEN);
        assert!(p.summary.ends_with('…'));
    }

    #[test]
    fn describe_timeout_error() {
        let p = describe_error(&AppError::TimedOut { secs: 30 });
        assert_eq!(p.summary, "FFmpeg timed out after 30s");
    }
}
