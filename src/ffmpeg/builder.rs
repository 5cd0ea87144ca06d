//! FFmpeg argument construction for clip encodes and frame grabs.
//!
//! The encode profile is fixed for every clip: H.264 at a speed-leaning
//! preset, AAC audio at a constant bitrate, moov atom up front.

pub const VIDEO_CODEC: &str = "libx264";
pub const VIDEO_PRESET: &str = "fast";
pub const VIDEO_CRF: u32 = 28;
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "128k";
/// mjpeg qscale for thumbnails: 2 is near-lossless.
pub const THUMBNAIL_QSCALE: u32 = 2;

fn seconds_arg(seconds: f64) -> String {
    format!("{:.3}", seconds.max(0.0))
}

fn common_prefix() -> Vec<String> {
    vec![
        "-nostdin".to_string(),
        "-hide_banner".to_string(),
        "-v".to_string(),
        "error".to_string(),
        "-y".to_string(),
    ]
}

/// Scale into a `width`x`height` box keeping the source aspect ratio, then
/// pad with centered black bars to exactly that size.
pub fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1",
        w = width,
        h = height
    )
}

/// Encode `length` seconds of `input` starting at `start` through `video_filter`.
pub fn build_clip_args(
    input_path: &str,
    output_path: &str,
    start: f64,
    length: f64,
    video_filter: &str,
) -> Vec<String> {
    log::trace!(
        target: "clipforge::ffmpeg::builder",
        "Building clip command: start={:.3}, length={:.3}, filter={}, output={}",
        start,
        length,
        video_filter,
        output_path
    );
    let mut args = common_prefix();
    args.extend([
        "-ss".to_string(),
        seconds_arg(start),
        "-i".to_string(),
        input_path.to_string(),
        "-t".to_string(),
        seconds_arg(length),
        "-vf".to_string(),
        video_filter.to_string(),
        "-c:v".to_string(),
        VIDEO_CODEC.to_string(),
        "-preset".to_string(),
        VIDEO_PRESET.to_string(),
        "-crf".to_string(),
        VIDEO_CRF.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        AUDIO_CODEC.to_string(),
        "-b:a".to_string(),
        AUDIO_BITRATE.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output_path.to_string(),
    ]);
    args
}

/// Grab one frame at `offset` seconds into `input` as JPEG, optionally scaled.
pub fn build_thumbnail_args(
    input_path: &str,
    output_path: &str,
    offset: f64,
    scale: Option<(u32, u32)>,
) -> Vec<String> {
    let mut args = common_prefix();
    args.extend([
        "-ss".to_string(),
        seconds_arg(offset),
        "-i".to_string(),
        input_path.to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
    ]);
    if let Some((w, h)) = scale {
        args.extend(["-vf".to_string(), format!("scale={}:{}", w, h)]);
    }
    args.extend([
        "-q:v".to_string(),
        THUMBNAIL_QSCALE.to_string(),
        output_path.to_string(),
    ]);
    args
}

/// Formats args for readable display: option and value on the same line when the next arg is a value.
pub fn format_args_for_display_multiline(args: &[String]) -> String {
    let mut lines = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let line = if arg.starts_with('-') && i + 1 < args.len() && !args[i + 1].starts_with('-')
        {
            i += 2;
            format!("  {} {}", arg, args[i - 1])
        } else {
            i += 1;
            format!("  {}", arg)
        };
        lines.push(line);
    }
    lines.join("\n")
}
