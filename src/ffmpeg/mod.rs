mod builder;
pub mod discovery;
mod error;
pub mod ffprobe;
mod runner;

pub use builder::{
    AUDIO_BITRATE, VIDEO_CODEC, VIDEO_CRF, VIDEO_PRESET, build_clip_args, build_thumbnail_args,
    format_args_for_display_multiline, scale_pad_filter,
};
pub use discovery::FfmpegLocator;
pub use error::{FfmpegErrorPayload, describe_error, parse_ffmpeg_error};
pub use runner::{CancelFlag, ToolLimits, ToolOutput, run_ffmpeg_blocking, run_tool};

/// Path to string for FFmpeg args or logging.
pub fn path_to_string(path: &(impl AsRef<std::path::Path> + ?Sized)) -> String {
    path.as_ref().to_string_lossy().to_string()
}
