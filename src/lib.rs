pub mod captions;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod project;
pub mod sidecar_api;
pub mod thumbnail;
pub mod transcode;

pub use catalog::ClipCatalogEntry;
pub use error::AppError;
pub use pipeline::{ClipPipeline, PipelineStage};
pub use plan::{ClipId, ClipKind, PlannedClip};
pub use probe::{MediaProbe, SourceMedia};
pub use transcode::{EncodedClip, TranscodeExecutor};
