//! FFmpeg-backed implementations of the media collaborator traits.
//!
//! Everything here sits behind the trait seams in mediaq-pipeline; the
//! pipeline never sees ffmpeg/ffprobe directly.

pub mod command;
pub mod error;
pub mod probe;
pub mod thumbnail;
pub mod transcode;

pub use error::{MediaError, MediaResult};
pub use probe::FfprobeAnalyzer;
pub use thumbnail::FfmpegThumbnailer;
pub use transcode::FfmpegTransformer;
