//! FFmpeg CLI wrapper for audio transcoding.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Duration probing via ffprobe
//! - The [`Transcoder`] seam used by the encoding pipeline

pub mod command;
pub mod error;
pub mod probe;
pub mod progress;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use transcode::{FfmpegTranscoder, ProgressFn, TranscodeRequest, Transcoder};
