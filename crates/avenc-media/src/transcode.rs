//! Transcoding seam.
//!
//! The pipeline only sees [`Transcoder`]; [`FfmpegTranscoder`] is the
//! production implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use avenc_models::EncodingParams;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_media;

/// Progress sink receiving fractions in `[0, 1]`.
pub type ProgressFn = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// One transcode invocation.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: EncodingParams,
}

impl TranscodeRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, params: EncodingParams) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            params,
        }
    }
}

/// Opaque encoder: input file in, output file out, progress along the way.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, request: &TranscodeRequest, progress: ProgressFn) -> MediaResult<()>;
}

/// FFmpeg-backed transcoder.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
    ffprobe: Option<PathBuf>,
}

impl FfmpegTranscoder {
    /// Create with explicit binaries. Without ffprobe, progress is only
    /// reported on completion.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: Option<PathBuf>) -> Self {
        Self {
            runner: FfmpegRunner::new(ffmpeg),
            ffprobe,
        }
    }

    /// Use the configured paths, falling back to `PATH` lookup.
    pub fn locate(ffmpeg: Option<PathBuf>, ffprobe: Option<PathBuf>) -> MediaResult<Self> {
        let ffmpeg = match ffmpeg {
            Some(path) => path,
            None => check_ffmpeg()?,
        };
        let ffprobe = ffprobe.or_else(|| check_ffprobe().ok());
        if ffprobe.is_none() {
            warn!("ffprobe not found, encoding progress limited to completion");
        }
        Ok(Self::new(ffmpeg, ffprobe))
    }

    pub fn ffmpeg(&self) -> &Path {
        self.runner.binary()
    }

    pub fn ffprobe(&self) -> Option<&Path> {
        self.ffprobe.as_deref()
    }

    /// Build the ffmpeg invocation for a request.
    ///
    /// Formats without a known codec are left to ffmpeg to pick from the
    /// output extension.
    pub fn build_command(request: &TranscodeRequest) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&request.input, &request.output).no_video();
        if let Some(codec) = request.params.audio_codec() {
            cmd = cmd.audio_codec(codec);
        }
        if let Some(bitrate) = request.params.bitrate_arg() {
            cmd = cmd.audio_bitrate(bitrate);
        }
        cmd
    }

    async fn input_duration(&self, input: &Path) -> Option<f64> {
        let ffprobe = self.ffprobe.as_deref()?;
        match probe_media(ffprobe, input).await {
            Ok(info) => info.duration,
            Err(e) => {
                warn!("Failed to probe {}: {}", input.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, request: &TranscodeRequest, progress: ProgressFn) -> MediaResult<()> {
        let cmd = Self::build_command(request);
        let duration = self.input_duration(&request.input).await;
        debug!(?duration, "Input duration");

        self.runner
            .run_with_progress(&cmd, move |p| {
                if let Some(fraction) = p.fraction(duration) {
                    progress(fraction);
                }
            })
            .await?;

        info!(
            "Transcoded {} -> {}",
            request.input.display(),
            request.output.display()
        );
        Ok(())
    }
}
