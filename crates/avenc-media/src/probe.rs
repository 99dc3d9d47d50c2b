//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds, when the container reports one
    pub duration: Option<f64>,
    /// Container format name (e.g., "ogg")
    pub format_name: Option<String>,
    /// Codec of the first audio stream
    pub audio_codec: Option<String>,
    /// Bitrate in bits/second
    pub bitrate: Option<u64>,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
}

impl MediaInfo {
    /// Parse `ffprobe -print_format json -show_format -show_streams` output.
    pub fn from_ffprobe_json(raw: &[u8]) -> MediaResult<Self> {
        let probe: FfprobeOutput = serde_json::from_slice(raw)?;

        let audio_codec = probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))
            .and_then(|s| s.codec_name.clone());

        Ok(Self {
            duration: probe
                .format
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0),
            format_name: probe.format.format_name,
            audio_codec,
            bitrate: probe.format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
        })
    }
}

/// Probe a media file with the given ffprobe binary.
pub async fn probe_media(ffprobe: &Path, path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FfprobeNotFound(ffprobe.display().to_string()),
            _ => MediaError::Io(e),
        })?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    MediaInfo::from_ffprobe_json(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffprobe_output() {
        let raw = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "theora"},
                {"codec_type": "audio", "codec_name": "vorbis"}
            ],
            "format": {"format_name": "ogg", "duration": "12.500000", "bit_rate": "160000"}
        }"#;

        let info = MediaInfo::from_ffprobe_json(raw).unwrap();
        assert_eq!(info.duration, Some(12.5));
        assert_eq!(info.format_name.as_deref(), Some("ogg"));
        assert_eq!(info.audio_codec.as_deref(), Some("vorbis"));
        assert_eq!(info.bitrate, Some(160_000));
    }

    #[test]
    fn test_missing_duration() {
        let raw = br#"{"format": {"format_name": "wav", "duration": "N/A"}}"#;
        let info = MediaInfo::from_ffprobe_json(raw).unwrap();
        assert_eq!(info.duration, None);
        assert_eq!(info.audio_codec, None);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_media(Path::new("ffprobe"), "/nonexistent/file.ogg")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
