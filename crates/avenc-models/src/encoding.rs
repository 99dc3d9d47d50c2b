//! Encoding parameters passed to the transcoder.

use serde::{Deserialize, Serialize};

/// Parameters the transcoder is invoked with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingParams {
    /// Output container/format extension (e.g. "mp3")
    pub format: String,
    /// Bitrate in kbit/s
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
}

impl EncodingParams {
    /// Create parameters for an output format.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into().to_ascii_lowercase(),
            bitrate_kbps: None,
        }
    }

    /// Set the bitrate.
    pub fn with_bitrate(mut self, bitrate_kbps: Option<u32>) -> Self {
        self.bitrate_kbps = bitrate_kbps;
        self
    }

    /// Audio codec for the output format, if one is known.
    ///
    /// Unknown formats return `None` and the transcoder picks its own default
    /// from the output file extension.
    pub fn audio_codec(&self) -> Option<&'static str> {
        match self.format.as_str() {
            "mp3" => Some("libmp3lame"),
            "aac" | "m4a" => Some("aac"),
            "ogg" | "oga" => Some("libvorbis"),
            "opus" => Some("libopus"),
            "flac" => Some("flac"),
            "wav" => Some("pcm_s16le"),
            _ => None,
        }
    }

    /// Whether the format is lossless (bitrate is meaningless).
    pub fn is_lossless(&self) -> bool {
        matches!(self.format.as_str(), "flac" | "wav")
    }

    /// Bitrate argument in the transcoder's notation, e.g. "128k".
    pub fn bitrate_arg(&self) -> Option<String> {
        if self.is_lossless() {
            return None;
        }
        self.bitrate_kbps.map(|kbps| format!("{}k", kbps))
    }

    /// File name of the encoded artifact inside a working area.
    pub fn output_file_name(&self) -> String {
        format!("output.{}", self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_mapping() {
        assert_eq!(EncodingParams::new("mp3").audio_codec(), Some("libmp3lame"));
        assert_eq!(EncodingParams::new("MP3").audio_codec(), Some("libmp3lame"));
        assert_eq!(EncodingParams::new("opus").audio_codec(), Some("libopus"));
        assert_eq!(EncodingParams::new("mkv").audio_codec(), None);
    }

    #[test]
    fn test_bitrate_arg() {
        let params = EncodingParams::new("mp3").with_bitrate(Some(128));
        assert_eq!(params.bitrate_arg().as_deref(), Some("128k"));

        let lossless = EncodingParams::new("flac").with_bitrate(Some(128));
        assert_eq!(lossless.bitrate_arg(), None);

        assert_eq!(EncodingParams::new("mp3").bitrate_arg(), None);
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(EncodingParams::new("mp3").output_file_name(), "output.mp3");
    }
}
