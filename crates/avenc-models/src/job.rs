//! Job definitions for queue processing.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;

use crate::encoding::EncodingParams;
use crate::error::{ModelError, ModelResult};

/// Longest accepted format token (`sourceFormatHint` / `outputFormat`).
const MAX_FORMAT_TOKEN_LEN: usize = 16;

/// Unique identifier for a job.
///
/// Two descriptors with the same identifier are the same logical job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Immutable description of one encoding request.
///
/// Field names follow the producer wire shape
/// `{id, sourceUrl, sourceFormatHint, destinationUrl, outputFormat, bitrate}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    /// Unique job ID
    pub id: JobId,
    /// Pre-signed URL the source artifact is fetched from (HTTP GET)
    pub source_url: String,
    /// Source container extension; the transcoder cannot always sniff it
    pub source_format_hint: String,
    /// Pre-signed URL the encoded artifact is uploaded to (HTTP PUT)
    pub destination_url: String,
    /// Output format (e.g. "mp3")
    pub output_format: String,
    /// Optional bitrate in kbit/s
    #[serde(default)]
    pub bitrate: Option<u32>,
}

impl JobDescriptor {
    /// Create a descriptor with a freshly generated ID.
    pub fn new(
        source_url: impl Into<String>,
        source_format_hint: impl Into<String>,
        destination_url: impl Into<String>,
        output_format: impl Into<String>,
    ) -> Self {
        Self {
            id: JobId::new(),
            source_url: source_url.into(),
            source_format_hint: source_format_hint.into(),
            destination_url: destination_url.into(),
            output_format: output_format.into(),
            bitrate: None,
        }
    }

    /// Use a caller-supplied ID.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the output bitrate (kbit/s).
    pub fn with_bitrate(mut self, bitrate: Option<u32>) -> Self {
        self.bitrate = bitrate;
        self
    }

    /// Encoding parameters handed to the transcoder.
    pub fn encoding_params(&self) -> EncodingParams {
        EncodingParams::new(&self.output_format).with_bitrate(self.bitrate)
    }

    /// Check the descriptor before it is accepted into a queue.
    ///
    /// The format tokens end up as local file suffixes, so they are limited to
    /// short alphanumeric strings.
    pub fn validate(&self) -> ModelResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(ModelError::invalid_job("id must not be empty"));
        }
        validate_transfer_url("sourceUrl", &self.source_url)?;
        validate_transfer_url("destinationUrl", &self.destination_url)?;
        validate_format_token("sourceFormatHint", &self.source_format_hint)?;
        validate_format_token("outputFormat", &self.output_format)?;
        if self.bitrate == Some(0) {
            return Err(ModelError::invalid_job("bitrate must be positive"));
        }
        Ok(())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn validate_transfer_url(field: &str, raw: &str) -> ModelResult<()> {
    let url = Url::parse(raw)
        .map_err(|e| ModelError::invalid_job(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ModelError::invalid_job(format!(
            "{} has unsupported scheme '{}'",
            field, other
        ))),
    }
}

fn validate_format_token(field: &str, token: &str) -> ModelResult<()> {
    let valid = !token.is_empty()
        && token.len() <= MAX_FORMAT_TOKEN_LEN
        && token.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ModelError::invalid_job(format!(
            "{} must be 1-{} ASCII alphanumeric characters, got '{}'",
            field, MAX_FORMAT_TOKEN_LEN, token
        )))
    }
}
