//! Encoding status events published for observers.
//!
//! A job's history is an ordered list of [`StatusEvent`]s ending in exactly one
//! terminal status (`finished` or `error`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::JobId;

/// Stage of a job as seen by observers.
///
/// Serialized with a `status` tag, e.g. `{"status":"encoding","percent":42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EncodingStatus {
    /// No event published yet
    #[default]
    Initial,
    /// Source artifact is being downloaded
    Reading,
    /// Transcoding in progress (0-100)
    Encoding { percent: u8 },
    /// Encoded artifact is being uploaded
    Writing,
    /// Job completed successfully
    Finished,
    /// Job failed
    Error,
}

impl EncodingStatus {
    /// Encoding status for a progress fraction reported by the transcoder.
    ///
    /// The fraction is scaled and clamped into 0-100; ordering is not checked.
    pub fn encoding_fraction(fraction: f64) -> Self {
        let percent = if fraction.is_finite() {
            (fraction * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        EncodingStatus::Encoding { percent }
    }

    /// Get string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingStatus::Initial => "initial",
            EncodingStatus::Reading => "reading",
            EncodingStatus::Encoding { .. } => "encoding",
            EncodingStatus::Writing => "writing",
            EncodingStatus::Finished => "finished",
            EncodingStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more events expected).
    pub fn is_terminal(&self) -> bool {
        match self {
            EncodingStatus::Finished | EncodingStatus::Error => true,
            EncodingStatus::Initial
            | EncodingStatus::Reading
            | EncodingStatus::Encoding { .. }
            | EncodingStatus::Writing => false,
        }
    }
}

impl fmt::Display for EncodingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingStatus::Encoding { percent } => write!(f, "encoding({}%)", percent),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// One entry in a job's append-only lifecycle history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Job ID
    pub job_id: JobId,
    /// Stage and payload
    #[serde(flatten)]
    pub status: EncodingStatus,
    /// Emission time
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    /// Create an event stamped with the current time.
    pub fn new(job_id: JobId, status: EncodingStatus) -> Self {
        Self {
            job_id,
            status,
            at: Utc::now(),
        }
    }

    /// Check if the event is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tagging() {
        let json = serde_json::to_string(&EncodingStatus::Encoding { percent: 42 }).unwrap();
        assert_eq!(json, r#"{"status":"encoding","percent":42}"#);

        let json = serde_json::to_string(&EncodingStatus::Reading).unwrap();
        assert_eq!(json, r#"{"status":"reading"}"#);
    }

    #[test]
    fn test_event_flattens_status() {
        let event = StatusEvent::new(JobId::from("job-1"), EncodingStatus::Encoding { percent: 7 });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["job_id"], "job-1");
        assert_eq!(value["status"], "encoding");
        assert_eq!(value["percent"], 7);

        let back: StatusEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_fraction_conversion() {
        assert_eq!(
            EncodingStatus::encoding_fraction(0.256),
            EncodingStatus::Encoding { percent: 26 }
        );
        assert_eq!(
            EncodingStatus::encoding_fraction(1.7),
            EncodingStatus::Encoding { percent: 100 }
        );
        assert_eq!(
            EncodingStatus::encoding_fraction(-0.2),
            EncodingStatus::Encoding { percent: 0 }
        );
        assert_eq!(
            EncodingStatus::encoding_fraction(f64::NAN),
            EncodingStatus::Encoding { percent: 0 }
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(EncodingStatus::Finished.is_terminal());
        assert!(EncodingStatus::Error.is_terminal());
        assert!(!EncodingStatus::Initial.is_terminal());
        assert!(!EncodingStatus::Writing.is_terminal());
        assert!(!EncodingStatus::Encoding { percent: 100 }.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(EncodingStatus::Encoding { percent: 5 }.to_string(), "encoding(5%)");
        assert_eq!(EncodingStatus::Finished.to_string(), "finished");
    }
}
