//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Output time in microseconds
    pub out_time_us: i64,
    /// Output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Output size so far in bytes
    pub total_size: u64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of the input processed, in `[0, 1]`.
    ///
    /// Without a known duration only completion can be reported.
    pub fn fraction(&self, total_duration_secs: Option<f64>) -> Option<f64> {
        if self.is_complete {
            return Some(1.0);
        }
        let total_us = total_duration_secs.filter(|d| *d > 0.0)? * 1_000_000.0;
        Some((self.out_time_us.max(0) as f64 / total_us).clamp(0.0, 1.0))
    }
}

/// Parse a line of `-progress` output into `current`.
///
/// Returns a snapshot at the end of each progress block.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        // ffmpeg reports out_time_ms in microseconds too
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_us = us;
            }
        }
        "out_time" => {
            current.out_time = value.to_string();
        }
        "total_size" => {
            if let Ok(size) = value.parse() {
                current.total_size = size;
            }
        }
        "speed" => {
            // Format: "1.5x" or "N/A"
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            // "continue" or "end"
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Whether a stderr line belongs to the `-progress` key/value output.
pub(crate) fn is_progress_line(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "bitrate",
        "total_size",
        "out_time_us",
        "out_time_ms",
        "out_time",
        "dup_frames",
        "drop_frames",
        "speed",
        "progress",
        "frame",
        "fps",
    ];
    line.split_once('=')
        .is_some_and(|(key, _)| KEYS.contains(&key.trim()) || key.starts_with("stream_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_with_duration() {
        let progress = FfmpegProgress {
            out_time_us: 5_000_000,
            ..Default::default()
        };

        assert!((progress.fraction(Some(10.0)).unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(progress.fraction(Some(2.0)), Some(1.0));
        assert_eq!(progress.fraction(None), None);
        assert_eq!(progress.fraction(Some(0.0)), None);
    }

    #[test]
    fn test_fraction_complete_without_duration() {
        let progress = FfmpegProgress {
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(progress.fraction(None), Some(1.0));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(parse_progress_line("out_time_us=5000000", &mut progress).is_none());
        assert_eq!(progress.out_time_us, 5_000_000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        parse_progress_line("speed=N/A", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert!(!snapshot.is_complete);

        let result = parse_progress_line("progress=end", &mut progress);
        assert!(result.is_some());
        assert!(progress.is_complete);
    }

    #[test]
    fn test_is_progress_line() {
        assert!(is_progress_line("out_time=00:00:01.000000"));
        assert!(is_progress_line("progress=end"));
        assert!(!is_progress_line("Error opening input file in.ogg."));
        assert!(!is_progress_line("in.ogg: Invalid data found when processing input"));
    }
}
