//! Progress extraction from the engine's diagnostic stream.
//!
//! ffmpeg reports its position as `time=HH:MM:SS.CC`. The elapsed value is
//! divided by the probed duration to produce a percentage.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Denominator used when the source duration is unknown or non-positive.
pub const NOMINAL_DURATION_SECS: f64 = 1.0;

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("timestamp regex is valid")
    })
}

/// Parse the first `time=HH:MM:SS.CC` occurrence in `line` into seconds.
pub fn parse_timestamp(line: &str) -> Option<f64> {
    let caps = timestamp_regex().captures(line)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let centis = field(4)?;

    Some(
        f64::from(hours) * 3600.0
            + f64::from(minutes) * 60.0
            + f64::from(seconds)
            + f64::from(centis) / 100.0,
    )
}

/// A single progress observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSample {
    pub elapsed_seconds: f64,
    pub total_duration_seconds: f64,
    /// Not clamped: exceeds 100 when the probe undercounted the duration.
    pub percent: f64,
}

impl ProgressSample {
    /// Percent bounded to `0..=100` for display.
    pub fn clamped_percent(&self) -> f64 {
        self.percent.clamp(0.0, 100.0)
    }
}

/// Converts diagnostic lines into [`ProgressSample`]s for one job.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker {
    duration: f64,
}

impl ProgressTracker {
    /// Create a tracker for a source of `duration_secs` seconds.
    ///
    /// Values that are not finite and positive fall back to
    /// [`NOMINAL_DURATION_SECS`] so the percentage is always defined.
    pub fn new(duration_secs: f64) -> Self {
        let duration = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            NOMINAL_DURATION_SECS
        };
        Self { duration }
    }

    /// The denominator actually used.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Produce a sample if `line` carries a timestamp.
    pub fn observe(&self, line: &str) -> Option<ProgressSample> {
        let elapsed = parse_timestamp(line)?;
        Some(ProgressSample {
            elapsed_seconds: elapsed,
            total_duration_seconds: self.duration,
            percent: elapsed / self.duration * 100.0,
        })
    }
}
