//! Source duration lookup via the `ffprobe` CLI.
//!
//! Runs `ffprobe -v error -show_entries format=duration -of
//! default=noprint_wrappers=1:nokey=1 <input>` and expects a single number of
//! seconds on stdout.

use std::path::Path;

use crate::command::ToolCommand;
use crate::progress::NOMINAL_DURATION_SECS;
use crate::tools::{ToolRegistry, PROBE};

/// Probe the duration of `input` in seconds.
///
/// # Errors
///
/// - [`af_core::Error::EngineUnavailable`] if ffprobe is not installed.
/// - [`af_core::Error::EngineFailure`] if ffprobe fails to run.
/// - [`af_core::Error::Probe`] if the output is not a positive number.
pub async fn probe_duration(tools: &ToolRegistry, input: &Path) -> af_core::Result<f64> {
    let ffprobe = tools.require(PROBE)?;

    let output = ToolCommand::new(ffprobe.path.clone())
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input.to_string_lossy())
        .timeout(ffprobe.timeout)
        .execute()
        .await?;

    parse_duration(&output.stdout)
}

/// Parse ffprobe's bare duration output.
pub fn parse_duration(stdout: &str) -> af_core::Result<f64> {
    let raw = stdout.trim();
    let secs: f64 = raw
        .parse()
        .map_err(|_| af_core::Error::Probe(format!("unexpected duration output '{raw}'")))?;

    if !secs.is_finite() || secs <= 0.0 {
        return Err(af_core::Error::Probe(format!("unusable duration {secs}")));
    }

    Ok(secs)
}

/// Best-effort duration: any probe failure is logged and replaced by the
/// nominal one-second duration.
pub async fn duration_or_nominal(tools: &ToolRegistry, input: &Path) -> f64 {
    match probe_duration(tools, input).await {
        Ok(secs) => {
            tracing::debug!("Probed duration of {}: {secs:.2}s", input.display());
            secs
        }
        Err(e) => {
            tracing::warn!(
                "Duration probe failed for {}; progress will be approximate: {e}",
                input.display()
            );
            NOMINAL_DURATION_SECS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_duration("10.000000\n").unwrap(), 10.0);
        assert_eq!(parse_duration("  3.5 ").unwrap(), 3.5);
    }

    #[test]
    fn rejects_na_and_empty() {
        assert!(matches!(parse_duration("N/A"), Err(af_core::Error::Probe(_))));
        assert!(matches!(parse_duration(""), Err(af_core::Error::Probe(_))));
    }

    #[test]
    fn rejects_non_positive() {
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("-1.0").is_err());
    }

    #[tokio::test]
    async fn missing_probe_falls_back_to_nominal() {
        let tools = ToolRegistry::default();
        let secs = duration_or_nominal(&tools, Path::new("/nonexistent.wav")).await;
        assert_eq!(secs, NOMINAL_DURATION_SECS);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_reads_script_output() {
        let dir = tempfile::tempdir().unwrap();
        let tools = crate::test_fixtures::registry(dir.path(), "echo 10.000000", "echo 12.5");
        let secs = probe_duration(&tools, Path::new("in.wav")).await.unwrap();
        assert_eq!(secs, 12.5);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_probe_falls_back_to_nominal() {
        let dir = tempfile::tempdir().unwrap();
        let tools = crate::test_fixtures::registry(dir.path(), "exit 0", "exit 1");
        let secs = duration_or_nominal(&tools, Path::new("in.wav")).await;
        assert_eq!(secs, NOMINAL_DURATION_SECS);
    }
}
