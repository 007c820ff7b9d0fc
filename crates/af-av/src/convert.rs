//! Audio conversion through the external engine.
//!
//! A conversion probes the source duration (best effort), then runs
//! `ffmpeg -i <input> -y <output>` while turning the engine's `time=` stats
//! into [`ProgressSample`]s.

use std::path::{Path, PathBuf};
use std::time::Duration;

use af_core::{AudioFormat, JobId};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::probe::duration_or_nominal;
use crate::progress::{ProgressSample, ProgressTracker};
use crate::tools::{ToolRegistry, ENGINE};

/// Default upper bound on a single engine run: 1 hour.
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(3600);

/// One conversion request.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub source: PathBuf,
    pub format: AudioFormat,
    /// Destination; an existing file here is overwritten.
    pub output: PathBuf,
    pub timeout: Duration,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, format: AudioFormat, output: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            source: source.into(),
            format,
            output: output.into(),
            timeout: DEFAULT_CONVERSION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Outcome of a conversion, produced exactly once per job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConversionResult {
    Success { output_path: PathBuf },
    Failure { reason: String },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Success { output_path } => Some(output_path),
            Self::Failure { .. } => None,
        }
    }
}

impl From<af_core::Result<PathBuf>> for ConversionResult {
    fn from(result: af_core::Result<PathBuf>) -> Self {
        match result {
            Ok(output_path) => Self::Success { output_path },
            Err(e) => Self::Failure {
                reason: e.to_string(),
            },
        }
    }
}

/// Run a conversion and report the outcome as a [`ConversionResult`].
///
/// Never panics or returns an error; every failure becomes
/// [`ConversionResult::Failure`].
pub async fn convert(
    tools: &ToolRegistry,
    job: &ConversionJob,
    on_progress: impl FnMut(ProgressSample),
) -> ConversionResult {
    try_convert(tools, job, on_progress, None).await.into()
}

/// Run a conversion, returning the output path or a typed error.
///
/// The source must exist and ffmpeg must be available; both are checked
/// before any process is spawned. A probe failure only degrades progress
/// reporting.
///
/// # Errors
///
/// - [`af_core::Error::InputMissing`] if the source does not exist.
/// - [`af_core::Error::EngineUnavailable`] if ffmpeg cannot be found.
/// - [`af_core::Error::EngineFailure`] if ffmpeg fails, times out, or exits
///   non-zero.
/// - [`af_core::Error::Cancelled`] if `cancel` fires first.
pub async fn try_convert(
    tools: &ToolRegistry,
    job: &ConversionJob,
    mut on_progress: impl FnMut(ProgressSample),
    cancel: Option<CancellationToken>,
) -> af_core::Result<PathBuf> {
    if !job.source.is_file() {
        return Err(af_core::Error::InputMissing(format!(
            "source file not found: {}",
            job.source.display()
        )));
    }

    let ffmpeg = tools.require(ENGINE)?;
    let tracker = ProgressTracker::new(duration_or_nominal(tools, &job.source).await);

    tracing::info!(
        job_id = %job.id,
        format = %job.format,
        "Converting {:?} -> {:?}",
        job.source,
        job.output,
    );

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.timeout(job.timeout);
    cmd.arg("-i");
    cmd.arg(job.source.to_string_lossy());
    cmd.arg("-y");
    cmd.arg(job.output.to_string_lossy());

    let result = cmd
        .execute_with_stderr_callback(
            |line| {
                tracing::trace!(job_id = %job.id, "ffmpeg: {line}");
                if let Some(sample) = tracker.observe(line) {
                    on_progress(sample);
                }
            },
            cancel,
        )
        .await;

    match result {
        Ok(()) => {
            tracing::info!(job_id = %job.id, "Conversion finished: {:?}", job.output);
            Ok(job.output.clone())
        }
        Err(e) => {
            tracing::warn!(job_id = %job.id, "Conversion failed: {e}");
            Err(e)
        }
    }
}
