//! # af-av
//!
//! Conversion core for audioforge: external tool management, the ffmpeg
//! conversion itself, progress parsing, and temporary file lifecycle.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   cancellation, and line-by-line stderr streaming.
//! - **Duration probing** ([`probe`]) -- best-effort source duration.
//! - **Progress parsing** ([`progress`]) -- `time=` stats to percentages.
//! - **Conversion** ([`convert()`], [`ConversionTask`]) -- run one job inline
//!   or on a dedicated task with a progress channel.
//! - **Workspace management** ([`Workspace`]) -- collision-free temp paths
//!   and deferred cleanup.

pub mod command;
pub mod convert;
pub mod probe;
pub mod progress;
pub mod task;
pub mod tools;
pub mod workspace;

#[cfg(any(test, feature = "test-util"))]
pub mod test_fixtures;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use convert::{convert, try_convert, ConversionJob, ConversionResult};
pub use progress::{ProgressSample, ProgressTracker};
pub use task::ConversionTask;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::{schedule_cleanup, CleanupHandle, CleanupOutcome, FileLease, Workspace};
