//! What the converter window shows.

use std::path::{Path, PathBuf};

use af_core::AudioFormat;

/// Status line shown before anything happens.
pub const STATUS_READY: &str = "Ready";
/// Status line while the engine is being started.
pub const STATUS_PREPARING: &str = "Preparing conversion...";
/// Status line after a successful conversion.
pub const STATUS_SUCCESS: &str = "Conversion Successful!";
/// Status line after a failed conversion.
pub const STATUS_FAILED: &str = "Error during conversion.";
/// Status line after the user stopped a conversion.
pub const STATUS_CANCELLED: &str = "Conversion cancelled.";

/// Observable state of the converter window.
///
/// A toolkit binds its widgets to these fields: `progress` drives the bar
/// (0-100), `status` the status line, and `converting` disables the convert
/// button.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub input: Option<PathBuf>,
    pub format: AudioFormat,
    pub status: String,
    pub progress: f64,
    pub converting: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            input: None,
            format: AudioFormat::default(),
            status: STATUS_READY.to_string(),
            progress: 0.0,
            converting: false,
        }
    }
}

impl AppState {
    /// Whether the convert action should be enabled.
    pub fn can_start(&self) -> bool {
        self.input.is_some() && !self.converting
    }

    /// File name of the selected input, for display.
    pub fn input_name(&self) -> Option<String> {
        self.input.as_deref().map(display_name)
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Receives state changes on the UI thread.
///
/// Every method has a no-op default so a front-end only implements what it
/// renders.
pub trait StateObserver {
    /// Called after any field of [`AppState`] changed.
    fn state_changed(&mut self, _state: &AppState) {}

    /// Called once when a conversion finished; a GUI shows the save path in
    /// a confirmation dialog.
    fn conversion_succeeded(&mut self, _output: &Path) {}

    /// Called once when a conversion failed, only when failure dialogs are
    /// enabled.
    fn conversion_failed(&mut self, _reason: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl StateObserver for NullObserver {}
