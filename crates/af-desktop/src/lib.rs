//! af-desktop: toolkit-neutral core of the desktop converter.
//!
//! A GUI binds its widgets to [`AppState`], forwards user actions to
//! [`ConverterController`], and calls [`ConverterController::pump`] from its
//! event loop so progress is applied on the UI thread. Conversions run on a
//! tokio runtime, never on the caller's thread.

pub mod controller;
pub mod dialogs;
pub mod state;

pub use controller::{ConverterController, FailureNotice};
pub use dialogs::{open_filter, save_filter, FileFilter, SaveDialog};
pub use state::{AppState, NullObserver, StateObserver};
