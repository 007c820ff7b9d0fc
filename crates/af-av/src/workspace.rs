//! Temporary file lifecycle for conversion inputs and outputs.
//!
//! A [`Workspace`] is a directory of path-addressed, non-overlapping files.
//! Every allocated name starts with a fresh random token, so concurrent jobs
//! never share a path and no locking is needed.
//!
//! Files are removed after a grace period, either on a timer
//! ([`schedule_cleanup`]) or when the last reader lets go of a
//! [`FileLease`]. Removal failures are logged and never reach the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use af_core::FileToken;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Directory holding uploaded inputs and converted outputs.
///
/// # Example
///
/// ```no_run
/// use af_av::Workspace;
/// use std::time::Duration;
///
/// # async fn example() -> af_core::Result<()> {
/// let workspace = Workspace::open("uploads")?;
/// let input = workspace.allocate_path("song.wav", "");
/// // ... write the upload to `input`, convert it ...
/// workspace.schedule_cleanup(&input, Duration::from_secs(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Open (and create if needed) the workspace directory.
    pub fn open(dir: impl Into<PathBuf>) -> af_core::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path to the workspace directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocate a collision-free path `<dir>/<token><suffix>`.
    ///
    /// An empty `suffix` falls back to the extension of `original_name`.
    /// Characters outside `[A-Za-z0-9.]` are dropped from the suffix.
    pub fn allocate_path(&self, original_name: &str, suffix: &str) -> PathBuf {
        let suffix = if suffix.is_empty() {
            Path::new(original_name)
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default()
        } else {
            suffix.to_string()
        };

        self.dir
            .join(format!("{}{}", FileToken::new(), sanitize_suffix(&suffix)))
    }

    /// Delete `path` after `delay`. See [`schedule_cleanup`].
    pub fn schedule_cleanup(&self, path: &Path, delay: Duration) -> CleanupHandle {
        schedule_cleanup(path.to_path_buf(), delay)
    }

    /// Hand out `path` to a reader; cleanup starts `grace` after the lease is
    /// dropped.
    pub fn lease(&self, path: &Path, grace: Duration) -> FileLease {
        FileLease {
            path: path.to_path_buf(),
            grace,
            armed: true,
        }
    }

    /// Remove `path` right away, ignoring a missing file.
    pub fn discard(&self, path: &Path) -> CleanupOutcome {
        remove_now(path)
    }
}

fn sanitize_suffix(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('.') {
        cleaned
    } else {
        format!(".{cleaned}")
    }
}

/// Terminal state of a managed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The file was removed.
    Deleted,
    /// Nothing was there to remove.
    AlreadyGone,
    /// Removal failed; the file is left on disk.
    Failed,
    /// The pending removal was cancelled by its owner.
    Cancelled,
}

fn remove_now(path: &Path) -> CleanupOutcome {
    removal_outcome(path, std::fs::remove_file(path))
}

async fn remove_async(path: &Path) -> CleanupOutcome {
    removal_outcome(path, tokio::fs::remove_file(path).await)
}

fn removal_outcome(path: &Path, result: std::io::Result<()>) -> CleanupOutcome {
    match result {
        Ok(()) => {
            tracing::debug!("Cleaned up {}", path.display());
            CleanupOutcome::Deleted
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CleanupOutcome::AlreadyGone,
        Err(source) => {
            let err = af_core::Error::Cleanup {
                path: path.to_path_buf(),
                source,
            };
            tracing::warn!("{err}");
            CleanupOutcome::Failed
        }
    }
}

/// Delete the file at `path` once `delay` has elapsed.
///
/// Fire-and-forget: dropping the returned handle does not cancel the removal.
/// Runs on the current tokio runtime when there is one, otherwise on a
/// short-lived thread.
pub fn schedule_cleanup(path: PathBuf, delay: Duration) -> CleanupHandle {
    let cancel = CancellationToken::new();
    let (tx, rx) = oneshot::channel();

    let task_cancel = cancel.clone();
    let task_path = path.clone();
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                let outcome = tokio::select! {
                    _ = tokio::time::sleep(delay) => remove_async(&task_path).await,
                    _ = task_cancel.cancelled() => CleanupOutcome::Cancelled,
                };
                let _ = tx.send(outcome);
            });
        }
        Err(_) => {
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                let outcome = if task_cancel.is_cancelled() {
                    CleanupOutcome::Cancelled
                } else {
                    remove_now(&task_path)
                };
                let _ = tx.send(outcome);
            });
        }
    }

    CleanupHandle {
        path,
        cancel,
        done: rx,
    }
}

/// Owner's view of a scheduled removal.
#[derive(Debug)]
pub struct CleanupHandle {
    path: PathBuf,
    cancel: CancellationToken,
    done: oneshot::Receiver<CleanupOutcome>,
}

impl CleanupHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file. Has no effect once removal has happened.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the scheduled removal to reach its terminal state.
    pub async fn finished(self) -> CleanupOutcome {
        self.done.await.unwrap_or(CleanupOutcome::Cancelled)
    }
}

/// A reader's claim on a managed file.
///
/// Dropping the lease (a response body fully sent or abandoned, a save
/// finished) schedules removal after the grace period.
#[derive(Debug)]
pub struct FileLease {
    path: PathBuf,
    grace: Duration,
    armed: bool,
}

impl FileLease {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now and get a handle on the scheduled removal.
    pub fn release(mut self) -> CleanupHandle {
        self.armed = false;
        schedule_cleanup(self.path.clone(), self.grace)
    }

    /// Give up management of the file; it will not be removed.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        if self.armed {
            schedule_cleanup(std::mem::take(&mut self.path), self.grace);
        }
    }
}
