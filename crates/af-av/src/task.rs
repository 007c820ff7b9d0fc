//! Conversion running on a dedicated tokio task.
//!
//! The task owns the engine process. Progress flows to the owner over an
//! unbounded channel; cancelling kills the subprocess and closes the channel.

use std::sync::Arc;

use af_core::JobId;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::convert::{try_convert, ConversionJob, ConversionResult};
use crate::progress::ProgressSample;
use crate::tools::ToolRegistry;

/// Handle to a conversion running in the background.
pub struct ConversionTask {
    id: JobId,
    progress: mpsc::UnboundedReceiver<ProgressSample>,
    cancel: CancellationToken,
    handle: JoinHandle<ConversionResult>,
}

impl ConversionTask {
    /// Spawn on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; use
    /// [`spawn_on`](Self::spawn_on) from other threads.
    pub fn spawn(tools: Arc<ToolRegistry>, job: ConversionJob) -> Self {
        Self::spawn_on(&Handle::current(), tools, job)
    }

    /// Spawn on the given runtime.
    pub fn spawn_on(runtime: &Handle, tools: Arc<ToolRegistry>, job: ConversionJob) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let id = job.id;

        let task_cancel = cancel.clone();
        let handle = runtime.spawn(async move {
            let result = try_convert(
                &tools,
                &job,
                |sample| {
                    // The receiver may already be gone; progress is advisory.
                    let _ = tx.send(sample);
                },
                Some(task_cancel),
            )
            .await;
            ConversionResult::from(result)
        });

        Self {
            id,
            progress: rx,
            cancel,
            handle,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Kill the engine process and stop delivering progress.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.progress.close();
    }

    /// A token that cancels this task when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the next progress sample. `None` once the task has finished
    /// or was cancelled.
    pub async fn next_progress(&mut self) -> Option<ProgressSample> {
        self.progress.recv().await
    }

    /// Take a queued progress sample without waiting.
    pub fn try_progress(&mut self) -> Option<ProgressSample> {
        self.progress.try_recv().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the conversion to end.
    pub async fn wait(self) -> ConversionResult {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => ConversionResult::Failure {
                reason: format!("conversion task aborted: {e}"),
            },
        }
    }
}
