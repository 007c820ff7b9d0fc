//! Conversion controller for a single-window converter.
//!
//! The controller lives on the UI thread. [`start`](ConverterController::start)
//! hands the job to a [`ConversionTask`] on a tokio runtime; a forwarder task
//! relays progress and the final result over a std channel, and the UI loop
//! applies them by calling [`pump`](ConverterController::pump) (from an idle
//! or timer callback). Nothing here blocks unless the caller asks to wait.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use af_av::convert::DEFAULT_CONVERSION_TIMEOUT;
use af_av::tools::ENGINE;
use af_av::{ConversionJob, ConversionResult, ConversionTask, ProgressSample, ToolRegistry};
use af_core::{AudioFormat, JobId};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::state::{
    display_name, AppState, StateObserver, STATUS_CANCELLED, STATUS_FAILED, STATUS_PREPARING,
    STATUS_SUCCESS,
};

/// How a failed conversion is surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureNotice {
    /// Only the status line changes.
    #[default]
    StatusOnly,
    /// Also call [`StateObserver::conversion_failed`] so the UI can show a
    /// dialog.
    Dialog,
}

/// Messages from the background worker to the UI thread.
#[derive(Debug)]
enum WorkerEvent {
    Progress(ProgressSample),
    Finished {
        job: JobId,
        result: ConversionResult,
    },
}

struct ActiveJob {
    id: JobId,
    output: PathBuf,
    cancel: CancellationToken,
}

/// Drives one conversion at a time and keeps [`AppState`] current.
pub struct ConverterController {
    runtime: Handle,
    tools: Arc<ToolRegistry>,
    state: AppState,
    observer: Box<dyn StateObserver>,
    notice: FailureNotice,
    timeout: Duration,
    events_tx: mpsc::Sender<WorkerEvent>,
    events_rx: mpsc::Receiver<WorkerEvent>,
    active: Option<ActiveJob>,
}

impl ConverterController {
    /// Create a controller whose conversions run on `runtime`.
    pub fn new(
        runtime: Handle,
        tools: Arc<ToolRegistry>,
        observer: Box<dyn StateObserver>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            runtime,
            tools,
            state: AppState::default(),
            observer,
            notice: FailureNotice::default(),
            timeout: DEFAULT_CONVERSION_TIMEOUT,
            events_tx,
            events_rx,
            active: None,
        }
    }

    pub fn with_failure_notice(mut self, notice: FailureNotice) -> Self {
        self.notice = notice;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The user picked an input file.
    pub fn select_input(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.state.status = format!("File selected: {}", display_name(&path));
        self.state.input = Some(path);
        self.state.progress = 0.0;
        self.notify();
    }

    /// The user picked a target format.
    pub fn set_format(&mut self, format: AudioFormat) {
        if self.state.format != format {
            self.state.format = format;
            self.notify();
        }
    }

    /// Initial file name for the save dialog: `<input stem>.<format>`.
    pub fn suggested_save_name(&self) -> Option<String> {
        let input = self.state.input.as_deref()?;
        let stem = input.file_stem()?.to_string_lossy();
        Some(format!("{stem}.{}", self.state.format.extension()))
    }

    /// Start converting the selected input to `save_path`.
    ///
    /// # Errors
    ///
    /// - [`af_core::Error::InputMissing`] when no input is selected.
    /// - [`af_core::Error::Validation`] while another conversion runs.
    /// - [`af_core::Error::EngineUnavailable`] when ffmpeg cannot be found.
    ///
    /// Nothing is started and the state is untouched on error.
    pub fn start(&mut self, save_path: impl Into<PathBuf>) -> af_core::Result<JobId> {
        let input = self
            .state
            .input
            .clone()
            .ok_or_else(|| af_core::Error::InputMissing("Please select an input file first.".into()))?;
        if self.state.converting {
            return Err(af_core::Error::Validation(
                "a conversion is already in progress".into(),
            ));
        }
        self.tools.require(ENGINE)?;

        let output = save_path.into();
        let job = ConversionJob::new(input, self.state.format.clone(), &output)
            .with_timeout(self.timeout);
        let id = job.id;

        self.state.converting = true;
        self.state.progress = 0.0;
        self.state.status = STATUS_PREPARING.to_string();
        self.notify();

        let mut task = ConversionTask::spawn_on(&self.runtime, Arc::clone(&self.tools), job);
        self.active = Some(ActiveJob {
            id,
            output,
            cancel: task.cancel_token(),
        });

        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            while let Some(sample) = task.next_progress().await {
                if tx.send(WorkerEvent::Progress(sample)).is_err() {
                    // Controller is gone; stop the engine.
                    task.cancel();
                    break;
                }
            }
            let result = task.wait().await;
            let _ = tx.send(WorkerEvent::Finished { job: id, result });
        });

        tracing::info!(job_id = %id, "Desktop conversion started");
        Ok(id)
    }

    /// Stop the running conversion. The outcome arrives through
    /// [`pump`](Self::pump) like any other.
    pub fn cancel(&mut self) {
        if let Some(active) = &self.active {
            tracing::info!(job_id = %active.id, "Cancelling desktop conversion");
            active.cancel.cancel();
        }
    }

    /// Apply every pending worker event. Call from the UI thread. Returns
    /// the number of events applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Block up to `timeout` for the next worker event, then drain the rest.
    /// For front-ends without an event loop of their own.
    pub fn wait_event(&mut self, timeout: Duration) -> usize {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Progress(sample) => {
                if self.active.is_none() {
                    return;
                }
                self.state.progress = sample.clamped_percent();
                self.state.status = format!("Converting... {:.1}%", sample.percent);
                self.notify();
            }
            WorkerEvent::Finished { job, result } => {
                let Some(active) = self.active.take_if(|a| a.id == job) else {
                    return;
                };
                self.state.converting = false;

                match result {
                    ConversionResult::Success { output_path } => {
                        tracing::info!(job_id = %job, "Saved {:?}", output_path);
                        self.state.progress = 100.0;
                        self.state.status = STATUS_SUCCESS.to_string();
                        self.notify();
                        self.observer.conversion_succeeded(&output_path);
                    }
                    ConversionResult::Failure { reason } if active.cancel.is_cancelled() => {
                        tracing::info!(job_id = %job, "Conversion cancelled: {reason}");
                        remove_partial(&active.output);
                        self.state.status = STATUS_CANCELLED.to_string();
                        self.notify();
                    }
                    ConversionResult::Failure { reason } => {
                        tracing::warn!(job_id = %job, "Conversion failed: {reason}");
                        self.state.status = STATUS_FAILED.to_string();
                        self.notify();
                        if self.notice == FailureNotice::Dialog {
                            self.observer.conversion_failed(&reason);
                        }
                    }
                }
            }
        }
    }

    fn notify(&mut self) {
        self.observer.state_changed(&self.state);
    }
}

impl Drop for ConverterController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {:?}: {e}", path),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use af_av::test_fixtures;

    /// Reports 12s of output on a 10s probe, overshooting 100%.
    const ENGINE_OK: &str = r#"in="$2"
out="$4"
for t in 00:00:02.50 00:00:05.00 00:00:12.00; do
  printf 'size=1kB time=%s bitrate=128.0kbits/s\r' "$t" >&2
done
cp "$in" "$out""#;

    #[derive(Default)]
    struct Recorded {
        statuses: Vec<String>,
        successes: Vec<PathBuf>,
        failures: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Recorded>>);

    impl StateObserver for Recorder {
        fn state_changed(&mut self, state: &AppState) {
            self.0.lock().unwrap().statuses.push(state.status.clone());
        }

        fn conversion_succeeded(&mut self, output: &Path) {
            self.0.lock().unwrap().successes.push(output.to_path_buf());
        }

        fn conversion_failed(&mut self, reason: &str) {
            self.0.lock().unwrap().failures.push(reason.to_string());
        }
    }

    fn run_until_idle(controller: &mut ConverterController) {
        for _ in 0..200 {
            controller.wait_event(Duration::from_millis(50));
            if !controller.state().converting {
                return;
            }
        }
        panic!("conversion did not finish");
    }

    fn setup(engine: &str) -> (tempfile::TempDir, tokio::runtime::Runtime, Arc<ToolRegistry>) {
        let dir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let tools = Arc::new(test_fixtures::registry(dir.path(), engine, "echo 10"));
        (dir, runtime, tools)
    }

    #[test]
    fn select_input_updates_status() {
        let (dir, runtime, tools) = setup(ENGINE_OK);
        let mut controller =
            ConverterController::new(runtime.handle().clone(), tools, Box::new(Recorder::default()));

        controller.select_input(dir.path().join("Take 1.wav"));
        assert_eq!(controller.state().status, "File selected: Take 1.wav");
        assert_eq!(controller.state().progress, 0.0);

        controller.set_format(AudioFormat::Flac);
        assert_eq!(controller.suggested_save_name().as_deref(), Some("Take 1.flac"));
    }

    #[test]
    fn start_without_input_is_rejected() {
        let (_dir, runtime, tools) = setup(ENGINE_OK);
        let mut controller =
            ConverterController::new(runtime.handle().clone(), tools, Box::new(Recorder::default()));

        let err = controller.start("/tmp/out.mp3").unwrap_err();
        assert!(matches!(err, af_core::Error::InputMissing(_)));
        assert!(!controller.state().converting);
        assert_eq!(controller.state().status, "Ready");
    }

    #[test]
    fn start_without_engine_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut controller = ConverterController::new(
            runtime.handle().clone(),
            Arc::new(ToolRegistry::default()),
            Box::new(Recorder::default()),
        );
        let input = dir.path().join("a.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        controller.select_input(&input);

        let err = controller.start(dir.path().join("a.mp3")).unwrap_err();
        assert!(matches!(err, af_core::Error::EngineUnavailable { .. }));
        assert!(!controller.state().converting);
    }

    #[test]
    fn successful_conversion_reports_progress_and_path() {
        let (dir, runtime, tools) = setup(ENGINE_OK);
        let recorder = Recorder::default();
        let mut controller =
            ConverterController::new(runtime.handle().clone(), tools, Box::new(recorder.clone()));

        let input = dir.path().join("song.wav");
        std::fs::write(&input, b"RIFF....WAVE").unwrap();
        let output = dir.path().join("song.mp3");
        controller.select_input(&input);
        controller.start(&output).unwrap();
        assert!(controller.state().converting);

        let again = controller.start(&output).unwrap_err();
        assert!(matches!(again, af_core::Error::Validation(_)));

        run_until_idle(&mut controller);

        let state = controller.state();
        assert_eq!(state.status, "Conversion Successful!");
        assert_eq!(state.progress, 100.0);
        assert_eq!(std::fs::read(&output).unwrap(), b"RIFF....WAVE");

        let recorded = recorder.0.lock().unwrap();
        assert_eq!(recorded.successes, vec![output.clone()]);
        assert!(recorded.statuses.contains(&"Preparing conversion...".to_string()));
        assert!(recorded.statuses.contains(&"Converting... 25.0%".to_string()));
        // Percent text is unclamped when the engine overshoots the probe.
        assert!(recorded.statuses.contains(&"Converting... 120.0%".to_string()));
    }

    #[test]
    fn failure_updates_status_only_by_default() {
        let (dir, runtime, tools) = setup("echo 'Invalid data found' >&2\nexit 1");
        let recorder = Recorder::default();
        let mut controller =
            ConverterController::new(runtime.handle().clone(), tools, Box::new(recorder.clone()));

        let input = dir.path().join("bad.wav");
        std::fs::write(&input, b"junk").unwrap();
        controller.select_input(&input);
        controller.start(dir.path().join("bad.mp3")).unwrap();
        run_until_idle(&mut controller);

        assert_eq!(controller.state().status, "Error during conversion.");
        assert!(controller.state().can_start());
        assert!(recorder.0.lock().unwrap().failures.is_empty());
    }

    #[test]
    fn failure_dialog_can_be_enabled() {
        let (dir, runtime, tools) = setup("exit 1");
        let recorder = Recorder::default();
        let mut controller =
            ConverterController::new(runtime.handle().clone(), tools, Box::new(recorder.clone()))
                .with_failure_notice(FailureNotice::Dialog);

        let input = dir.path().join("bad.wav");
        std::fs::write(&input, b"junk").unwrap();
        controller.select_input(&input);
        controller.start(dir.path().join("bad.mp3")).unwrap();
        run_until_idle(&mut controller);

        let recorded = recorder.0.lock().unwrap();
        assert_eq!(recorded.failures.len(), 1);
        assert!(recorded.failures[0].contains("ffmpeg"));
    }

    #[test]
    fn cancel_stops_engine_and_removes_partial_output() {
        let engine = r#"out="$4"
echo partial > "$out"
exec sleep 30"#;
        let (dir, runtime, tools) = setup(engine);
        let mut controller =
            ConverterController::new(runtime.handle().clone(), tools, Box::new(Recorder::default()));

        let input = dir.path().join("long.wav");
        std::fs::write(&input, b"RIFF").unwrap();
        let output = dir.path().join("long.mp3");
        controller.select_input(&input);
        controller.start(&output).unwrap();

        for _ in 0..100 {
            if output.exists() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        controller.cancel();
        run_until_idle(&mut controller);

        assert_eq!(controller.state().status, "Conversion cancelled.");
        assert!(!output.exists());
    }
}
