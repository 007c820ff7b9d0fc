//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use af_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> af_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-show_entries", "format=duration"])
///     .arg("/path/to/song.wav")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`af_core::Error::EngineFailure`] if spawning fails, the process
    /// times out, or it exits with a non-zero status (message includes stderr).
    pub async fn execute(&self) -> af_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            af_core::Error::engine_failure(&program_name, format!("failed to spawn: {e}"))
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(af_core::Error::engine_failure(
                        program_name,
                        format!(
                            "{}: {}",
                            describe_exit(output.status),
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(af_core::Error::engine_failure(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            // Dropping the future drops the child, and kill_on_drop reaps it.
            Err(_elapsed) => Err(af_core::Error::engine_failure(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Execute the command, feeding each stderr line to `on_line` as it
    /// arrives.
    ///
    /// Lines are split on both `\n` and `\r`, since ffmpeg rewrites its stats
    /// line in place. Stdout is discarded. The child is killed when `cancel`
    /// fires or the timeout elapses.
    ///
    /// # Errors
    ///
    /// - [`af_core::Error::Cancelled`] if the token was cancelled.
    /// - [`af_core::Error::EngineFailure`] on spawn failure, timeout, read
    ///   failure, or a non-zero exit status. The message does not include the
    ///   tool's diagnostics.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
        cancel: Option<CancellationToken>,
    ) -> af_core::Result<()> {
        let program_name = self.program_name();
        let cancel = cancel.unwrap_or_default();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            af_core::Error::engine_failure(&program_name, format!("failed to spawn: {e}"))
        })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            af_core::Error::Internal(format!("{program_name} stderr was not captured"))
        })?;
        let mut lines = DiagnosticLines::new(stderr);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => on_line(&line),
                    Ok(None) => break,
                    Err(e) => {
                        reap(&mut child).await;
                        return Err(af_core::Error::engine_failure(
                            program_name,
                            format!("failed to read diagnostics: {e}"),
                        ));
                    }
                },
                _ = cancel.cancelled() => {
                    reap(&mut child).await;
                    return Err(af_core::Error::Cancelled);
                }
                _ = &mut deadline => {
                    reap(&mut child).await;
                    return Err(af_core::Error::engine_failure(
                        program_name,
                        format!("timed out after {:?}", self.timeout),
                    ));
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| {
                af_core::Error::engine_failure(
                    &program_name,
                    format!("I/O error waiting for process: {e}"),
                )
            })?,
            _ = cancel.cancelled() => {
                reap(&mut child).await;
                return Err(af_core::Error::Cancelled);
            }
            _ = &mut deadline => {
                reap(&mut child).await;
                return Err(af_core::Error::engine_failure(
                    program_name,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
        };

        if !status.success() {
            return Err(af_core::Error::engine_failure(
                program_name,
                describe_exit(status),
            ));
        }

        Ok(())
    }
}

/// Kill the child and wait for it so no zombie is left behind.
async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill child process: {e}");
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Longest diagnostic line kept in memory; longer runs are split.
pub const MAX_DIAGNOSTIC_LINE: usize = 64 * 1024;

/// Splits a diagnostic byte stream into trimmed, non-empty text lines.
///
/// Both `\n` and `\r` terminate a line. A run of more than
/// [`MAX_DIAGNOSTIC_LINE`] bytes without a terminator is emitted in pieces of
/// that size. Invalid UTF-8 is replaced lossily.
pub struct DiagnosticLines<R> {
    reader: R,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> DiagnosticLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Read the next non-empty line, or `None` at end of stream.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
                let raw: Vec<u8> = self.buf.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&raw[..pos]).trim().to_string();
                if !text.is_empty() {
                    return Ok(Some(text));
                }
                continue;
            }

            if self.buf.len() >= MAX_DIAGNOSTIC_LINE {
                let raw: Vec<u8> = self.buf.drain(..MAX_DIAGNOSTIC_LINE).collect();
                let text = String::from_utf8_lossy(&raw).trim().to_string();
                if !text.is_empty() {
                    return Ok(Some(text));
                }
                continue;
            }

            if self.eof {
                let rest = std::mem::take(&mut self.buf);
                let text = String::from_utf8_lossy(&rest).trim().to_string();
                return Ok((!text.is_empty()).then_some(text));
            }

            let mut chunk = [0u8; 4096];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}
