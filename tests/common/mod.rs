//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which writes stand-in `ffmpeg`/`ffprobe` shell
//! scripts into a temp dir, builds an [`AppContext`] around them, and serves
//! the router on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use af_av::ToolRegistry;
use af_core::config::{Config, ToolsConfig};
use af_server::context::AppContext;
use tempfile::TempDir;

/// Engine that checks its input, prints ffmpeg-style stats separated by
/// carriage returns, and copies the input to the output with a marker.
pub const ENGINE_OK: &str = r#"in="$2"
out="$4"
if [ ! -f "$in" ]; then echo "$in: No such file or directory" >&2; exit 1; fi
for t in 00:00:01.00 00:00:02.00; do
  printf 'size=1kB time=%s bitrate=128.0kbits/s\r' "$t" >&2
done
{ printf 'converted:'; cat "$in"; } > "$out""#;

/// Engine that always fails after writing a partial output.
pub const ENGINE_FAIL: &str = r#"out="$4"
echo partial > "$out"
echo 'Conversion failed!' >&2
exit 1"#;

/// Engine that takes a while, for overlap tests.
pub const ENGINE_SLOW: &str = r#"in="$2"
out="$4"
sleep 1
{ printf 'converted:'; cat "$in"; } > "$out""#;

pub const PROBE_OK: &str = "echo 2.000000";

pub use af_av::test_fixtures::write_script;

/// Test harness owning a temp dir with tool scripts and an upload dir.
pub struct TestHarness {
    pub ctx: AppContext,
    pub dir: TempDir,
}

impl TestHarness {
    /// Harness whose engine is `engine`, with short cleanup delays.
    pub fn new(engine: &str) -> Self {
        Self::with_config(engine, |_| {})
    }

    /// Harness with a config tweak applied before the context is built.
    pub fn with_config(engine: &str, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).expect("failed to create bin dir");

        let mut config = Config::default();
        config.server.upload_dir = dir.path().join("uploads");
        config.tools = ToolsConfig {
            ffmpeg_path: Some(write_script(&bin, "ffmpeg", engine)),
            ffprobe_path: Some(write_script(&bin, "ffprobe", PROBE_OK)),
        };
        config.cleanup.input_grace_secs = 0;
        config.cleanup.output_grace_secs = 0;
        tweak(&mut config);

        let tools = ToolRegistry::discover(&config.tools);
        let ctx = AppContext::with_tools(config, tools).expect("failed to build context");
        Self { ctx, dir }
    }

    /// Start an Axum server on a random port and return its address.
    pub async fn serve(&self) -> SocketAddr {
        let ctx = self.ctx.clone();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            af_server::serve(listener, ctx, std::future::pending()).await.ok();
        });

        addr
    }

    pub fn upload_dir(&self) -> &Path {
        self.ctx.workspace.dir()
    }

    /// Names of files currently in the upload dir.
    pub fn upload_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.upload_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Poll until the upload dir is empty or `timeout` passes.
    pub async fn wait_for_empty_uploads(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.upload_files().is_empty() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        self.upload_files().is_empty()
    }
}

/// Build a multipart form with a `file` part and an optional `format` field.
pub fn upload_form(file_name: &str, contents: &[u8], format: Option<&str>) -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(contents.to_vec()).file_name(file_name.to_string());
    let form = reqwest::multipart::Form::new().part("file", part);
    match format {
        Some(f) => form.text("format", f.to_string()),
        None => form,
    }
}
