//! Stand-in engine and probe scripts for tests.

#![cfg(unix)]

use std::path::{Path, PathBuf};

use af_core::config::ToolsConfig;

use crate::tools::ToolRegistry;

/// Engine that checks its input, prints four stats lines (2.5s apart on a
/// 10s source, separated by carriage returns like ffmpeg), and copies the
/// input to the output.
pub const ENGINE_OK: &str = r#"in="$2"
out="$4"
if [ ! -f "$in" ]; then echo "$in: No such file or directory" >&2; exit 1; fi
printf 'Input #0, wav, from %s\n' "$in" >&2
for t in 00:00:02.50 00:00:05.00 00:00:07.50 00:00:10.00; do
  printf 'size=       1kB time=%s bitrate= 128.0kbits/s speed=1x\r' "$t" >&2
done
printf '\n' >&2
cp "$in" "$out""#;

/// Engine that always fails.
pub const ENGINE_FAIL: &str = "echo 'Unknown encoder' >&2\nexit 1";

/// Engine that never finishes on its own.
pub const ENGINE_SLOW: &str = "exec sleep 30";

/// Write an executable `/bin/sh` script.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}

/// Registry whose ffmpeg and ffprobe are the given script bodies.
pub fn registry(dir: &Path, engine: &str, probe: &str) -> ToolRegistry {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).expect("failed to create bin dir");
    ToolRegistry::discover(&ToolsConfig {
        ffmpeg_path: Some(write_script(&bin, "ffmpeg", engine)),
        ffprobe_path: Some(write_script(&bin, "ffprobe", probe)),
    })
}
