//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the conversion
//! engine (ffmpeg) and the duration probe (ffprobe) and provides lookup
//! methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default tool timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Name of the conversion engine.
pub const ENGINE: &str = "ffmpeg";

/// Name of the duration probe.
pub const PROBE: &str = "ffprobe";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[ENGINE, PROBE];

/// A discovered external tool.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time before the tool is killed.
    pub timeout: Duration,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `-version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    #[schema(value_type = Option<String>)]
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools using config overrides, the working directory, and `PATH`.
    ///
    /// For each known tool, a configured path is used when it exists and is
    /// executable. Otherwise a binary of the same name in the current working
    /// directory wins, then [`which::which`]. Tools that are not found are
    /// omitted from the registry and reported by [`require`](Self::require).
    pub fn discover(tools_config: &af_core::config::ToolsConfig) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                ENGINE => tools_config.ffmpeg_path.as_deref(),
                PROBE => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = custom_path
                .filter(|p| is_executable(p))
                .map(Path::to_path_buf)
                .or_else(|| local_binary(name))
                .or_else(|| which::which(name).ok());

            if let Some(path) = resolved {
                tools.insert(
                    name.to_string(),
                    ToolConfig {
                        name: name.to_string(),
                        path,
                        timeout: DEFAULT_TIMEOUT,
                    },
                );
            }
        }

        Self { tools }
    }

    /// Return a reference to the [`ToolConfig`] for the given tool, or an
    /// [`af_core::Error::EngineUnavailable`] if the tool was not found during
    /// discovery.
    pub fn require(&self, name: &str) -> af_core::Result<&ToolConfig> {
        let cfg = self.tools.get(name).ok_or_else(|| {
            af_core::Error::engine_unavailable(
                name,
                format!("{name} not found; install it, put it in PATH, or set tools.{name}_path"),
            )
        })?;

        // The binary may have been removed since discovery.
        if !is_executable(&cfg.path) {
            return Err(af_core::Error::engine_unavailable(
                name,
                format!("{} is missing or not executable", cfg.path.display()),
            ));
        }

        Ok(cfg)
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                if let Some(cfg) = self.tools.get(name) {
                    ToolInfo {
                        name: name.to_string(),
                        available: true,
                        version: detect_version(&cfg.path),
                        path: Some(cfg.path.clone()),
                    }
                } else {
                    ToolInfo {
                        name: name.to_string(),
                        available: false,
                        version: None,
                        path: None,
                    }
                }
            })
            .collect()
    }
}

/// A tool binary sitting in the current working directory.
fn local_binary(name: &str) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    [name.to_string(), format!("{name}.exe")]
        .into_iter()
        .map(|file| cwd.join(file))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
