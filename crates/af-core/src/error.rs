//! Unified error type for audioforge.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for the HTTP adapter to derive a status code via [`Error::http_status`] and
//! for the desktop adapter to render a status line.

use std::path::PathBuf;

/// Unified error type covering all failure modes in audioforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request carried no usable input file. User-correctable.
    #[error("{0}")]
    InputMissing(String),

    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An upload exceeded the configured size cap.
    #[error("Upload exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge {
        /// The configured limit in bytes.
        limit: u64,
    },

    /// A required external tool could not be found or executed.
    #[error("{tool} is not available: {message}")]
    EngineUnavailable {
        /// Name of the missing tool.
        tool: String,
        /// Actionable description for the operator.
        message: String,
    },

    /// An external tool ran but did not succeed.
    #[error("Engine error [{tool}]: {message}")]
    EngineFailure {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Media duration probing failed. Only degrades progress reporting.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Removing a temporary file failed.
    #[error("Cleanup of {} failed: {source}", path.display())]
    Cleanup {
        /// The file that could not be removed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The operation was cancelled by its owner.
    #[error("conversion cancelled")]
    Cancelled,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::InputMissing(_) => 400,
            Error::Validation(_) => 400,
            Error::PayloadTooLarge { .. } => 413,
            Error::EngineUnavailable { .. } => 500,
            Error::EngineFailure { .. } => 500,
            Error::Probe(_) => 500,
            Error::Cleanup { .. } => 500,
            Error::Cancelled => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InputMissing(_) => "input_missing",
            Error::Validation(_) => "validation_error",
            Error::PayloadTooLarge { .. } => "payload_too_large",
            Error::EngineUnavailable { .. } => "engine_unavailable",
            Error::EngineFailure { .. } => "engine_failure",
            Error::Probe(_) => "probe_error",
            Error::Cleanup { .. } => "cleanup_error",
            Error::Cancelled => "cancelled",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Convenience constructor for [`Error::EngineUnavailable`].
    pub fn engine_unavailable(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::EngineUnavailable {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::EngineFailure`].
    pub fn engine_failure(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::EngineFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_missing_display_is_bare_message() {
        let err = Error::InputMissing("No file part".into());
        assert_eq!(err.to_string(), "No file part");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code(), "input_missing");
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("format is empty".into());
        assert_eq!(err.to_string(), "Validation error: format is empty");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn payload_too_large_display() {
        let err = Error::PayloadTooLarge { limit: 1024 };
        assert!(err.to_string().contains("1024"));
        assert_eq!(err.http_status(), 413);
    }

    #[test]
    fn engine_unavailable_display() {
        let err = Error::engine_unavailable("ffmpeg", "not found in PATH");
        assert_eq!(err.to_string(), "ffmpeg is not available: not found in PATH");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn engine_failure_display() {
        let err = Error::engine_failure("ffmpeg", "exited with code 1");
        assert_eq!(err.to_string(), "Engine error [ffmpeg]: exited with code 1");
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code(), "engine_failure");
    }

    #[test]
    fn cleanup_display_names_path() {
        let err = Error::Cleanup {
            path: PathBuf::from("/tmp/x.mp3"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/x.mp3"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn cancelled_display() {
        assert_eq!(Error::Cancelled.to_string(), "conversion cancelled");
    }

    #[test]
    fn result_alias() {
        fn err_fn() -> Result<i32> {
            Err(Error::Internal("boom".into()))
        }
        assert!(err_fn().is_err());
    }
}
