//! Application context shared by all request handlers.
//!
//! [`AppContext`] is cheaply cloneable because it only holds `Arc`s. There is
//! no job registry: concurrent requests are isolated by the unique paths the
//! [`Workspace`] hands out.

use std::sync::Arc;
use std::time::Duration;

use af_av::{ToolRegistry, Workspace};
use af_core::config::Config;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Application context shared by all request handlers (via Axum state).
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// External tool registry.
    pub tools: Arc<ToolRegistry>,
    /// Upload/output directory.
    pub workspace: Arc<Workspace>,
    /// Admission control for engine processes; `None` means uncapped.
    pub limiter: Option<Arc<Semaphore>>,
}

impl AppContext {
    /// Build a context, discovering tools from the configuration.
    pub fn new(config: Config) -> af_core::Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        Self::with_tools(config, tools)
    }

    /// Build a context around an already-populated tool registry.
    pub fn with_tools(config: Config, tools: ToolRegistry) -> af_core::Result<Self> {
        let workspace = Workspace::open(&config.server.upload_dir)?;
        let limiter = config
            .server
            .max_concurrent_conversions
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));

        Ok(Self {
            config: Arc::new(config),
            tools: Arc::new(tools),
            workspace: Arc::new(workspace),
            limiter,
        })
    }

    /// Wait for a conversion slot. Returns `None` when uncapped.
    pub async fn admit(&self) -> af_core::Result<Option<OwnedSemaphorePermit>> {
        match &self.limiter {
            Some(limiter) => Arc::clone(limiter)
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| af_core::Error::Internal("conversion limiter closed".into())),
            None => Ok(None),
        }
    }

    pub fn input_grace(&self) -> Duration {
        Duration::from_secs(self.config.cleanup.input_grace_secs)
    }

    pub fn output_grace(&self) -> Duration {
        Duration::from_secs(self.config.cleanup.output_grace_secs)
    }

    pub fn failure_grace(&self) -> Duration {
        Duration::from_secs(self.config.cleanup.failure_grace_secs)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.config.conversion.timeout_secs)
    }
}
