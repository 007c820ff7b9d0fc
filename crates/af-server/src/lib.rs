//! af-server: HTTP upload adapter for the conversion core.
//!
//! Provides:
//!
//! - `POST /convert`: upload a file, get the converted file back
//! - Liveness, tool inspection and OpenAPI routes
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::future::Future;

use af_core::config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use crate::context::AppContext;

/// Start the audioforge HTTP server.
///
/// Validates the configuration, discovers tools, binds the configured
/// address and serves until Ctrl-C or SIGTERM.
pub async fn start(config: Config) -> af_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let host = config.server.host.clone();
    let port = config.server.port;

    let ctx = AppContext::new(config)?;
    for info in ctx.tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}; conversions will fail", info.name);
        }
    }

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| af_core::Error::Internal(format!("Failed to bind to {host}:{port}: {e}")))?;

    let cancel = CancellationToken::new();
    serve(listener, ctx, shutdown_signal(cancel)).await
}

/// Serve the router on an already-bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> af_core::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Starting server on {addr}");
    }

    let app = router::build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
