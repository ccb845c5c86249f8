//! HTTP server for meeting-agent
//!
//! JSON endpoints for meetings, summaries and todos plus the streaming chat
//! endpoint (server-sent events).

mod error;
mod extract;
mod routes;
mod schemas;
mod state;

pub use error::ServerError;
pub use routes::router;
pub use schemas::*;
pub use state::AppState;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Settings;
use crate::llm::{build_model, ChatModel};

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(settings: &Settings, bind: Option<&str>) -> Result<()> {
    settings.ensure_dirs()?;
    let model: Arc<dyn ChatModel> = Arc::from(build_model(settings)?);
    let state = AppState::new(settings, model)?;

    let addr = bind.unwrap_or(settings.server.bind_address.as_str());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, version = crate::VERSION, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
