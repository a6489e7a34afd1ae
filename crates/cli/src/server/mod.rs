//! HTTP server: SSE fan-out, broadcast endpoint and comment API
//!
//! Startup order matters: signal listeners first, then the PID file (daemon
//! child only), the store, hub and registry, and finally the listening
//! socket. A bind failure is the only fatal error once the store is open.

pub mod comments;
pub mod error;
pub mod events;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use state::AppState;

use crate::config::Settings;
use crate::pidfile::PidFile;
use anyhow::{Context, Result};
use redline_store::Store;
use redline_watcher::WatchConfig;
use shutdown::ShutdownSignal;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Serve `state` on `listener` until `shutdown` resolves and every
/// connection has finished
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, routes::create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Run the server until SIGINT or SIGTERM
pub async fn run(settings: &Settings, daemon_child: bool) -> Result<()> {
    let signals = ShutdownSignal::install().context("Failed to install signal handlers")?;

    let _pid_guard = if daemon_child {
        let guard = PidFile::new(settings.pid_file())
            .claim()
            .with_context(|| format!("Failed to write PID file {}", settings.pid_file().display()))?;
        Some(guard)
    } else {
        None
    };

    let store = Store::open(&settings.database_path())
        .with_context(|| format!("Failed to open database {}", settings.database_path().display()))?;
    let store = Arc::new(store);

    let state = AppState::new(
        store.clone(),
        settings.queue_capacity,
        WatchConfig {
            debounce: settings.debounce(),
            max_delay: settings.max_delay(),
        },
    );

    let listener = TcpListener::bind(settings.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr()))?;
    let addr = listener.local_addr()?;

    if !daemon_child {
        println!("Starting server on http://localhost:{}", addr.port());
    }
    info!(%addr, pid = std::process::id(), "Server listening");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(serve(listener, state.clone(), async move {
        let _ = stop_rx.await;
    }));

    let finished_early = tokio::select! {
        signal = signals.recv() => {
            info!(signal, "Shutting down");
            None
        }
        result = &mut server => Some(result),
    };

    // Stop accepting, then end every stream so connections can drain
    let _ = stop_tx.send(());
    state.shutdown();

    let outcome = match finished_early {
        Some(result) => result,
        None => match tokio::time::timeout(settings.shutdown_grace(), &mut server).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    grace_ms = settings.shutdown_grace_ms,
                    "Requests still in flight after grace period, aborting"
                );
                server.abort();
                Ok(Ok(()))
            }
        },
    };

    if let Err(err) = store.close() {
        warn!(error = %err, "Failed to close database cleanly");
    }

    info!("Server stopped");
    outcome
        .context("Server task failed")?
        .context("Server error")
}
