//! MorphCast server.
//!
//! Reads configuration from the environment (see [`config::ServerConfig`]),
//! starts the idle scheduler and the metrics broadcaster, then serves the
//! avatar WebSocket and the status API until SIGINT.
//!
//! ```bash
//! MORPHCAST_BIND=127.0.0.1:9000 RUST_LOG=morphcast_runtime=debug,info \
//!   cargo run --bin morphcast-server --release
//! ```

use std::sync::Arc;

use morphcast_core::SystemClock;
use morphcast_runtime::{spawn_idle_scheduler, spawn_metrics_broadcaster, SessionOrchestrator};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod config;
mod routes;

use config::ServerConfig;
use routes::AppState;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        fmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(true).compact().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.bind,
        target_fps = config.target_fps,
        max_avatars = config.max_avatars,
        "MorphCast starting"
    );

    let orchestrator = Arc::new(SessionOrchestrator::new(
        config.runtime_config(),
        Arc::new(SystemClock::new()),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = spawn_idle_scheduler(Arc::clone(&orchestrator), shutdown_rx.clone());
    let broadcaster = spawn_metrics_broadcaster(
        Arc::clone(&orchestrator),
        config.monitor_config(),
        shutdown_rx,
    );

    let app = routes::router(AppState {
        orchestrator: Arc::clone(&orchestrator),
        outbound_capacity: config.outbound_capacity,
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", config.bind))?;
    info!(addr = %config.bind, "listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown requested");
    });
    if let Err(e) = server.await {
        error!(error = %e, "server error");
    }

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(scheduler, broadcaster);
    for (avatar, _) in orchestrator.handles() {
        orchestrator.disconnect(&avatar);
    }

    info!("MorphCast stopped");
    Ok(())
}
