use anyhow::{Context, Result};
use clap::Parser;
use todo_core::TodoRepository;
use todo_server::config::Config;
use todo_server::{telemetry, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    telemetry::init_tracing(&config.log_level, config.log_format)?;

    info!(port = config.port, db_path = %config.db_path.display(), "starting todo api");

    let repo = TodoRepository::open_with(&config.db_path, config.max_connections)
        .await
        .context("failed to initialize database")?;

    let state = AppState::new(repo.clone());
    match repo.count().await {
        Ok(count) => state.metrics.set_todo_count(count),
        Err(e) => warn!(error = %e, "could not read initial todo count"),
    }

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "server listening");

    todo_server::run(listener, state, shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down, closing database");
    repo.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
