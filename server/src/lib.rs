//! HTTP front end for the todo store.
//!
//! # Overview
//! Routes CRUD requests on `/todos` to `TodoRepository`, exposes liveness
//! and readiness probes under `/health`, and serves request/todo counters
//! on `/metrics`.
//!
//! # Design
//! - `AppState` is the only shared state: a repository handle (clones share
//!   one pool) and the metrics registry for this router.
//! - Every request passes through the request counter and the request
//!   logger, and is bounded by `REQUEST_TIMEOUT`.
//! - `run` drives each connection through hyper with a header-read
//!   deadline, stops accepting when `shutdown` resolves and returns once
//!   open connections have drained; the caller closes the repository
//!   afterwards.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::{middleware, routing::get, Router};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use todo_core::TodoRepository;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::{debug, warn};

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod telemetry;

use handlers::{health, todos};
use metrics::Metrics;

/// Upper bound on handling a single request, body read included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Deadline for a connection to deliver a complete request head. The timer
/// also runs while a keep-alive connection waits for its next request, so
/// idle connections are dropped when it fires.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    pub repo: TodoRepository,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(repo: TodoRepository) -> Self {
        Self {
            repo,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let counters = state.metrics.clone();
    Router::new()
        .route("/todos", get(todos::list_todos).post(todos::create_todo))
        .route(
            "/todos/{id}",
            get(todos::get_todo)
                .put(todos::update_todo)
                .delete(todos::delete_todo),
        )
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(handlers::metrics::serve_metrics))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(middleware::from_fn(telemetry::log_requests))
        .layer(middleware::from_fn_with_state(counters, metrics::count_requests))
        .with_state(state)
}

pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    run_with(listener, state, shutdown, HEADER_READ_TIMEOUT).await
}

/// Like [`run`] with an explicit header-read deadline.
pub async fn run_with<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
    header_read_timeout: Duration,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = app(state);

    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout)
        .keep_alive(true);
    builder.http2().timer(TokioTimer::new());

    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let service = TowerToHyperService::new(app.clone());
        let conn = builder
            .serve_connection_with_upgrades(TokioIo::new(stream), service)
            .into_owned();
        let conn = graceful.watch(conn);

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }

    drop(listener);
    debug!("stopped accepting, draining connections");
    graceful.shutdown().await;
    Ok(())
}
