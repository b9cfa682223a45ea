use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub database: &'static str,
}

pub async fn liveness() -> Json<Liveness> {
    Json(Liveness { status: "alive" })
}

/// Runs a real query against the store. Any failure, including a closed
/// pool, reports the service as not ready.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    match state.repo.get_all().await {
        Ok(_) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready",
                database: "ok",
            }),
        ),
        Err(e) => {
            warn!(error = %e, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "not_ready",
                    database: "error",
                }),
            )
        }
    }
}
