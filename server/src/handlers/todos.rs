use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use todo_core::{CreateTodo, Todo, UpdateTodo};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

type ApiResult<T> = Result<T, ApiError>;

pub async fn list_todos(State(state): State<AppState>) -> ApiResult<Json<Vec<Todo>>> {
    Ok(Json(state.repo.get_all().await?))
}

pub async fn get_todo(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Todo>> {
    let Path(id) = id?;
    Ok(Json(state.repo.get_by_id(id).await?))
}

pub async fn create_todo(
    State(state): State<AppState>,
    input: Result<Json<CreateTodo>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Todo>)> {
    let Json(input) = input?;
    input.validate()?;
    let todo = state.repo.create(&input).await?;
    refresh_todo_count(&state).await;
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn update_todo(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    input: Result<Json<UpdateTodo>, JsonRejection>,
) -> ApiResult<Json<Todo>> {
    let Path(id) = id?;
    let Json(patch) = input?;
    patch.validate()?;
    Ok(Json(state.repo.update(id, &patch).await?))
}

/// Always 204 for a well-formed id, whether or not the todo existed.
pub async fn delete_todo(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    state.repo.delete(id).await?;
    refresh_todo_count(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

// Best effort: a stale gauge is preferable to failing a write that succeeded.
async fn refresh_todo_count(state: &AppState) {
    match state.repo.count().await {
        Ok(count) => state.metrics.set_todo_count(count),
        Err(e) => warn!(error = %e, "could not refresh todo count"),
    }
}
