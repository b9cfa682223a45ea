use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use todo_core::{Todo, TodoRepository};
use todo_server::{app, AppState};
use tower::ServiceExt;

async fn test_app() -> (Router, AppState) {
    let repo = TodoRepository::in_memory().await.unwrap();
    let state = AppState::new(repo);
    (app(state.clone()), state)
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

async fn send(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn create(app: &Router, body: &str) -> Todo {
    let resp = send(app, json_request("POST", "/todos", body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

// --- list ---

#[tokio::test]
async fn list_todos_empty() {
    let (app, _) = test_app().await;
    let resp = send(&app, empty_request("GET", "/todos")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let todos: Vec<Todo> = body_json(resp).await;
    assert!(todos.is_empty());
}

#[tokio::test]
async fn list_todos_newest_first() {
    let (app, _) = test_app().await;
    let first = create(&app, r#"{"title":"first"}"#).await;
    let second = create(&app, r#"{"title":"second"}"#).await;

    let resp = send(&app, empty_request("GET", "/todos")).await;
    let todos: Vec<Todo> = body_json(resp).await;
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0].id, second.id);
    assert_eq!(todos[1].id, first.id);
}

// --- create ---

#[tokio::test]
async fn create_todo_returns_201() {
    let (app, _) = test_app().await;
    let resp = send(&app, json_request("POST", "/todos", r#"{"title":"buy milk"}"#)).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["title"], "buy milk");
    assert_eq!(body["description"], "");
    assert_eq!(body["completed"], false);
    assert!(body["id"].is_i64());
    assert!(body["created_at"].is_string());
    assert_eq!(body["created_at"], body["updated_at"]);
}

#[tokio::test]
async fn create_todo_with_description() {
    let (app, _) = test_app().await;
    let todo = create(&app, r#"{"title":"call","description":"the dentist"}"#).await;
    assert_eq!(todo.description, "the dentist");
}

#[tokio::test]
async fn create_todo_empty_title_returns_400() {
    let (app, _) = test_app().await;
    let resp = send(&app, json_request("POST", "/todos", r#"{"title":""}"#)).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn create_todo_missing_title_returns_400() {
    let (app, _) = test_app().await;
    let resp = send(&app, json_request("POST", "/todos", r#"{"not_title":1}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_todo_malformed_json_returns_400() {
    let (app, _) = test_app().await;
    let resp = send(&app, json_request("POST", "/todos", "{not json")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_todo_without_content_type_returns_400() {
    let (app, state) = test_app().await;
    let resp = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/todos")
            .body(r#"{"title":"buy milk"}"#.to_string())
            .unwrap(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.repo.count().await.unwrap(), 0);
}

// --- get ---

#[tokio::test]
async fn get_todo_not_found() {
    let (app, _) = test_app().await;
    let resp = send(&app, empty_request("GET", "/todos/999")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_todo_bad_id_returns_400() {
    let (app, _) = test_app().await;
    let resp = send(&app, empty_request("GET", "/todos/not-a-number")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_todo_matches_create() {
    let (app, _) = test_app().await;
    let created = create(&app, r#"{"title":"same"}"#).await;

    let resp = send(&app, empty_request("GET", &format!("/todos/{}", created.id))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Todo = body_json(resp).await;
    assert_eq!(fetched, created);
}

// --- update ---

#[tokio::test]
async fn update_todo_not_found() {
    let (app, _) = test_app().await;
    let resp = send(&app, json_request("PUT", "/todos/999", r#"{"title":"nope"}"#)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_todo_bad_id_returns_400() {
    let (app, _) = test_app().await;
    let resp = send(&app, json_request("PUT", "/todos/abc", r#"{"title":"x"}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_todo_bad_body_returns_400() {
    let (app, _) = test_app().await;
    let created = create(&app, r#"{"title":"x"}"#).await;

    let uri = format!("/todos/{}", created.id);
    for body in [r#"{"completed":"yes"}"#, r#"{"title":null}"#, r#"{"title":" "}"#, "["] {
        let resp = send(&app, json_request("PUT", &uri, body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
    }
}

#[tokio::test]
async fn update_title_keeps_description() {
    let (app, _) = test_app().await;
    let created = create(&app, r#"{"title":"a","description":"keep me"}"#).await;

    let resp = send(
        &app,
        json_request("PUT", &format!("/todos/{}", created.id), r#"{"title":"b"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, empty_request("GET", &format!("/todos/{}", created.id))).await;
    let fetched: Todo = body_json(resp).await;
    assert_eq!(fetched.title, "b");
    assert_eq!(fetched.description, "keep me");
    assert_eq!(fetched.created_at, created.created_at);
}

// --- delete ---

#[tokio::test]
async fn delete_todo_missing_returns_204() {
    let (app, _) = test_app().await;
    let resp = send(&app, empty_request("DELETE", "/todos/999")).await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn delete_todo_bad_id_returns_400() {
    let (app, _) = test_app().await;
    let resp = send(&app, empty_request("DELETE", "/todos/1.5")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- storage failures ---

#[tokio::test]
async fn closed_store_returns_500_without_detail() {
    let (app, state) = test_app().await;
    state.repo.close().await;

    let resp = send(&app, empty_request("GET", "/todos")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["error"], "internal server error");

    let resp = send(&app, json_request("POST", "/todos", r#"{"title":"x"}"#)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let resp = send(&app, empty_request("DELETE", "/todos/1")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// --- health ---

#[tokio::test]
async fn liveness_is_alive() {
    let (app, _) = test_app().await;
    let resp = send(&app, empty_request("GET", "/health/live")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body, serde_json::json!({"status": "alive"}));
}

#[tokio::test]
async fn readiness_ok_with_open_store() {
    let (app, _) = test_app().await;
    let resp = send(&app, empty_request("GET", "/health/ready")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body, serde_json::json!({"status": "ready", "database": "ok"}));
}

#[tokio::test]
async fn readiness_503_after_store_closed() {
    let (app, state) = test_app().await;
    state.repo.close().await;

    let resp = send(&app, empty_request("GET", "/health/ready")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = body_json(resp).await;
    assert_eq!(body["database"], "error");

    let resp = send(&app, empty_request("GET", "/health/live")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- metrics ---

#[tokio::test]
async fn metrics_count_requests_and_todos() {
    let (app, state) = test_app().await;
    let a = create(&app, r#"{"title":"a"}"#).await;
    create(&app, r#"{"title":"b"}"#).await;
    send(&app, empty_request("DELETE", &format!("/todos/{}", a.id))).await;
    send(&app, empty_request("GET", "/health/live")).await;

    let resp = send(&app, empty_request("GET", "/metrics")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "text/plain; version=0.0.4"
    );
    let text = String::from_utf8(body_bytes(resp).await.to_vec()).unwrap();

    // Four requests above plus the metrics request itself.
    assert!(text.contains("http_requests_total 5\n"), "{text}");
    assert!(text.contains("todos_total 1\n"), "{text}");
    assert_eq!(state.metrics.requests(), 5);
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    let (app, _) = test_app().await;

    let resp = send(&app, json_request("POST", "/todos", r#"{"title":""}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // create
    let created = create(&app, r#"{"title":"buy milk"}"#).await;
    assert!(!created.completed);
    let uri = format!("/todos/{}", created.id);

    // update — partial: only completed
    let resp = send(&app, json_request("PUT", &uri, r#"{"completed":true}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Todo = body_json(resp).await;
    assert!(updated.completed);
    assert_eq!(updated.title, "buy milk"); // unchanged
    assert!(updated.updated_at >= created.updated_at);

    // list — contains the one todo
    let resp = send(&app, empty_request("GET", "/todos")).await;
    let todos: Vec<Todo> = body_json(resp).await;
    assert_eq!(todos, vec![updated]);

    // delete
    let resp = send(&app, empty_request("DELETE", &uri)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // get after delete — 404
    let resp = send(&app, empty_request("GET", &uri)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // list after delete — empty
    let resp = send(&app, empty_request("GET", "/todos")).await;
    let todos: Vec<Todo> = body_json(resp).await;
    assert!(todos.is_empty());
}
