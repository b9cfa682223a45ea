//! In-process request and todo counters.
//!
//! `Metrics` is owned by `AppState` and shared through an `Arc`, so its
//! lifetime matches the router it was built for.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    todos: AtomicI64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn set_todo_count(&self, count: i64) {
        self.todos.store(count, Ordering::Relaxed);
    }

    pub fn todo_count(&self) -> i64 {
        self.todos.load(Ordering::Relaxed)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        write_metric(
            &mut out,
            "http_requests_total",
            "The total number of HTTP requests",
            "counter",
            self.requests(),
        );
        out.push('\n');
        write_metric(
            &mut out,
            "todos_total",
            "The total number of todos",
            "gauge",
            self.todo_count(),
        );
        out
    }
}

fn write_metric(out: &mut String, name: &str, help: &str, kind: &str, value: impl std::fmt::Display) {
    // Writing to a String cannot fail.
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}

/// Middleware counting every request, the metrics route included.
pub async fn count_requests(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    metrics.increment_requests();
    next.run(request).await
}
