//! SQLite-backed persistence for todos.
//!
//! # Design
//! `TodoRepository` is the only owner of the database pool; every read and
//! write goes through it. SQLite serializes writers internally, so no
//! application-level lock is taken. Each operation is a single statement,
//! including `update`, which applies the patch with `COALESCE` so that two
//! concurrent patches touching different fields cannot overwrite each other.
//!
//! The repository is cheap to clone: clones share the same pool, and
//! `close` on any clone closes it for all of them.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::types::{CreateTodo, Todo, UpdateTodo};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS todos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT,
    completed BOOLEAN DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

const COLUMNS: &str = "id, title, description, completed, created_at, updated_at";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the todo table.
#[derive(Debug, Clone)]
pub struct TodoRepository {
    pool: SqlitePool,
}

impl TodoRepository {
    /// Open (or create) the database file at `path` and ensure the schema.
    ///
    /// A path of `:memory:` opens a private in-memory store instead.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Like [`TodoRepository::open`] with an explicit pool size.
    pub async fn open_with(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        if path == Path::new(":memory:") {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::StorageUnavailable(format!(
                    "cannot open database at {}: {e}",
                    path.display()
                ))
            })?;

        debug!(path = %path.display(), max_connections, "opened sqlite pool");
        Self::init(pool).await
    }

    /// A single-connection in-memory store. Data lives as long as the pool.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to `:memory:` is a separate database, so the pool
        // must hold exactly one connection and never recycle it.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| StoreError::StorageUnavailable(format!("connection check failed: {e}")))?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        debug!("todo schema ready");

        Ok(Self { pool })
    }

    /// Insert a new todo and return it as stored.
    ///
    /// The caller is expected to have run `CreateTodo::validate`.
    pub async fn create(&self, input: &CreateTodo) -> Result<Todo> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO todos (title, description, completed, created_at, updated_at) \
             VALUES (?, ?, 0, ?, ?) RETURNING {COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.description)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let todo = row_to_todo(&row)?;
        debug!(id = todo.id, "created todo");
        Ok(todo)
    }

    /// All todos, newest first. Empty when the table is empty.
    pub async fn get_all(&self) -> Result<Vec<Todo>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM todos ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_todo).collect()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Todo> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM todos WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_todo(&row),
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Apply a partial update and return the stored result.
    ///
    /// Unset fields bind as NULL and `COALESCE` keeps the current column
    /// value. `updated_at` is refreshed even for an empty patch.
    pub async fn update(&self, id: i64, patch: &UpdateTodo) -> Result<Todo> {
        let row = sqlx::query(&format!(
            "UPDATE todos SET \
                 title = COALESCE(?, title), \
                 description = COALESCE(?, description), \
                 completed = COALESCE(?, completed), \
                 updated_at = ? \
             WHERE id = ? RETURNING {COLUMNS}"
        ))
        .bind(patch.title.as_set().map(String::as_str))
        .bind(patch.description.as_set().map(String::as_str))
        .bind(patch.completed.as_set().copied())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                debug!(id, "updated todo");
                row_to_todo(&row)
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Remove a todo. Deleting a missing id is not an error.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        debug!(id, rows = result.rows_affected(), "deleted todo");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM todos")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    /// Later calls on this repository (or any clone) fail with
    /// `StorageUnavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!("closed sqlite pool");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

fn row_to_todo(row: &SqliteRow) -> Result<Todo> {
    let description: Option<String> = row.try_get("description")?;
    Ok(Todo {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: description.unwrap_or_default(),
        completed: row.try_get("completed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
