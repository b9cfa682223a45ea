//! Persistence core for the todo service.
//!
//! # Overview
//! Owns the todo entity, its request payloads and the SQLite repository
//! that stores it. The HTTP layer lives in the `todo-server` crate and
//! talks to the store only through `TodoRepository`.
//!
//! # Design
//! - `TodoRepository` is the single owner of the database pool; every
//!   operation is one SQL statement.
//! - Partial updates use `Patch<T>` so "field absent" and "field set" are
//!   distinct at the type level.
//! - Failures are typed (`StoreError`) and carry no HTTP knowledge; the
//!   server maps them to status codes.

pub mod error;
pub mod repository;
pub mod types;

pub use error::{Result, StoreError};
pub use repository::TodoRepository;
pub use types::{CreateTodo, Patch, Todo, UpdateTodo};
