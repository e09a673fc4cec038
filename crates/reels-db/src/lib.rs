//! Reels Database Layer
//!
//! The video record store and the durable task table. Both are exposed as
//! traits so the request path, the worker and the tests can run against
//! Postgres or the in-memory implementations interchangeably.

pub mod db;

pub use db::memory::{InMemoryTaskStore, InMemoryVideoRepository};
pub use db::task::{NewTask, TaskRepository, TaskStore, NEW_TASK_CHANNEL};
pub use db::video::{PgVideoRepository, VideoRepository};
