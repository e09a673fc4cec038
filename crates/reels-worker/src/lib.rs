//! Reels Worker
//!
//! Runs tasks stored in the `tasks` table on a bounded pool of Tokio tasks.
//! The API wires a [`TaskHandlerContext`] in; the queue owns claiming,
//! timeouts, retries and recovery of work lost to crashes.

pub mod context;
pub mod queue;

pub use context::TaskHandlerContext;
pub use queue::{TaskQueue, TaskQueueConfig, MAX_RETRY_BACKOFF_SECS};
