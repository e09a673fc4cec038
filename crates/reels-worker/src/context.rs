//! Task handler context trait
//!
//! The worker calls `dispatch_task` for every claimed task; the implementation
//! matches on task type and invokes the appropriate handler.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use reels_core::models::Task;

/// Context for task dispatch.
///
/// The pool holds a weak reference, so dropping the owner stops dispatch.
/// Returning a [`reels_core::TaskError`] inside the `anyhow::Error` controls
/// whether the task is retried; any other error counts as recoverable.
#[async_trait]
pub trait TaskHandlerContext: Send + Sync {
    /// Dispatch a task to the appropriate handler and return the result.
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value>;
}
