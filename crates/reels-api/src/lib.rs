//! Reels API Library
//!
//! HTTP surface of the upload-to-ready pipeline: upload handshake, read
//! endpoints, bearer auth, and the wiring that connects the task queue to the
//! transcode worker.

mod api_doc;
mod handlers;
mod telemetry;

pub mod auth;
pub mod error;
pub mod services;
pub mod setup;
pub mod state;
pub mod task_handlers;

pub use error::{ErrorResponse, HttpAppError};
pub use reels_worker::{TaskQueue, TaskQueueConfig};
pub use services::{CompletionGate, JobDispatcher, TaskQueueDispatcher, UploadSessionManager};
pub use state::AppState;
pub use task_handlers::TranscodeTaskHandler;
