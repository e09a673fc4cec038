//! Reels Core Library
//!
//! Domain models, error types and configuration shared by every crate of the
//! upload-to-ready video pipeline.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod task_error;

pub use config::{BaseConfig, Config, PipelineConfig, TaskQueueSettings, TranscodeSettings, UploadSettings};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
pub use task_error::{TaskError, TaskResultExt};
