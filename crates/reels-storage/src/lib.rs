//! Reels Storage Library
//!
//! Blob store access for the video pipeline: presigned upload URLs, existence
//! checks, and moving bytes between object keys and local scratch files.
//!
//! # Key layout
//!
//! - `raw/{video_id}/{video_id}{ext}`: the client's original upload
//! - `processed/{video_id}/video_720p.mp4`: derived rendition
//! - `processed/{video_id}/cover.jpg`: derived cover still
//!
//! Keys are built in `reels_core::models::video`. Backends only reject keys
//! that are absolute or contain `..`.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use reels_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{validate_key, Storage, StorageError, StorageResult};
