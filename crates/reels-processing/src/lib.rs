//! Reels Processing
//!
//! Turns an uploaded raw video into a 720p H.264 rendition and a JPEG cover,
//! and moves the record from `processing` to `ready` or `failed`.

pub mod transcoder;
pub mod worker;

pub use transcoder::{FfmpegTool, TranscodeError, TranscodeTool};
pub use worker::{Discarded, TranscodeOutcome, TranscodeWorker};
