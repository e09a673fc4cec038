pub mod task;
pub mod video;

pub use task::{Task, TaskPayload, TaskStatus, TaskType, TranscodeJob};
pub use video::{
    cover_object_key, raw_object_key, rendition_object_key, StatusFields, Video, VideoResponse,
    VideoStatus, COVER_CONTENT_TYPE, DEFAULT_RAW_EXTENSION, RENDITION_CONTENT_TYPE, TITLE_MAX_LEN,
};
