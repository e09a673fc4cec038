pub mod completion;
pub mod dispatcher;
pub mod upload_session;

pub use completion::CompletionGate;
pub use dispatcher::{JobDispatcher, TaskQueueDispatcher};
pub use upload_session::{UploadInitRequest, UploadInitResponse, UploadSessionManager};
