mod transcode_handler;

pub use transcode_handler::TranscodeTaskHandler;
