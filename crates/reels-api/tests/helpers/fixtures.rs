use async_trait::async_trait;
use reels_processing::{TranscodeError, TranscodeTool};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub enum FakeMode {
    /// Write placeholder outputs and report this duration.
    Succeed(Option<i32>),
    /// Fail the 720p render like a non-zero ffmpeg exit.
    FailRender,
    /// Never finish the 720p render.
    HangRender,
}

/// Stand-in for ffmpeg/ffprobe.
pub struct FakeTool {
    mode: FakeMode,
    renders: AtomicUsize,
}

impl FakeTool {
    pub fn new(mode: FakeMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            renders: AtomicUsize::new(0),
        })
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscodeTool for FakeTool {
    async fn render_720p(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        assert!(input.exists(), "raw object should be downloaded first");
        match self.mode {
            FakeMode::Succeed(_) => {
                tokio::fs::write(output, b"720p rendition").await.unwrap();
                Ok(())
            }
            FakeMode::HangRender => {
                tokio::time::sleep(std::time::Duration::from_secs(24 * 3600)).await;
                Ok(())
            }
            FakeMode::FailRender => Err(TranscodeError::Failed {
                tool: "ffmpeg".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            }),
        }
    }

    async fn extract_cover(&self, _input: &Path, output: &Path) -> Result<(), TranscodeError> {
        tokio::fs::write(output, b"jpeg").await.unwrap();
        Ok(())
    }

    async fn read_duration(&self, _input: &Path) -> Option<i32> {
        match self.mode {
            FakeMode::Succeed(duration) => duration,
            FakeMode::FailRender | FakeMode::HangRender => None,
        }
    }
}

/// Bytes standing in for an uploaded video.
pub fn sample_video_bytes() -> Vec<u8> {
    b"\x00\x00\x00\x18ftypmp42 not really a video".to_vec()
}
