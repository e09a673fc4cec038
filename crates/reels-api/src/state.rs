//! Application state shared by every handler.

use crate::auth::JwtVerifier;
use crate::services::{CompletionGate, JobDispatcher, UploadSessionManager};
use reels_core::Config;
use reels_db::VideoRepository;
use reels_storage::Storage;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub videos: Arc<dyn VideoRepository>,
    pub storage: Arc<dyn Storage>,
    pub uploads: UploadSessionManager,
    pub completion: CompletionGate,
    pub jwt: JwtVerifier,
}

impl AppState {
    pub fn new(
        config: Config,
        videos: Arc<dyn VideoRepository>,
        storage: Arc<dyn Storage>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        let uploads =
            UploadSessionManager::new(videos.clone(), storage.clone(), config.upload().clone());
        let completion = CompletionGate::new(videos.clone(), storage.clone(), dispatcher);
        let jwt = JwtVerifier::new(config.jwt_secret());

        Self {
            config,
            videos,
            storage,
            uploads,
            completion,
            jwt,
        }
    }
}
