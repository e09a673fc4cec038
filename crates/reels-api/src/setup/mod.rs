//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;
pub mod worker;

use crate::services::TaskQueueDispatcher;
use crate::state::AppState;
use crate::task_handlers::TranscodeTaskHandler;
use anyhow::{Context, Result};
use reels_core::Config;
use reels_db::{PgVideoRepository, VideoRepository};
use reels_worker::TaskQueue;
use std::sync::Arc;

/// Everything the binary needs to serve and to shut down cleanly.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub task_queue: TaskQueue,
    /// The worker pool only holds a weak reference; this keeps dispatch alive.
    pub task_handler: Arc<TranscodeTaskHandler>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry()
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let videos: Arc<dyn VideoRepository> = Arc::new(PgVideoRepository::new(pool.clone()));

    let (task_queue, task_handler) =
        worker::start_worker_pool(&config, pool, videos.clone(), storage.clone());

    let dispatcher = Arc::new(TaskQueueDispatcher::new(task_queue.clone()));
    let state = Arc::new(AppState::new(config.clone(), videos, storage, dispatcher));

    let router = routes::setup_routes(&config, state.clone())?;

    Ok(App {
        state,
        router,
        task_queue,
        task_handler,
    })
}
