use reels_core::Config;

// mimalloc keeps fragmentation low for the long-running API + worker process,
// especially on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Database, storage, worker pool and routes
    let app = reels_api::setup::initialize_app(config.clone()).await?;

    reels_api::setup::server::start_server(&config, app.router).await?;

    app.task_queue.shutdown().await;

    Ok(())
}
