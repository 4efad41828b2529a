use anyhow::{Context, Result};
use notification_archive::{api, config, db, logging};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let config = config::Config::from_env()?;

    // Build custom runtime with explicit thread configuration
    println!("Starting with {} Tokio worker threads", config.worker_threads);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async {
        // Initialize logging first thing
        logging::setup_logging();

        info!("Starting notification archive service");

        let db_pool = db::init_db_pool(&config.database_url, config.db_max_connections)
            .await
            .context("Failed to initialize database")?;

        let api_state = Arc::new(api::ApiState::new(db_pool.clone()));
        let api_router = api::create_api_router(api_state, &config);

        info!("Starting API server on {}", config.api_bind_address);
        let listener = tokio::net::TcpListener::bind(&config.api_bind_address)
            .await
            .with_context(|| format!("Failed to bind {}", config.api_bind_address))?;

        axum::serve(listener, api_router)
            .with_graceful_shutdown(async {
                let _ = signal::ctrl_c().await;
                info!("Received shutdown signal, shutting down gracefully");
            })
            .await
            .context("API server failed")?;

        db_pool.close().await;
        info!("Shutdown complete");
        Ok(())
    })
}
