use anyhow::Context;
use dotenv::dotenv;
use redis_fleet::{config::ConfigManager, presentation::routes::app_router, AppState};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let mut config_manager = ConfigManager::new();
    config_manager
        .load()
        .await
        .context("Failed to load configuration")?;
    let config = config_manager.get().await;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.observability.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let address = format!("{}:{}", config.server.host, config.server.port);
    let clusters = config.clusters.len();
    let state = AppState::from_config(&config).context("Failed to build application state")?;
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!(address = %address, clusters = clusters, "Redis fleet orchestrator listening");
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
