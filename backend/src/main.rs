use anyhow::Result;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alarm_api::config::AppConfig;
use alarm_api::{create_app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alarm_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let state = AppState::from_config(&config).await?;
    let app = create_app(state);

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        tracing::info!("Starting alarm API on the Lambda runtime");
        return lambda_http::run(app)
            .await
            .map_err(|e| anyhow::anyhow!("Lambda runtime failed: {}", e));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Alarm API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
