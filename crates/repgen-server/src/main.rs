use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repgen_server::config::ServerConfig;
use repgen_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repgen_server=info,repgen_pipeline=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config).await?;
    let app = repgen_server::app_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        mode = %config.mode,
        bucket = %config.allowed_bucket,
        "repgen server listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
