use gate_web::{AppConfig, AppState, router, telemetry};
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::from_env()?;
    telemetry::init(&config.log_level)?;

    let app = router(AppState::new(config.stats.clone()));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("xp preview listening on http://{addr}, backend at {}", config.api.base_url);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
