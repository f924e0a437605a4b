use solprod_server::{config::RelayConfig, model_client, relay::ChatRelay, routes::build_router};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = RelayConfig::from_env()?;
    info!("Provider API: {:?}", config.provider_api);
    info!("Allowed origins: {}", config.allowed_origins.join(", "));

    let relay = Arc::new(ChatRelay::new(
        model_client(&config)?,
        config.provider_timeout,
        config.service_name.clone(),
    ));
    info!("Relaying chat to model: {}", relay.model());
    let app = build_router(relay, &config.allowed_origins);

    info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
