use hls_token_proxy::{config, server};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hls_token_proxy=info,tower_http=info".into()),
        )
        .init();

    info!("Starting hls-token-proxy v{}", env!("CARGO_PKG_VERSION"));

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    info!("Running in {} mode", if config.is_dev { "DEV" } else { "PROD" });

    let shutdown = CancellationToken::new();
    spawn_shutdown_watcher(shutdown.clone());

    if let Err(e) = server::start(config, shutdown).await {
        error!("Failed to start server: {}", e);
        std::process::exit(1);
    }
}

/// Cancel `shutdown` on CTRL+C so in-flight requests can drain
fn spawn_shutdown_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Caught CTRL+C signal, shutting down");
        shutdown.cancel();
    });
}
