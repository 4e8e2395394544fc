use fundshare::application::handlers::reporting_handler;
use fundshare::application::services::funding_platform::FundingPlatform;
use fundshare::config::PlatformConfig;
use fundshare::infrastructure::notifier::LoggingNotifier;
use fundshare::persistence::repository::SqliteLedgerStore;
use fundshare::persistence::{init_database, DatabaseConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fundshare=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Fundshare server starting...");

    let config = PlatformConfig::from_env();
    config.validate()?;
    let db_config = DatabaseConfig::from_env();

    let pool = init_database(&db_config).await?;
    let store = Arc::new(SqliteLedgerStore::new(pool.clone()));
    let platform = FundingPlatform::new(store, Arc::new(LoggingNotifier), &config)?;

    let app = reporting_handler::router(platform);

    let addr = config.socket_addr()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}
