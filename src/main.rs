use anyhow::{Context, Result};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferret::analytics::GeoIpService;
use ferret::config::{Config, DatabaseBackend};
use ferret::logging::RequestLogger;
use ferret::storage::{PostgresStorage, SqliteStorage, Storage};
use ferret::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Console diagnostics; request and error logs go to files
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferret=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let logger = RequestLogger::new(&config.logging.dir)?;
    info!("Writing access and error logs to {}", logger.dir().display());

    let storage = match connect_storage(&config).await {
        Ok(storage) => storage,
        Err(err) => {
            tracing::error!("Failed to initialize database: {err:#}");
            logger.error(json!({
                "event": "startup_error",
                "message": err.to_string(),
                "stack": format!("{err:?}"),
            }));
            return Err(err);
        }
    };
    logger.info(json!({
        "event": "database_connected",
        "backend": config.database.backend,
    }));

    let geoip = match GeoIpService::new(config.analytics.geoip_db_path.as_deref()) {
        Ok(service) => {
            if service.is_enabled() {
                info!("GeoIP country lookup enabled");
            } else {
                info!("GEOIP_DB_PATH not set, clicks will be attributed to 'unknown'");
            }
            service
        }
        Err(err) => {
            warn!("{err:#}; continuing without GeoIP lookup");
            GeoIpService::disabled()
        }
    };

    let bind_addr = config.server.bind_addr();
    let app = create_router(AppState {
        storage,
        geoip: Arc::new(geoip),
        logger: logger.clone(),
        public_host: bind_addr.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    info!("🚀 Server listening on http://{}", bind_addr);
    logger.info(json!({ "event": "server_started", "port": config.server.port }));

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    logger.info(json!({ "event": "server_stopped" }));
    info!("Server stopped");

    Ok(())
}

async fn connect_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage");
            Arc::new(
                PostgresStorage::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
    };

    info!("Initializing database...");
    storage.init().await.context("Failed to create tables")?;
    info!("Database initialized successfully");

    Ok(storage)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
