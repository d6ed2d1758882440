use coin_stats_monitor::{
    config::{LogFormat, Settings, StoreBackend},
    database::{establish_connection, run_migrations},
    handlers::create_router,
    services::{CoinGeckoClient, HistoryStore, InMemoryHistoryStore, PriceCollector, PriceStorageService},
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (.env first, then the process environment)
    let settings = Settings::new()?;

    init_tracing(&settings);
    info!("Starting Coin Stats Monitor");
    info!("Tracking assets: {}", settings.collector.tracked_assets.join(", "));

    let store = open_store(&settings).await?;

    // Start the collector: first cycle fires immediately
    let source = Arc::new(CoinGeckoClient::new(&settings.price_source)?);
    let collector = Arc::new(PriceCollector::new(source, store.clone(), &settings.collector));
    let collector_handle = collector.clone().spawn();

    let app_state = AppState::new(store.clone(), settings.stats.deviation_window, Some(collector));
    let app = create_router(app_state);

    let addr: SocketAddr = format!("{}:{}", settings.api.host, settings.api.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server running on {}", addr);
    info!("  GET /stats?coin=<asset_id>     - Latest price, market cap and 24h change");
    info!("  GET /deviation?coin=<asset_id> - Std deviation of the last {} prices", settings.stats.deviation_window);
    info!("  GET /health                    - Store and collector status");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!("Web server error: {}", e);
    }

    info!("Shutting down Coin Stats Monitor");
    collector_handle.abort();
    store.close().await;
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn HistoryStore>, Box<dyn std::error::Error>> {
    match settings.database.backend {
        StoreBackend::Postgres => {
            let db_pool = establish_connection(&settings.database.url, settings.database.max_connections).await?;
            run_migrations(&db_pool).await?;
            info!("Using Postgres history store");
            Ok(Arc::new(
                PriceStorageService::new(db_pool)
                    .with_unique_timestamps(settings.database.enforce_unique_timestamps),
            ))
        }
        StoreBackend::Memory => {
            info!("Using in-memory history store; history is lost on exit");
            Ok(Arc::new(
                InMemoryHistoryStore::new()
                    .with_unique_timestamps(settings.database.enforce_unique_timestamps),
            ))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
