// src/main.rs

use exam_hub::config::Config;
use exam_hub::routes;
use exam_hub::state::AppState;
use exam_hub::store::{MemoryStore, PgStore, SharedStore};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if config.uses_dev_jwt_secret() {
        tracing::warn!("JWT_SECRET not set, using the development secret");
    }

    // Pick the backend: Postgres when configured, otherwise everything lives in memory.
    let store: SharedStore = match &config.database_url {
        Some(url) => match PgStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!("Database unavailable: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    if config.github.is_none() {
        tracing::warn!("GitHub OAuth not configured, admin login is disabled");
    }

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid BIND_ADDR '{}': {}", config.bind_addr, e);
            std::process::exit(1);
        }
    };

    // Create AppState and the Axum application router
    let state = AppState::new(store, config);
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Connect info feeds the client IP fallback of the fingerprint endpoint.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
