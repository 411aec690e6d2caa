//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use axum::{
    Json, Router, http,
    http::{Method, header},
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose;
use poll::domain::repository::PollRepository;
use poll::presentation::handlers::PollAppState;
use poll::{
    ExpirePollsUseCase, InMemoryPollRepository, PgPollRepository, PollConfig,
    poll_router_with_state,
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 31113;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,poll=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;

    let port = match env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => DEFAULT_PORT,
    };

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:5173,http://127.0.0.1:5173".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE, header::ACCEPT]))
        .allow_credentials(true);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    match env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;

            tracing::info!("Connected to database");

            // Run migrations
            sqlx::migrate!("../../../database/migrations")
                .run(&pool)
                .await?;

            tracing::info!("Migrations completed");

            serve(PgPollRepository::new(pool), config, cors, addr).await
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, polls are kept in memory only");
            serve(InMemoryPollRepository::new(), config, cors, addr).await
        }
    }
}

/// Poll configuration from the environment
fn load_config() -> anyhow::Result<PollConfig> {
    let mut config = if cfg!(debug_assertions) {
        PollConfig::development()
    } else {
        // In production, load secret from environment
        let secret_b64 = env::var("POLL_VISITOR_SECRET")
            .map_err(|_| anyhow::anyhow!("POLL_VISITOR_SECRET must be set in production"))?;
        let secret_bytes = Engine::decode(&general_purpose::STANDARD, secret_b64.trim())?;
        let secret: [u8; 32] = secret_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("POLL_VISITOR_SECRET must decode to 32 bytes"))?;
        PollConfig {
            visitor_secret: secret,
            ..PollConfig::default()
        }
    };

    if let Ok(frontend_url) = env::var("FRONTEND_URL") {
        config.frontend_url = frontend_url;
    }
    if let Ok(trust) = env::var("TRUST_FORWARDED_FOR") {
        config.trust_forwarded_for = matches!(trust.trim(), "1" | "true" | "yes");
    }
    Ok(config)
}

async fn serve<R>(
    repo: R,
    config: PollConfig,
    cors: CorsLayer,
    addr: SocketAddr,
) -> anyhow::Result<()>
where
    R: PollRepository + Send + Sync + 'static,
{
    let sweep_interval = config.sweep_interval;
    let state = PollAppState::new(repo, config);

    // Expired polls are removed at startup and then periodically;
    // failures are logged and never stop the server
    ExpirePollsUseCase::new(state.repo.clone(), state.config.retention).spawn(sweep_interval);
    spawn_housekeeping(state.clone(), sweep_interval);

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/polls", poll_router_with_state(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Drop stale request counters and empty broadcast rooms
fn spawn_housekeeping<R>(state: PollAppState<R>, interval: std::time::Duration)
where
    R: PollRepository + Send + Sync + 'static,
{
    let rate_limits = Arc::clone(&state.rate_limits);
    let hub = Arc::clone(&state.hub);
    let window_ms = [
        &state.config.api_rate_limit,
        &state.config.create_rate_limit,
        &state.config.vote_rate_limit,
    ]
    .iter()
    .map(|limit| limit.window_ms())
    .max()
    .unwrap_or_default();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let counters = rate_limits.prune(window_ms, chrono::Utc::now().timestamp_millis());
            let rooms = hub.prune();
            tracing::debug!(counters, rooms, "Housekeeping completed");
        }
    });
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now(),
    }))
}
