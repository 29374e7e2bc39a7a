//! Pro Notify Backend
//!
//! Notification backend for professional accounts: SQLite persistence, a
//! change hub, and live per-professional feeds with reconnect and polling
//! fallback.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod feed;
mod grouping;
mod models;
mod sound;
mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use feed::FeedRegistry;
use sound::AlertService;
use store::SqliteNotificationStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub feeds: Arc<FeedRegistry<SqliteNotificationStore>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the store, alert service and feed registry around a repository.
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let store = Arc::new(SqliteNotificationStore::new(repo.clone()));
        let notifier = Arc::new(AlertService::new(repo.clone()));
        let feeds = Arc::new(FeedRegistry::new(store, notifier, config.feed.clone()));
        Self {
            repo,
            feeds,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Pro Notify Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        limit = config.feed.limit,
        max_retries = config.feed.max_retries,
        retry_base_ms = config.feed.retry_base_delay.as_millis() as u64,
        poll_interval_secs = config.feed.poll_interval.as_secs(),
        "Feed settings"
    );

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (PRONOTIFY_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let bind_addr = config.bind_addr;
    let state = AppState::new(repo, config);
    let feeds = state.feeds.clone();

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    feeds.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    let professional_routes = Router::new()
        // Store-backed notifications
        .route(
            "/notifications",
            get(api::list_notifications).post(api::create_notification),
        )
        .route("/notifications/grouped", get(api::list_grouped_notifications))
        // Live feed
        .route("/feed", get(api::get_feed).delete(api::stop_feed))
        .route("/feed/refresh", post(api::refresh_feed))
        .route("/feed/read-all", put(api::mark_feed_all_read))
        .route("/feed/{id}", delete(api::remove_feed_notification))
        .route("/feed/{id}/read", put(api::mark_feed_notification_read))
        // Preferences
        .route(
            "/settings",
            get(api::get_settings).put(api::update_settings),
        );

    // API routes
    let api_routes = Router::new()
        .nest("/professionals/{professional_id}", professional_routes)
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
