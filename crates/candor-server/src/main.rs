//! Candor Server
//!
//! Internal feedback service: managers write feedback for their direct
//! reports, employees acknowledge it. Reads are served from an in-memory
//! cache in front of SQLite, and writes fall back to the cache when the
//! database cannot be reached.

mod error;
mod extractors;
mod handlers;
mod services;
mod settings;
mod storage;

use anyhow::{Context, Result};
use candor_core::ports::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use services::{auth::hash_password, AuthService, FeedbackManager, UserDirectory};
use settings::Settings;
use storage::{Database, MemoryCache};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<MemoryCache>,
    pub users: Arc<UserDirectory>,
    pub feedback: Arc<FeedbackManager>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<MemoryCache>,
        jwt_secret: String,
        token_ttl: chrono::Duration,
    ) -> Self {
        let users = Arc::new(UserDirectory::new(store.clone(), cache.clone()));
        let feedback = Arc::new(FeedbackManager::new(
            store.clone(),
            cache.clone(),
            users.clone(),
        ));
        let auth_service = Arc::new(AuthService::new(users.clone(), jwt_secret, token_ttl));
        Self {
            store,
            cache,
            users,
            feedback,
            auth_service,
        }
    }
}

#[tokio::main]
async fn main() {
    // Set up panic hook to log crashes
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        eprintln!("[PANIC] at {:?}: {}", location, payload);
        tracing::error!("PANIC at {:?}: {}", location, payload);
    }));

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("[FATAL] {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
    {
        eprintln!("[FATAL] Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    info!("Starting Candor Server v{}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());

    if let Err(e) = run_server(settings).await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_server(settings: Settings) -> Result<()> {
    info!(
        "Config loaded: bind={}, db={}",
        settings.bind_address, settings.database_path
    );
    if settings.uses_default_secret() {
        warn!("jwt_secret not set, using default (insecure for production)");
    }

    info!("Initializing SQLite database...");
    let db = Arc::new(
        Database::new(&settings.database_path, settings.database.pool())
            .await
            .context("Failed to initialize database")?,
    );
    info!("SQLite database initialized at: {}", settings.database_path);

    let cache = Arc::new(MemoryCache::new(settings.cache.ttl()));
    let sweeper = cache.spawn_cleanup(settings.cache.sweep_interval());
    info!(
        "In-memory cache initialized (ttl={}s, sweep every {}s)",
        settings.cache.ttl_secs, settings.cache.sweep_interval_secs
    );

    let state = AppState::new(
        db,
        cache,
        settings.jwt_secret.clone(),
        settings.auth.token_ttl(),
    );

    if settings.bootstrap.enabled {
        let password_hash = hash_password(&settings.bootstrap.password)
            .context("Failed to hash bootstrap password")?;
        let written = state.users.seed_bootstrap(&password_hash).await;
        info!("Bootstrap users ready ({} newly stored)", written);
    }

    let app = handlers::router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = settings
        .bind_address
        .parse()
        .context("Failed to parse bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
