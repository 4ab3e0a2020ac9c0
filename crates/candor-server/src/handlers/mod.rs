//! HTTP handlers

pub mod auth;
pub mod feedback;
pub mod team;
pub mod users;

use crate::storage::CacheStats;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store_reachable: bool,
    cache: CacheStats,
}

/// Liveness plus store reachability. Always 200: the service keeps answering
/// from the cache while the store is down.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_reachable = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check: store unreachable: {}", e);
            false
        }
    };

    Json(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store_reachable,
        cache: state.cache.stats(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/auth/user", get(auth::current_user))
        .route("/admin/users", get(users::list).post(users::create))
        .route("/admin/users/:id/role", patch(users::update_role))
        .route("/admin/feedback", get(feedback::list_all))
        .route("/user/role", patch(users::update_own_role))
        .route("/feedback", post(feedback::create))
        .route("/feedback/:id", put(feedback::update))
        .route("/feedback/:id/acknowledge", patch(feedback::acknowledge))
        .route("/feedback/manager", get(feedback::for_manager))
        .route("/feedback/employee", get(feedback::for_self))
        .route("/feedback/employee/:id", get(feedback::for_employee))
        .route("/team", get(team::members))
}
