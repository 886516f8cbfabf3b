//! Prompt Library backend.
//!
//! Stores reusable text prompts in SQLite and serves filtered, sorted and
//! favorite-aware listings over a JSON API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod favorites;
pub mod filter;
pub mod models;
pub mod query;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::{IdentityService, LocalIdentity};
use config::Config;
use db::Repository;
use favorites::FavoritesLedger;
use filter::FilterRegistry;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub identity: Arc<dyn IdentityService>,
    pub favorites: FavoritesLedger,
    pub filters: Arc<FilterRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the services over a single repository.
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self {
            identity: Arc::new(LocalIdentity::new(repo.clone())),
            favorites: FavoritesLedger::new(repo.clone(), repo.clone()),
            filters: Arc::new(FilterRegistry::new(
                config.search_debounce,
                config.filter_session_idle,
                config.max_filter_sessions,
            )),
            config: Arc::new(config),
            repo,
        }
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let identity = state.identity.clone();

    // API routes
    let api_routes = Router::new()
        // Auth
        .route("/auth/register", post(api::register))
        .route("/auth/sign-in", post(api::sign_in))
        .route("/auth/provider", post(api::sign_in_with_provider))
        .route("/auth/sign-out", post(api::sign_out))
        .route("/auth/password-reset", post(api::send_password_reset))
        .route(
            "/auth/password-reset/confirm",
            post(api::confirm_password_reset),
        )
        .route("/auth/me", get(api::me))
        // Prompts
        .route("/prompts", post(api::create_prompt))
        .route("/prompts/public", get(api::list_public_prompts))
        .route("/prompts/library", get(api::list_library_prompts))
        .route(
            "/prompts/{id}",
            get(api::get_prompt)
                .put(api::update_prompt)
                .delete(api::delete_prompt),
        )
        // Favorites
        .route("/favorites", get(api::list_favorites))
        .route("/favorites/check", post(api::check_favorites))
        .route("/favorites/{prompt_id}", get(api::get_favorite_status))
        .route("/favorites/{prompt_id}/toggle", post(api::toggle_favorite))
        // Filter state
        .route("/filter", get(api::get_filter))
        .route("/filter/actions", post(api::dispatch_filter_action))
        // Resolve bearer sessions
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(identity.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
