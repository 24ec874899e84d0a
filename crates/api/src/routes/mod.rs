//! API routes

pub mod auth;
pub mod dashboard;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    auth::{require_auth, require_role, RoleGate},
    state::AppState,
};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness));

    // Public API routes (no auth required)
    let public_api_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login));

    // Admin-only routes; the role gate reads what require_auth attached
    let admin_api_routes = Router::new()
        .route("/auth/admins", post(auth::create_admin))
        .route("/dashboard/admin", get(dashboard::admin_dashboard))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::ADMIN_ONLY,
            require_role,
        ));

    // Protected API routes (auth required)
    let protected_api_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/dashboard/user", get(dashboard::user_dashboard))
        .merge(admin_api_routes)
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    let api_routes = Router::new()
        .merge(public_api_routes)
        .merge(protected_api_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
