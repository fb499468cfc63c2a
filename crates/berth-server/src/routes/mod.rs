//! HTTP route handlers.
//!
//! Everything except `/health`, `/auth/register`, and `/auth/login` sits
//! behind the session middleware.

pub mod auth;
pub mod projects;
pub mod resources;
pub mod sys;

use std::sync::Arc;

use axum::Router;
use axum::middleware as axum_mw;

use crate::middleware::session_middleware;
use crate::state::AppState;

/// Concurrent requests allowed on the password-checking routes.
const AUTH_CONCURRENCY_LIMIT: usize = 16;

/// Build the API router with its state applied.
pub fn router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .merge(auth::router())
        .merge(projects::router())
        .merge(resources::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            session_middleware,
        ));

    // Password hashing is the expensive path; cap it.
    let public_auth = Router::new()
        .merge(auth::public_router())
        .layer(tower::limit::ConcurrencyLimitLayer::new(
            AUTH_CONCURRENCY_LIMIT,
        ));

    Router::new()
        .merge(sys::router())
        .merge(public_auth)
        .merge(authenticated)
        .with_state(state)
}
