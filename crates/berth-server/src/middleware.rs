//! Session middleware.
//!
//! Reads the `berth_session` cookie, resolves it through the session store,
//! and injects the resulting [`Session`] into the request extensions for
//! downstream handlers. Requests without a live session get a 401 before
//! any domain data is touched.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use berth_core::session::{SESSION_COOKIE, Session};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Require a valid session cookie.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        return AppError::Unauthorized("missing session cookie".to_owned()).into_response();
    };

    match state.sessions.lookup(&token).await {
        Ok(session) => {
            req.extensions_mut().insert::<Session>(session);
            next.run(req).await
        }
        Err(e) => {
            debug!(error = %e, path = %req.uri().path(), "session rejected");
            AppError::from(e).into_response()
        }
    }
}
