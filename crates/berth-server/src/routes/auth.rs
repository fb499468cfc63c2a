//! Account and session routes.
//!
//! `register` and `login` are public; `logout` and `me` need a session.
//! The session token only ever travels in the `berth_session` cookie.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use berth_core::account::{Registration, UserProfile};
use berth_core::session::{SESSION_COOKIE, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::state::{AppState, CookieSettings};

/// Request body for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Response after a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserProfile,
    pub expires_at: DateTime<Utc>,
}

/// Routes reachable without a session.
pub fn public_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes that need a session.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

/// `POST /auth/register`: create an account.
async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<Registration>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let profile = state.accounts.register(body).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// `POST /auth/login`: check credentials and set the session cookie.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .accounts
        .authenticate(&body.username, &body.password)
        .await?;
    let (token, session) = state.sessions.issue(user.id, &user.username).await?;

    info!(user_id = %user.id, "login succeeded");
    let jar = jar.add(session_cookie(token, state.cookie));
    Ok((
        jar,
        Json(LoginResponse {
            user,
            expires_at: session.expires_at,
        }),
    ))
}

/// `POST /auth/logout`: revoke the session and clear the cookie.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.revoke(cookie.value()).await?;
    }
    info!(user_id = %session.user_id, "logged out");

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

/// `GET /auth/me`: the caller's profile.
async fn me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .accounts
        .find(&session.username)
        .await?
        .filter(|p| p.id == session.user_id)
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_owned()))?;
    Ok(Json(profile))
}

fn session_cookie(token: String, settings: CookieSettings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(settings.max_age_secs))
        .secure(settings.secure)
        .build()
}
