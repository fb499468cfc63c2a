//! Request extractors whose rejections render as [`AppError`] bodies.

use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json` with malformed bodies reported as `{error, message}` JSON.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
