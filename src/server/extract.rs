//! Request extractors whose rejections answer with the API error body.

use axum::extract::{FromRequest, FromRequestParts};

use crate::server::error::ServerError;

/// `axum::Json` with malformed bodies reported as `validation_error`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with malformed query strings reported as `validation_error`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct ApiQuery<T>(pub T);
