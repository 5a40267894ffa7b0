//! Session management for the authenticated user.

use anyhow::Context;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use super::principal::require_auth;
use super::state::AuthState;
use super::storage::{delete_user_session, list_sessions};
use super::types::SessionResponse;

#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Caller's sessions, newest first, current one flagged", body = [SessionResponse]),
        (status = 401, description = "Not authenticated")
    ),
    tag = "sessions"
)]
pub async fn list(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<ApiResponse, ApiError> {
    let claims = require_auth(&headers, auth_state.config())?;

    let sessions: Vec<_> = list_sessions(&pool, claims.user_id)
        .await?
        .into_iter()
        .map(|row| SessionResponse::from_row(row, claims.session_id))
        .collect();

    Ok(ApiResponse::new(
        StatusCode::OK,
        "Sessions fetched successfully",
        serde_json::to_value(sessions).context("failed to serialize sessions")?,
    ))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such session for this user")
    ),
    tag = "sessions"
)]
pub async fn delete(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(session_id): Path<Uuid>,
) -> Result<ApiResponse, ApiError> {
    let claims = require_auth(&headers, auth_state.config())?;

    // Scoped to the caller: someone else's session id is indistinguishable
    // from a missing one.
    if !delete_user_session(&pool, claims.user_id, session_id).await? {
        return Err(ApiError::not_found("Session not found"));
    }

    info!(user_id = %claims.user_id, session_id = %session_id, "Session deleted");

    Ok(ApiResponse::new(
        StatusCode::OK,
        "Session deleted successfully",
        Value::Null,
    ))
}
