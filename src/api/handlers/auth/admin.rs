//! Admin-only user and session administration.

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
use super::principal::require_admin;
use super::state::AuthState;
use super::storage::{delete_session, list_sessions, list_users};
use super::types::{SessionResponse, UserResponse};

#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users except the caller", body = [UserResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    ),
    tag = "admin"
)]
pub async fn users(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<ApiResponse, ApiError> {
    let claims = require_admin(&headers, auth_state.config())?;

    let users: Vec<_> = list_users(&pool, claims.user_id)
        .await?
        .into_iter()
        .map(UserResponse::from_record)
        .collect();

    Ok(ApiResponse::new(
        StatusCode::OK,
        "Users fetched successfully",
        serde_json::to_value(users).context("failed to serialize users")?,
    ))
}

#[utoipa::path(
    get,
    path = "/admin/users/{user_id}/sessions",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Sessions of the given user", body = [SessionResponse]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    ),
    tag = "admin"
)]
pub async fn user_sessions(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(user_id): Path<Uuid>,
) -> Result<ApiResponse, ApiError> {
    let claims = require_admin(&headers, auth_state.config())?;

    let sessions: Vec<_> = list_sessions(&pool, user_id)
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
    path = "/admin/users/sessions/{session_id}",
    params(("session_id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No such session")
    ),
    tag = "admin"
)]
pub async fn delete_user_session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(session_id): Path<Uuid>,
) -> Result<ApiResponse, ApiError> {
    let claims = require_admin(&headers, auth_state.config())?;

    if !delete_session(&pool, session_id).await? {
        return Err(ApiError::not_found("Session not found"));
    }

    info!(admin_id = %claims.user_id, session_id = %session_id, "Session deleted by admin");

    Ok(ApiResponse::new(
        StatusCode::OK,
        "Session deleted successfully",
        Value::Null,
    ))
}
