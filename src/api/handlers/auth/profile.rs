//! Authenticated profile endpoints: current user and password change.

use anyhow::Context;
use axum::{Json, extract::Extension, http::HeaderMap, http::StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use super::password::{hash_password, verify_password};
use super::principal::require_auth;
use super::state::AuthState;
use super::storage::{change_password, find_user_by_id};
use super::types::{ChangePasswordRequest, UserResponse};
use super::utils::validate_password;

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<ApiResponse, ApiError> {
    let claims = require_auth(&headers, auth_state.config())?;

    let Some(user) = find_user_by_id(&pool, claims.user_id).await? else {
        // Token outlived the account.
        return Err(ApiError::not_found("User not found"));
    };

    Ok(ApiResponse::new(
        StatusCode::OK,
        "User profile fetched successfully",
        serde_json::to_value(UserResponse::from_record(user))
            .context("failed to serialize user response")?,
    ))
}

#[utoipa::path(
    patch,
    path = "/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; other sessions revoked"),
        (status = 400, description = "New password matches the current one"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Validation failed")
    ),
    tag = "users"
)]
pub async fn update_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<ApiResponse, ApiError> {
    let claims = require_auth(&headers, auth_state.config())?;

    if let Some(error) = validate_password(&request.password, "password") {
        return Err(ApiError::validation(vec![error]));
    }

    let Some(user) = find_user_by_id(&pool, claims.user_id).await? else {
        return Err(ApiError::not_found("User not found"));
    };

    let stored_hash = user.password_hash.as_deref().unwrap_or("");
    let reused = verify_password(&request.password, stored_hash).unwrap_or_else(|err| {
        warn!(user_id = %user.id, "Stored password hash is malformed: {err:#}");
        false
    });
    if reused {
        return Err(ApiError::bad_request("Cannot reuse your old password"));
    }

    let new_hash = hash_password(&request.password)?;
    // The session used to make this change survives; every other one is
    // revoked.
    change_password(&pool, user.id, &new_hash, claims.session_id).await?;

    info!(user_id = %user.id, "Password changed, other sessions revoked");

    Ok(ApiResponse::new(
        StatusCode::OK,
        "Password changed successfully",
        Value::Null,
    ))
}
