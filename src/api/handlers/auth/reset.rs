//! Password recovery: forgot-password links and token-based reset.

use axum::{Json, extract::Extension, http::StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::email::build_reset_url;
use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use super::password::{hash_password, verify_password};
use super::state::AuthState;
use super::storage::{
    ConsumeOutcome, TokenPurpose, find_user_by_email, find_user_by_one_time_token,
    replace_one_time_token, reset_password_with_token,
};
use super::tokens::{generate_one_time_token, hash_one_time_token};
use super::types::{ForgotPasswordRequest, ResetPasswordRequest};
use super::utils::{normalize_email, validate_password};

#[utoipa::path(
    post,
    path = "/auth/password/forgot",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Generic acknowledgement; never discloses account state")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<ApiResponse, ApiError> {
    let email = normalize_email(&request.email);

    // Same acknowledgement whether or not the account exists.
    let generic = || {
        ApiResponse::new(
            StatusCode::OK,
            "If an account exists for that email, a reset link has been sent.",
            Value::Null,
        )
    };

    let Some(user) = find_user_by_email(&pool, &email).await? else {
        return Ok(generic());
    };

    let (raw_token, token_hash) = generate_one_time_token()?;
    replace_one_time_token(
        &pool,
        user.id,
        TokenPurpose::ResetPassword,
        &token_hash,
        auth_state.config().one_time_token_ttl_minutes(),
    )
    .await?;

    let reset_url = build_reset_url(auth_state.config().app_origin(), &raw_token);
    if let Err(err) = auth_state.mailer().send_password_reset(&email, &reset_url) {
        warn!("Failed to send password reset email: {err:#}");
    }

    info!(user_id = %user.id, "Password reset email issued");

    Ok(generic())
}

#[utoipa::path(
    post,
    path = "/auth/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset; every session revoked"),
        (status = 400, description = "New password matches the old one"),
        (status = 401, description = "Invalid or expired reset link"),
        (status = 422, description = "Validation failed")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<ApiResponse, ApiError> {
    if let Some(error) = validate_password(&request.password, "password") {
        return Err(ApiError::validation(vec![error]));
    }

    let token_hash = hash_one_time_token(request.token.trim());

    let Some(user) =
        find_user_by_one_time_token(&pool, TokenPurpose::ResetPassword, &token_hash).await?
    else {
        return Err(ApiError::unauthorized("Invalid or expired reset link"));
    };

    // Verify-in-reverse: if the new password matches the stored hash, the
    // user is trying to keep their old password.
    let old_hash = user.password_hash.as_deref().unwrap_or("");
    let reused = verify_password(&request.password, old_hash).unwrap_or(false);
    if reused {
        return Err(ApiError::bad_request("Cannot reuse your old password"));
    }

    let new_hash = hash_password(&request.password)?;
    match reset_password_with_token(&pool, &token_hash, &new_hash).await? {
        ConsumeOutcome::Consumed => {}
        // The token was consumed between the lookup and the transaction.
        ConsumeOutcome::InvalidOrExpired => {
            return Err(ApiError::unauthorized("Invalid or expired reset link"));
        }
    }

    info!(user_id = %user.id, "Password reset, all sessions revoked");

    Ok(ApiResponse::new(
        StatusCode::OK,
        "Password reset successfully. Please log in again.",
        Value::Null,
    ))
}
