//! Email verification: consuming links and resending them.

use axum::{Json, extract::Extension, http::StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::email::build_verify_url;
use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use super::state::AuthState;
use super::storage::{
    ConsumeOutcome, TokenPurpose, find_user_by_email, replace_one_time_token,
    verify_email_with_token,
};
use super::tokens::{generate_one_time_token, hash_one_time_token};
use super::types::{ResendVerificationRequest, VerifyEmailRequest};
use super::utils::normalize_email;

#[utoipa::path(
    post,
    path = "/auth/email/verify",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified"),
        (status = 401, description = "Invalid or expired link")
    ),
    tag = "auth"
)]
pub async fn verify_email(
    pool: Extension<PgPool>,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<ApiResponse, ApiError> {
    let token_hash = hash_one_time_token(request.token.trim());

    match verify_email_with_token(&pool, &token_hash).await? {
        ConsumeOutcome::Consumed => Ok(ApiResponse::new(
            StatusCode::OK,
            "Email verified successfully",
            Value::Null,
        )),
        ConsumeOutcome::InvalidOrExpired => {
            Err(ApiError::unauthorized("Invalid or expired verification link"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/email/resend",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Generic acknowledgement; never discloses account state")
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<ResendVerificationRequest>,
) -> Result<ApiResponse, ApiError> {
    let email = normalize_email(&request.email);

    // Unknown and already-verified accounts get the same acknowledgement as a
    // real resend, so this endpoint cannot be used to probe account state.
    let generic = || {
        ApiResponse::new(
            StatusCode::OK,
            "If that email needs verification, a new link has been sent.",
            Value::Null,
        )
    };

    let Some(user) = find_user_by_email(&pool, &email).await? else {
        return Ok(generic());
    };
    if user.email_verified {
        return Ok(generic());
    }

    let (raw_token, token_hash) = generate_one_time_token()?;
    replace_one_time_token(
        &pool,
        user.id,
        TokenPurpose::VerifyEmail,
        &token_hash,
        auth_state.config().one_time_token_ttl_minutes(),
    )
    .await?;

    let verify_url = build_verify_url(auth_state.config().app_origin(), &raw_token);
    if let Err(err) = auth_state.mailer().send_verification(&email, &verify_url) {
        warn!("Failed to send verification email: {err:#}");
    }

    info!(user_id = %user.id, "Verification email reissued");

    Ok(generic())
}
