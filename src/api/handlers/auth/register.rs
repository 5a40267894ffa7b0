//! Account registration.

use anyhow::Context;
use axum::{Json, extract::Extension, http::StatusCode};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::email::build_verify_url;
use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use super::state::AuthState;
use super::storage::{InsertUserOutcome, TokenPurpose, insert_user, replace_one_time_token};
use super::tokens::generate_one_time_token;
use super::types::{RegisterRequest, UserResponse};
use super::password;
use super::utils::{normalize_email, validate_email, validate_name, validate_password};

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created; verification email queued", body = UserResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed")
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<ApiResponse, ApiError> {
    let email = normalize_email(&request.email);

    let errors: Vec<_> = [
        validate_name(&request.name),
        validate_email(&email, "email"),
        validate_password(&request.password, "password"),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let password_hash = password::hash_password(&request.password)?;
    let user = match insert_user(&pool, request.name.trim(), &email, &password_hash).await? {
        InsertUserOutcome::Created(user) => user,
        InsertUserOutcome::Conflict => {
            return Err(ApiError::conflict("User already exists with this email"));
        }
    };

    // Raw token only travels in the email link; the database holds the hash.
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
        // The account exists and the user can request a resend.
        warn!("Failed to send verification email: {err:#}");
    }

    info!(user_id = %user.id, "User registered");

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        "User registered successfully. Please verify your email.",
        serde_json::to_value(UserResponse::from_record(user))
            .context("failed to serialize user response")?,
    ))
}
