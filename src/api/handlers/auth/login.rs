//! Credential login, logout, and refresh-token rotation.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use super::cookies::{
    REFRESH_COOKIE_NAME, access_cookie, clear_access_cookie, clear_refresh_cookie, extract_cookie,
    refresh_cookie,
};
use super::password::verify_password;
use super::state::{AuthConfig, AuthState};
use super::storage::{delete_session, extend_session, find_session, find_user_by_email, upsert_session};
use super::tokens::{TokenError, TokenKind, TokenPayload, sign_token, verify_token};
use super::types::LoginRequest;
use super::utils::{client_identity, normalize_email};

/// `Set-Cookie` headers for a fresh access+refresh pair.
pub(super) fn auth_cookie_headers(
    config: &AuthConfig,
    payload: &TokenPayload,
) -> Result<HeaderMap, ApiError> {
    let access = sign_token(payload, TokenKind::Access, config)?;
    let refresh = sign_token(payload, TokenKind::Refresh, config)?;

    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        access_cookie(config, &access).map_err(|_| ApiError::internal("Invalid cookie value"))?,
    );
    headers.append(
        SET_COOKIE,
        refresh_cookie(config, &refresh).map_err(|_| ApiError::internal("Invalid cookie value"))?,
    );
    Ok(headers)
}

fn clear_auth_cookie_headers(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_access_cookie(config) {
        headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_refresh_cookie(config) {
        headers.append(SET_COOKIE, cookie);
    }
    headers
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Logged in; auth cookies set"),
        (status = 401, description = "Invalid credentials or unverified email")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = auth_state.config();
    let email = normalize_email(&request.email);

    // One generic failure for unknown email and wrong password alike.
    let invalid = || ApiError::unauthorized("Invalid email or password");

    let Some(user) = find_user_by_email(&pool, &email).await? else {
        return Err(invalid());
    };

    // OAuth-only accounts have no hash; verifying against the empty string is
    // a guaranteed mismatch rather than a special case.
    let stored_hash = user.password_hash.as_deref().unwrap_or("");
    let matches = verify_password(&request.password, stored_hash).unwrap_or_else(|err| {
        warn!(user_id = %user.id, "Stored password hash is malformed: {err:#}");
        false
    });
    if !matches {
        return Err(invalid());
    }

    if !user.email_verified {
        return Err(ApiError::unauthorized("Please verify your email first"));
    }

    let (user_agent, ip_address) = client_identity(&headers);
    let session_id = upsert_session(
        &pool,
        user.id,
        &user_agent,
        &ip_address,
        config.refresh_token_ttl_seconds(),
    )
    .await?;

    let payload = TokenPayload {
        user_id: user.id,
        session_id,
        email: user.email,
        role: user.role,
    };
    let cookie_headers = auth_cookie_headers(config, &payload)?;

    info!(user_id = %payload.user_id, session_id = %session_id, "User logged in");

    Ok((
        cookie_headers,
        ApiResponse::new(StatusCode::CREATED, "Logged in successfully", Value::Null),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Auth cookies cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let config = auth_state.config();

    // Best-effort session teardown: an absent or invalid refresh cookie still
    // results in cleared cookies and a 200.
    match extract_cookie(&headers, REFRESH_COOKIE_NAME) {
        None => warn!("Logout without refresh cookie"),
        Some(token) => match verify_token(&token, TokenKind::Refresh, config) {
            Ok(payload) => {
                if let Err(err) = delete_session(&pool, payload.session_id).await {
                    warn!(session_id = %payload.session_id, "Failed to delete session: {err:#}");
                }
            }
            Err(_) => warn!("Logout with unverifiable refresh token"),
        },
    }

    Ok((
        clear_auth_cookie_headers(config),
        ApiResponse::new(StatusCode::OK, "Logged out successfully", Value::Null),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair issued; cookies set"),
        (status = 401, description = "Refresh rejected")
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let config = auth_state.config();

    let Some(token) = extract_cookie(&headers, REFRESH_COOKIE_NAME) else {
        return Err(ApiError::unauthorized("Authentication required"));
    };
    let payload = match verify_token(&token, TokenKind::Refresh, config) {
        Ok(payload) => payload,
        Err(TokenError::Expired) => {
            return Err(ApiError::unauthorized(
                "Refresh token expired, please log in again",
            ));
        }
        Err(TokenError::Invalid) => {
            return Err(ApiError::unauthorized("Invalid refresh token"));
        }
    };

    let Some(session) = find_session(&pool, payload.session_id).await? else {
        return Err(ApiError::unauthorized("Session is used or invalid"));
    };
    if session.expires_at < Utc::now() {
        // The stale row is left for lazy cleanup.
        return Err(ApiError::unauthorized("Session expired, please log in again"));
    }

    // Theft detection: a refresh token replayed from a different device or
    // network kills the whole session, not just this attempt.
    let (user_agent, ip_address) = client_identity(&headers);
    if session.user_agent != user_agent || session.ip_address != ip_address {
        if let Err(err) = delete_session(&pool, session.id).await {
            warn!(session_id = %session.id, "Failed to delete mismatched session: {err:#}");
        }
        warn!(
            session_id = %session.id,
            user_id = %session.user_id,
            "Refresh device mismatch, session revoked"
        );
        return Err(ApiError::unauthorized(
            "Session mismatch, possible stolen token",
        ));
    }

    extend_session(&pool, session.id, config.refresh_token_ttl_seconds()).await?;

    let cookie_headers = auth_cookie_headers(config, &payload)?;

    Ok((
        cookie_headers,
        ApiResponse::new(StatusCode::OK, "Tokens refreshed", Value::Null),
    ))
}
