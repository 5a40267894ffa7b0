//! Google OAuth2 federation with PKCE.
//!
//! This is a browser-redirect flow: failures render plain pages, not the JSON
//! envelope. The `state` cookie equality check is the CSRF defense; both
//! transaction cookies are single-use and cleared as soon as the callback
//! consumes them, success or failure. The callback links or creates the local
//! account and then sends the browser to the app's landing page; it does not
//! mint auth cookies itself, the landing page drives a normal login.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use reqwest::Url;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::api::error::ApiError;
use super::cookies::{
    OAUTH_STATE_COOKIE_NAME, OAUTH_VERIFIER_COOKIE_NAME, clear_oauth_cookie, extract_cookie,
    oauth_cookie,
};
use super::state::{AuthConfig, AuthState, GoogleConfig};
use super::storage::upsert_federated_user;
use super::utils::normalize_email;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

/// Provider emails arrive in whatever case Google reports; store them the
/// same lowercased form local registration uses so account linking matches.
fn federated_identity(profile: &GoogleProfile) -> (String, String) {
    let email = normalize_email(&profile.email);
    let name = profile.name.clone().unwrap_or_else(|| email.clone());
    (email, name)
}

/// Random hex string for the CSRF `state` parameter.
fn random_state(len: usize) -> Result<String> {
    let bytes = random_bytes(len)?;
    Ok(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
}

/// Random base64url string usable as a PKCE code verifier.
fn random_verifier(len: usize) -> Result<String> {
    let bytes = random_bytes(len)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate random value")?;
    Ok(bytes)
}

/// `base64url(SHA-256(verifier))`, no padding (PKCE S256).
fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[utoipa::path(
    get,
    path = "/auth/google/login",
    responses(
        (status = 307, description = "Redirect to Google's consent screen; sets transaction cookies"),
        (status = 404, description = "Provider not configured")
    ),
    tag = "oauth"
)]
pub async fn google_login(
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let config = auth_state.config();
    let Some(google) = config.google() else {
        return Err(ApiError::not_found("Google login is not configured"));
    };

    let state = random_state(16)?;
    let verifier = random_verifier(64)?;
    let challenge = code_challenge(&verifier);

    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        oauth_cookie(config, OAUTH_STATE_COOKIE_NAME, &state)
            .map_err(|_| ApiError::internal("Invalid cookie value"))?,
    );
    headers.append(
        SET_COOKIE,
        oauth_cookie(config, OAUTH_VERIFIER_COOKIE_NAME, &verifier)
            .map_err(|_| ApiError::internal("Invalid cookie value"))?,
    );

    let url = Url::parse_with_params(
        GOOGLE_AUTH_URL,
        &[
            ("response_type", "code"),
            ("client_id", google.client_id()),
            ("redirect_uri", google.redirect_uri()),
            ("scope", "openid email profile"),
            ("state", state.as_str()),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .context("failed to build authorization url")?;

    Ok((headers, Redirect::temporary(url.as_str())))
}

/// Headers clearing both transaction cookies; attached to every callback
/// response once the cookies have been consumed.
fn clear_oauth_cookie_headers(config: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in [OAUTH_STATE_COOKIE_NAME, OAUTH_VERIFIER_COOKIE_NAME] {
        if let Ok(cookie) = clear_oauth_cookie(config, name) {
            headers.append(SET_COOKIE, cookie);
        }
    }
    headers
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    responses(
        (status = 307, description = "Account linked; redirect to the app landing page"),
        (status = 400, description = "Missing or mismatched OAuth transaction state"),
        (status = 500, description = "Code exchange failed")
    ),
    tag = "oauth"
)]
pub async fn google_callback(
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let config = auth_state.config();
    let Some(google) = config.google() else {
        return (StatusCode::NOT_FOUND, "Google login is not configured.").into_response();
    };

    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        return (StatusCode::BAD_REQUEST, "Missing code or state in callback.").into_response();
    };

    let cookie_state = extract_cookie(&headers, OAUTH_STATE_COOKIE_NAME);
    let cookie_verifier = extract_cookie(&headers, OAUTH_VERIFIER_COOKIE_NAME);
    let (Some(cookie_state), Some(verifier)) = (cookie_state, cookie_verifier) else {
        return (
            StatusCode::BAD_REQUEST,
            "Missing oauth cookies. Start the login flow again.",
        )
            .into_response();
    };

    let clear_headers = clear_oauth_cookie_headers(config);

    if returned_state != cookie_state {
        return (
            StatusCode::BAD_REQUEST,
            clear_headers,
            "Invalid state (possible CSRF).",
        )
            .into_response();
    }

    let profile = match exchange_code(google, &code, &verifier).await {
        Ok(profile) => profile,
        Err(err) => {
            error!("Google code exchange failed: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                clear_headers,
                "Failed to complete OAuth exchange.",
            )
                .into_response();
        }
    };

    let (email, name) = federated_identity(&profile);
    let user = match upsert_federated_user(
        &pool,
        "google",
        &email,
        &name,
        profile.picture.as_deref(),
    )
    .await
    {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to upsert federated user: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                clear_headers,
                "Failed to complete OAuth exchange.",
            )
                .into_response();
        }
    };

    info!(user_id = %user.id, "Google account linked");

    let landing = format!("{}/auth/success", config.app_origin());
    (clear_headers, Redirect::temporary(&landing)).into_response()
}

/// Exchange the authorization code + verifier for provider tokens, then fetch
/// the profile.
async fn exchange_code(
    google: &GoogleConfig,
    code: &str,
    verifier: &str,
) -> Result<GoogleProfile> {
    let client = reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build http client")?;

    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", google.client_id()),
        ("client_secret", google.client_secret().expose_secret()),
        ("redirect_uri", google.redirect_uri()),
        ("code_verifier", verifier),
    ];
    let response = client
        .post(GOOGLE_TOKEN_URL)
        .form(&params)
        .send()
        .await
        .context("token endpoint request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("token endpoint returned {status}: {body}");
    }

    let tokens: serde_json::Value = response
        .json()
        .await
        .context("failed to parse token response")?;
    let access_token = tokens["access_token"]
        .as_str()
        .context("no access token in response")?;

    let profile = client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(access_token)
        .send()
        .await
        .context("userinfo request failed")?
        .error_for_status()
        .context("userinfo endpoint rejected the token")?
        .json::<GoogleProfile>()
        .await
        .context("failed to parse userinfo response")?;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_challenge_matches_rfc_7636_vector() {
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn verifiers_are_unique_and_padding_free() -> Result<()> {
        let first = random_verifier(64)?;
        let second = random_verifier(64)?;
        assert_ne!(first, second);
        assert!(!first.contains('='));
        // 64 bytes encode to 86 chars, within RFC 7636's 43..=128 bound
        assert_eq!(first.len(), 86);
        Ok(())
    }

    #[test]
    fn federated_identity_lowercases_the_provider_email() {
        let (email, name) = federated_identity(&GoogleProfile {
            email: "Alice@Gmail.com".into(),
            name: None,
            picture: None,
        });
        assert_eq!(email, "alice@gmail.com");
        assert_eq!(name, "alice@gmail.com");

        let (email, name) = federated_identity(&GoogleProfile {
            email: " Bob@Example.COM ".into(),
            name: Some("Bob".into()),
            picture: None,
        });
        assert_eq!(email, "bob@example.com");
        assert_eq!(name, "Bob");
    }

    #[test]
    fn state_is_hex() -> Result<()> {
        let state = random_state(16)?;
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        Ok(())
    }
}
