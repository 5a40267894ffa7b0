//! Request authentication from the access-token cookie.
//!
//! Access tokens are verified purely from their signature; no database hit.
//! Expiry is reported with a distinct message so clients know to call the
//! refresh endpoint instead of sending the user back to login.

use axum::http::HeaderMap;

use crate::api::error::ApiError;
use super::cookies::{ACCESS_COOKIE_NAME, extract_cookie};
use super::state::AuthConfig;
use super::tokens::{TokenError, TokenKind, TokenPayload, verify_token};

/// Authenticate a request, yielding the token's claims.
pub(super) fn require_auth(
    headers: &HeaderMap,
    config: &AuthConfig,
) -> Result<TokenPayload, ApiError> {
    let Some(token) = extract_cookie(headers, ACCESS_COOKIE_NAME) else {
        return Err(ApiError::unauthorized("Authentication required"));
    };
    match verify_token(&token, TokenKind::Access, config) {
        Ok(payload) => Ok(payload),
        Err(TokenError::Expired) => Err(ApiError::unauthorized("Access token expired")),
        Err(TokenError::Invalid) => Err(ApiError::unauthorized("Invalid access token")),
    }
}

/// Authenticate a request and require the `admin` role.
pub(super) fn require_admin(
    headers: &HeaderMap,
    config: &AuthConfig,
) -> Result<TokenPayload, ApiError> {
    let payload = require_auth(headers, config)?;
    if payload.role == "admin" {
        Ok(payload)
    } else {
        Err(ApiError::forbidden("Admin access required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::tokens::sign_token;
    use axum::http::{HeaderMap, StatusCode};
    use secrecy::SecretString;
    use uuid::Uuid;

    fn config() -> AuthConfig {
        AuthConfig::new(
            "https://app.ensaluti.dev".to_string(),
            SecretString::from("access-secret-long-enough-for-hmac"),
            SecretString::from("refresh-secret-long-enough-for-hmac"),
        )
    }

    fn payload(role: &str) -> TokenPayload {
        TokenPayload {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            role: role.to_string(),
        }
    }

    fn headers_with_access_cookie(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            format!("accessToken={token}").parse().expect("ascii"),
        );
        headers
    }

    #[test]
    fn missing_cookie_is_unauthorized() {
        let err = require_auth(&HeaderMap::new(), &config()).expect_err("no cookie");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn valid_token_authenticates() {
        let config = config();
        let payload = payload("user");
        let token = sign_token(&payload, TokenKind::Access, &config).expect("sign");

        let claims =
            require_auth(&headers_with_access_cookie(&token), &config).expect("should pass");
        assert_eq!(claims, payload);
    }

    #[test]
    fn refresh_token_is_rejected_as_access() {
        let config = config();
        let token = sign_token(&payload("user"), TokenKind::Refresh, &config).expect("sign");

        let err =
            require_auth(&headers_with_access_cookie(&token), &config).expect_err("wrong kind");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn admin_guard_checks_role() {
        let config = config();

        let user_token = sign_token(&payload("user"), TokenKind::Access, &config).expect("sign");
        let err = require_admin(&headers_with_access_cookie(&user_token), &config)
            .expect_err("not admin");
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let admin_token = sign_token(&payload("admin"), TokenKind::Access, &config).expect("sign");
        let claims = require_admin(&headers_with_access_cookie(&admin_token), &config)
            .expect("admin passes");
        assert_eq!(claims.role, "admin");
    }
}
