//! Hand-built `Set-Cookie` headers for auth and `OAuth` transaction cookies.
//!
//! Access/refresh cookies are `SameSite=None` so a frontend on a different
//! origin can send them; browsers require `Secure` for that, which follows
//! from the app origin scheme. The short-lived `OAuth` state cookies only
//! travel on the top-level redirect back from the provider, so `Lax` is
//! enough.

use axum::http::{HeaderMap, HeaderValue, header::InvalidHeaderValue};

use super::state::AuthConfig;

pub(super) const ACCESS_COOKIE_NAME: &str = "accessToken";
pub(super) const REFRESH_COOKIE_NAME: &str = "refreshToken";
pub(super) const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";
pub(super) const OAUTH_VERIFIER_COOKIE_NAME: &str = "oauth_code_verifier";

const OAUTH_COOKIE_TTL_SECONDS: i64 = 10 * 60;

fn auth_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=None; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn access_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    auth_cookie(
        config,
        ACCESS_COOKIE_NAME,
        token,
        config.access_token_ttl_seconds(),
    )
}

pub(super) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    auth_cookie(
        config,
        REFRESH_COOKIE_NAME,
        token,
        config.refresh_token_ttl_seconds(),
    )
}

pub(super) fn clear_access_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    auth_cookie(config, ACCESS_COOKIE_NAME, "", 0)
}

pub(super) fn clear_refresh_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    auth_cookie(config, REFRESH_COOKIE_NAME, "", 0)
}

/// Short-lived cookie carrying `OAuth` transaction state across the provider
/// redirect.
pub(super) fn oauth_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={OAUTH_COOKIE_TTL_SECONDS}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_oauth_cookie(
    config: &AuthConfig,
    name: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Find a cookie value in the request `Cookie` header.
pub(super) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        if let Some((key, val)) = pair.trim().split_once('=') {
            if key.trim() == name {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use secrecy::SecretString;

    fn https_config() -> AuthConfig {
        AuthConfig::new(
            "https://app.ensaluti.dev".to_string(),
            SecretString::from("a"),
            SecretString::from("r"),
        )
    }

    fn http_config() -> AuthConfig {
        AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("a"),
            SecretString::from("r"),
        )
    }

    #[test]
    fn access_cookie_is_secure_over_https() {
        let cookie = access_cookie(&https_config(), "token").expect("valid header");
        let value = cookie.to_str().expect("ascii");
        assert!(value.starts_with("accessToken=token; "));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=None"));
        assert!(value.contains("Max-Age=900"));
        assert!(value.ends_with("; Secure"));
    }

    #[test]
    fn access_cookie_is_plain_over_http() {
        let cookie = access_cookie(&http_config(), "token").expect("valid header");
        assert!(!cookie.to_str().expect("ascii").contains("Secure"));
    }

    #[test]
    fn refresh_cookie_uses_refresh_ttl() {
        let cookie = refresh_cookie(&https_config(), "token").expect("valid header");
        assert!(cookie.to_str().expect("ascii").contains("Max-Age=604800"));
    }

    #[test]
    fn clear_cookies_zero_max_age() {
        let cookie = clear_refresh_cookie(&https_config()).expect("valid header");
        let value = cookie.to_str().expect("ascii");
        assert!(value.starts_with("refreshToken=; "));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn oauth_cookie_is_lax_and_short_lived() {
        let cookie =
            oauth_cookie(&https_config(), OAUTH_STATE_COOKIE_NAME, "xyz").expect("valid header");
        let value = cookie.to_str().expect("ascii");
        assert!(value.starts_with("oauth_state=xyz; "));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=600"));
    }

    #[test]
    fn extract_cookie_finds_named_pair() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            "accessToken=abc; refreshToken=def".parse().expect("ascii"),
        );
        assert_eq!(
            extract_cookie(&headers, ACCESS_COOKIE_NAME),
            Some("abc".to_string())
        );
        assert_eq!(
            extract_cookie(&headers, REFRESH_COOKIE_NAME),
            Some("def".to_string())
        );
        assert_eq!(extract_cookie(&headers, "other"), None);
    }
}
