//! Small helpers for auth input validation and client identification.

use regex::Regex;

use crate::api::error::FieldError;

const NAME_MIN: usize = 2;
const NAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 64;

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Validate an already-normalized email, reporting against the given field
/// path.
pub(super) fn validate_email(email_normalized: &str, path: &str) -> Option<FieldError> {
    if valid_email(email_normalized) {
        None
    } else {
        Some(FieldError::new(path, "Invalid email address"))
    }
}

pub(super) fn validate_name(name: &str) -> Option<FieldError> {
    let len = name.trim().chars().count();
    if (NAME_MIN..=NAME_MAX).contains(&len) {
        None
    } else {
        Some(FieldError::new(
            "name",
            format!("Name must be between {NAME_MIN} and {NAME_MAX} characters"),
        ))
    }
}

/// Validate a password, reporting against the caller's field path.
pub(super) fn validate_password(password: &str, path: &str) -> Option<FieldError> {
    let len = password.chars().count();
    if (PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        None
    } else {
        Some(FieldError::new(
            path,
            format!("Password must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"),
        ))
    }
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Extract a client IP from common proxy headers.
pub(super) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(super) fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// The `(user_agent, ip_address)` pair that identifies a device. Sessions are
/// unique per user on this pair, so missing headers collapse to a stable
/// placeholder instead of NULL.
pub(super) fn client_identity(headers: &axum::http::HeaderMap) -> (String, String) {
    let user_agent = extract_user_agent(headers).unwrap_or_else(|| "unknown".to_string());
    let ip_address = extract_client_ip(headers).unwrap_or_else(|| "unknown".to_string());
    (user_agent, ip_address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn validate_name_bounds() {
        assert!(validate_name("Jo").is_none());
        assert!(validate_name(&"x".repeat(50)).is_none());
        assert!(validate_name("J").is_some());
        assert!(validate_name(&"x".repeat(51)).is_some());
        // Leading/trailing whitespace does not count toward the length
        assert!(validate_name("  J  ").is_some());
    }

    #[test]
    fn validate_password_bounds_and_path() {
        assert!(validate_password("secret", "password").is_none());
        assert!(validate_password(&"x".repeat(64), "password").is_none());

        let err = validate_password("short", "password").expect("too short");
        assert_eq!(err.path, "password");
        assert!(validate_password(&"x".repeat(65), "password").is_some());
    }

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn client_identity_defaults_when_headers_missing() {
        let headers = HeaderMap::new();
        assert_eq!(
            client_identity(&headers),
            ("unknown".to_string(), "unknown".to_string())
        );
    }

    #[test]
    fn client_identity_reads_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("test-agent/1.0"));
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(
            client_identity(&headers),
            ("test-agent/1.0".to_string(), "9.9.9.9".to_string())
        );
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }
}
