//! # Ensaluti (Authentication & Session Management)
//!
//! `ensaluti` is an authentication and session lifecycle service. It handles
//! password-based registration and login, short-lived access tokens with
//! refresh-token rotation, device-bound sessions, one-time token flows for
//! email verification and password reset, and Google OAuth federation (PKCE).
//!
//! ## Sessions & Tokens
//!
//! A session binds a user to a device fingerprint (IP + User-Agent) with an
//! expiry. Repeat logins from the same device renew the existing session row
//! instead of creating a new one. Access and refresh tokens are HS256-signed
//! and carry `{userId, sessionId, email, role}`; a refresh attempt from a
//! mismatched device fingerprint deletes the session outright (theft response).
//!
//! ## One-Time Tokens
//!
//! Email verification and password reset links carry a random secret whose
//! SHA-256 hash is the only thing stored server-side. At most one token per
//! (user, purpose) is outstanding; issuing a new one replaces the old.
//!
//! ## Enumeration Resistance
//!
//! Resend-verification and forgot-password answer with the same generic
//! success shape whether or not the account exists.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
