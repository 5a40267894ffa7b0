//! Outbound mail abstraction.
//!
//! Actual delivery is an external collaborator; the auth flows only depend on
//! the [`Mailer`] trait. The default [`LogMailer`] logs the link instead of
//! sending real email, which is what local development uses.

use anyhow::Result;
use tracing::info;

/// Email delivery abstraction used by the auth flows.
pub trait Mailer: Send + Sync {
    /// Deliver an email-verification link or return an error.
    fn send_verification(&self, to_email: &str, verify_url: &str) -> Result<()>;

    /// Deliver a password-reset link or return an error.
    fn send_password_reset(&self, to_email: &str, reset_url: &str) -> Result<()>;
}

/// Local dev mailer that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_verification(&self, to_email: &str, verify_url: &str) -> Result<()> {
        info!(to_email = %to_email, verify_url = %verify_url, "verification mail send stub");
        Ok(())
    }

    fn send_password_reset(&self, to_email: &str, reset_url: &str) -> Result<()> {
        info!(to_email = %to_email, reset_url = %reset_url, "password reset mail send stub");
        Ok(())
    }
}

/// Build the frontend verification link included in outbound emails.
#[must_use]
pub fn build_verify_url(app_origin: &str, token: &str) -> String {
    let base = app_origin.trim_end_matches('/');
    format!("{base}/verify-email?token={token}")
}

/// Build the frontend password-reset link included in outbound emails.
#[must_use]
pub fn build_reset_url(app_origin: &str, token: &str) -> String {
    let base = app_origin.trim_end_matches('/');
    format!("{base}/reset-password?token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_verify_url_trims_trailing_slash() {
        let url = build_verify_url("https://app.ensaluti.dev/", "token");
        assert_eq!(url, "https://app.ensaluti.dev/verify-email?token=token");
    }

    #[test]
    fn build_reset_url_embeds_token() {
        let url = build_reset_url("https://app.ensaluti.dev", "raw-token");
        assert_eq!(url, "https://app.ensaluti.dev/reset-password?token=raw-token");
    }

    #[test]
    fn log_mailer_always_succeeds() {
        let mailer = LogMailer;
        assert!(mailer
            .send_verification("alice@example.com", "https://x/verify")
            .is_ok());
        assert!(mailer
            .send_password_reset("alice@example.com", "https://x/reset")
            .is_ok());
    }
}
