//! Auth state and configuration.

use secrecy::SecretString;
use std::sync::Arc;

use crate::api::email::Mailer;

const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_ONE_TIME_TOKEN_TTL_MINUTES: i64 = 30;

/// Google `OAuth` client credentials; present only when the provider is
/// configured.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
}

impl GoogleConfig {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    pub(super) fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(super) fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub(super) fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    app_origin: String,
    access_token_secret: SecretString,
    refresh_token_secret: SecretString,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    one_time_token_ttl_minutes: i64,
    google: Option<GoogleConfig>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(
        app_origin: String,
        access_token_secret: SecretString,
        refresh_token_secret: SecretString,
    ) -> Self {
        // Cookie attributes and redirect URLs never want a trailing slash
        let app_origin = app_origin.trim_end_matches('/').to_string();

        Self {
            app_origin,
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            one_time_token_ttl_minutes: DEFAULT_ONE_TIME_TOKEN_TTL_MINUTES,
            google: None,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_one_time_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.one_time_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_google(mut self, google: GoogleConfig) -> Self {
        self.google = Some(google);
        self
    }

    pub(crate) fn app_origin(&self) -> &str {
        &self.app_origin
    }

    pub(super) fn access_token_secret(&self) -> &SecretString {
        &self.access_token_secret
    }

    pub(super) fn refresh_token_secret(&self) -> &SecretString {
        &self.refresh_token_secret
    }

    pub(super) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub(super) fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    pub(super) fn one_time_token_ttl_minutes(&self) -> i64 {
        self.one_time_token_ttl_minutes
    }

    pub(super) fn google(&self) -> Option<&GoogleConfig> {
        self.google.as_ref()
    }

    pub(super) fn cookie_secure(&self) -> bool {
        self.app_origin.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    mailer: Arc<dyn Mailer>,
}

impl AuthState {
    pub fn new(config: AuthConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self { config, mailer }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use crate::api::email::LogMailer;
    use super::{AuthConfig, AuthState, GoogleConfig};
    use secrecy::{ExposeSecret, SecretString};
    use std::sync::Arc;

    fn base_config() -> AuthConfig {
        AuthConfig::new(
            "https://app.ensaluti.dev/".to_string(),
            SecretString::from("access-secret"),
            SecretString::from("refresh-secret"),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = base_config();

        assert_eq!(config.app_origin(), "https://app.ensaluti.dev");
        assert_eq!(
            config.access_token_ttl_seconds(),
            super::DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_token_ttl_seconds(),
            super::DEFAULT_REFRESH_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.one_time_token_ttl_minutes(),
            super::DEFAULT_ONE_TIME_TOKEN_TTL_MINUTES
        );
        assert!(config.google().is_none());

        let config = config
            .with_access_token_ttl_seconds(60)
            .with_refresh_token_ttl_seconds(3600)
            .with_one_time_token_ttl_minutes(5);

        assert_eq!(config.access_token_ttl_seconds(), 60);
        assert_eq!(config.refresh_token_ttl_seconds(), 3600);
        assert_eq!(config.one_time_token_ttl_minutes(), 5);
    }

    #[test]
    fn cookie_secure_follows_origin_scheme() {
        assert!(base_config().cookie_secure());

        let plain = AuthConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("a"),
            SecretString::from("r"),
        );
        assert!(!plain.cookie_secure());
    }

    #[test]
    fn google_config_is_carried() {
        let config = base_config().with_google(GoogleConfig::new(
            "client-id".to_string(),
            SecretString::from("client-secret"),
            "https://api.ensaluti.dev/auth/google/callback".to_string(),
        ));

        let google = config.google().expect("google should be configured");
        assert_eq!(google.client_id(), "client-id");
        assert_eq!(google.client_secret().expose_secret(), "client-secret");
        assert_eq!(
            google.redirect_uri(),
            "https://api.ensaluti.dev/auth/google/callback"
        );
    }

    #[test]
    fn auth_state_exposes_config_and_mailer() {
        let state = AuthState::new(base_config(), Arc::new(LogMailer));
        assert_eq!(state.config().app_origin(), "https://app.ensaluti.dev");
        assert!(state
            .mailer()
            .send_verification("alice@example.com", "https://app.ensaluti.dev/verify-email?token=t")
            .is_ok());
    }
}
