//! Token codec: signed access/refresh tokens and opaque one-time tokens.
//!
//! Access and refresh tokens are HS256-signed JWTs carrying
//! `{userId, sessionId, email, role}`, each kind with its own secret and
//! expiry window. Expiry is reported distinctly from other invalidity because
//! callers react differently: expiry triggers the refresh flow, anything else
//! forces a re-login.
//!
//! One-time tokens (email verification, password reset) are random secrets;
//! only their SHA-256 hex digest is ever stored, and the same deterministic
//! hash is used to look tokens up when they come back.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::state::AuthConfig;

/// Which signed-token mechanism to use; each has its own secret and lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Why a signed token failed verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Signature is fine but the token is past its expiry.
    Expired,
    /// Bad signature, malformed token, or wrong shape.
    Invalid,
}

/// Claims embedded in every signed token. Not persisted anywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPayload {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    sid: Uuid,
    email: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Sign a token of the given kind for the payload.
///
/// # Errors
///
/// Returns an error if JWT encoding fails.
pub fn sign_token(payload: &TokenPayload, kind: TokenKind, config: &AuthConfig) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let ttl = match kind {
        TokenKind::Access => config.access_token_ttl_seconds(),
        TokenKind::Refresh => config.refresh_token_ttl_seconds(),
    };

    let claims = Claims {
        sub: payload.user_id,
        sid: payload.session_id,
        email: payload.email.clone(),
        role: payload.role.clone(),
        iat: now,
        exp: now + ttl,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret_for(kind, config).as_bytes()),
    )
    .context("failed to sign token")
}

/// Verify a signed token, distinguishing expiry from other invalidity.
pub fn verify_token(
    token: &str,
    kind: TokenKind,
    config: &AuthConfig,
) -> Result<TokenPayload, TokenError> {
    let result = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret_for(kind, config).as_bytes()),
        &Validation::default(), // HS256, validates exp
    );

    match result {
        Ok(data) => Ok(TokenPayload {
            user_id: data.claims.sub,
            session_id: data.claims.sid,
            email: data.claims.email,
            role: data.claims.role,
        }),
        Err(err) => match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::Expired),
            _ => Err(TokenError::Invalid),
        },
    }
}

fn secret_for(kind: TokenKind, config: &AuthConfig) -> String {
    match kind {
        TokenKind::Access => config.access_token_secret().expose_secret().to_string(),
        TokenKind::Refresh => config.refresh_token_secret().expose_secret().to_string(),
    }
}

/// Create a new one-time token.
///
/// The raw value is only ever embedded in an emailed link; the database stores
/// the hash.
///
/// # Errors
///
/// Returns an error if the system RNG fails.
pub fn generate_one_time_token() -> Result<(String, String)> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate one-time token")?;
    let raw = hex_encode(&bytes);
    let hash = hash_one_time_token(&raw);
    Ok((raw, hash))
}

/// Hash a one-time token so raw values never touch the database.
/// The same deterministic hash is used for lookups.
#[must_use]
pub fn hash_one_time_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            "https://app.ensaluti.dev".to_string(),
            SecretString::from("access-secret-long-enough-for-hmac"),
            SecretString::from("refresh-secret-long-enough-for-hmac"),
        )
    }

    fn test_payload() -> TokenPayload {
        TokenPayload {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            role: "user".to_string(),
        }
    }

    #[test]
    fn sign_and_verify_round_trip() -> Result<()> {
        let config = test_config();
        let payload = test_payload();

        let token = sign_token(&payload, TokenKind::Access, &config)?;
        let decoded = verify_token(&token, TokenKind::Access, &config)
            .expect("freshly signed token should verify");
        assert_eq!(decoded, payload);
        Ok(())
    }

    #[test]
    fn access_and_refresh_secrets_are_independent() -> Result<()> {
        let config = test_config();
        let payload = test_payload();

        let access = sign_token(&payload, TokenKind::Access, &config)?;
        assert_eq!(
            verify_token(&access, TokenKind::Refresh, &config),
            Err(TokenError::Invalid)
        );
        Ok(())
    }

    #[test]
    fn expired_token_is_distinguished() -> Result<()> {
        let config = test_config();
        let payload = test_payload();

        // Encode claims expired well past the default 60 second leeway.
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: payload.user_id,
            sid: payload.session_id,
            email: payload.email,
            role: payload.role,
            iat: now - 600,
            exp: now - 300,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(
                config.access_token_secret().expose_secret().as_bytes(),
            ),
        )?;

        assert_eq!(
            verify_token(&token, TokenKind::Access, &config),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn garbage_token_is_invalid() {
        let config = test_config();
        assert_eq!(
            verify_token("not-a-jwt", TokenKind::Access, &config),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn one_time_token_hash_is_deterministic() -> Result<()> {
        let (raw, hash) = generate_one_time_token()?;
        assert_eq!(hash_one_time_token(&raw), hash);
        // 32 random bytes, hex on both sides
        assert_eq!(raw.len(), 64);
        assert!(raw.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash.len(), 64);
        Ok(())
    }

    #[test]
    fn one_time_tokens_are_unique() -> Result<()> {
        let (first, _) = generate_one_time_token()?;
        let (second, _) = generate_one_time_token()?;
        assert_ne!(first, second);
        Ok(())
    }
}
