//! Argon2id password hashing and verification.
//!
//! Hashes use the PHC string format so algorithm parameters and the per-call
//! random salt travel with the hash. A mismatch is a normal negative result;
//! only a malformed stored hash is an error, and callers surface that as an
//! authentication failure rather than a crash.

use anyhow::{anyhow, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Hash a plaintext password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns an error if the hashing operation itself fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-formatted hash.
///
/// Returns `Ok(false)` on mismatch. A stored hash that cannot be parsed is an
/// error; pass an empty string for accounts without a password hash (OAuth
/// only) to get a guaranteed `Ok(false)`-equivalent failure path.
///
/// # Errors
///
/// Returns an error if the stored hash is malformed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    if stored_hash.is_empty() {
        // OAuth-only accounts have no hash; treat as a plain mismatch.
        return Ok(false);
    }
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| anyhow!("malformed password hash: {err}"))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(anyhow!("failed to verify password: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() -> Result<()> {
        let hash = hash_password("correct-horse-battery-staple")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse-battery-staple", &hash)?);
        Ok(())
    }

    #[test]
    fn wrong_password_is_negative_not_error() -> Result<()> {
        let hash = hash_password("real-password")?;
        assert!(!verify_password("wrong-password", &hash)?);
        Ok(())
    }

    #[test]
    fn empty_stored_hash_never_matches() -> Result<()> {
        assert!(!verify_password("anything", "")?);
        Ok(())
    }

    #[test]
    fn malformed_hash_is_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn same_password_different_salts() -> Result<()> {
        let first = hash_password("secret1")?;
        let second = hash_password("secret1")?;
        assert_ne!(first, second);
        Ok(())
    }
}
