//! Database helpers for users, sessions, and one-time tokens.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;

/// What a one-time token is allowed to do. A user holds at most one
/// outstanding token per purpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum TokenPurpose {
    VerifyEmail,
    ResetPassword,
}

impl TokenPurpose {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }
}

#[derive(Clone, Debug)]
pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) email: String,
    /// `None` for accounts created via a federated provider that never set a
    /// local password.
    pub(super) password_hash: Option<String>,
    pub(super) role: String,
    pub(super) provider: String,
    pub(super) avatar_url: String,
    pub(super) email_verified: bool,
    pub(super) created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub(super) struct SessionRow {
    pub(super) id: Uuid,
    pub(super) user_id: Uuid,
    pub(super) user_agent: String,
    pub(super) ip_address: String,
    pub(super) expires_at: DateTime<Utc>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum InsertUserOutcome {
    Created(UserRecord),
    Conflict,
}

/// Outcome of consuming a one-time token inside its flow transaction.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum ConsumeOutcome {
    Consumed,
    InvalidOrExpired,
}

/// Matches the `avatar_url` column default in the schema.
const DEFAULT_AVATAR_URL: &str = "https://www.gravatar.com/avatar?d=mp";

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, provider, avatar_url, email_verified, created_at";

const SESSION_COLUMNS: &str =
    "id, user_id, user_agent, ip_address, expires_at, created_at, updated_at";

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        provider: row.get("provider"),
        avatar_url: row.get("avatar_url"),
        email_verified: row.get("email_verified"),
        created_at: row.get("created_at"),
    }
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> SessionRow {
    SessionRow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user_agent: row.get("user_agent"),
        ip_address: row.get("ip_address"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub(super) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;

    Ok(row.as_ref().map(user_from_row))
}

pub(super) async fn find_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;

    Ok(row.as_ref().map(user_from_row))
}

pub(super) async fn insert_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<InsertUserOutcome> {
    let query = format!(
        r"
        INSERT INTO users (name, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertUserOutcome::Created(user_from_row(&row))),
        Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Create or renew the session for a `(user, user_agent, ip_address)` device.
///
/// A repeat login from the same device renews the existing row instead of
/// growing the table, so each device holds exactly one session.
pub(super) async fn upsert_session(
    pool: &PgPool,
    user_id: Uuid,
    user_agent: &str,
    ip_address: &str,
    ttl_seconds: i64,
) -> Result<Uuid> {
    let query = r"
        INSERT INTO sessions (user_id, user_agent, ip_address, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ON CONFLICT (user_id, user_agent, ip_address)
        DO UPDATE SET expires_at = EXCLUDED.expires_at, updated_at = NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(user_agent)
        .bind(ip_address)
        .bind(ttl_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to upsert session")?;

    Ok(row.get("id"))
}

pub(super) async fn find_session(pool: &PgPool, session_id: Uuid) -> Result<Option<SessionRow>> {
    let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(session_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.as_ref().map(session_from_row))
}

/// Re-arm a session after a successful refresh.
pub(super) async fn extend_session(
    pool: &PgPool,
    session_id: Uuid,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        UPDATE sessions
        SET expires_at = NOW() + ($2 * INTERVAL '1 second'), updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(session_id)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to extend session")?;

    Ok(())
}

/// Delete a session by id. Returns whether a row existed.
pub(super) async fn delete_session(pool: &PgPool, session_id: Uuid) -> Result<bool> {
    let query = "DELETE FROM sessions WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(session_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;

    Ok(result.rows_affected() > 0)
}

/// Delete a session only if it belongs to the given user. Returns whether a
/// row existed.
pub(super) async fn delete_user_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<bool> {
    let query = "DELETE FROM sessions WHERE id = $1 AND user_id = $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(session_id)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user session")?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn list_sessions(pool: &PgPool, user_id: Uuid) -> Result<Vec<SessionRow>> {
    let query = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY updated_at DESC"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list sessions")?;

    Ok(rows.iter().map(session_from_row).collect())
}

/// Replace any outstanding one-time token for `(user, purpose)` with a fresh
/// hash; issuing a new token invalidates the previous link.
pub(super) async fn replace_one_time_token(
    pool: &PgPool,
    user_id: Uuid,
    purpose: TokenPurpose,
    token_hash: &str,
    ttl_minutes: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO one_time_tokens (user_id, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 minute'))
        ON CONFLICT (user_id, purpose)
        DO UPDATE SET token_hash = EXCLUDED.token_hash,
                      expires_at = EXCLUDED.expires_at,
                      created_at = NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(token_hash)
        .bind(ttl_minutes)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to replace one-time token")?;

    Ok(())
}

/// Look up the owner of an unexpired one-time token without consuming it.
///
/// Reset-password needs the current hash for the reuse check before the
/// consuming transaction runs; the transaction re-checks the token, so a
/// concurrent consume is still caught.
pub(super) async fn find_user_by_one_time_token(
    pool: &PgPool,
    purpose: TokenPurpose,
    token_hash: &str,
) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT u.id, u.name, u.email, u.password_hash, u.role, u.provider,
               u.avatar_url, u.email_verified, u.created_at
        FROM one_time_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.purpose = $1 AND t.token_hash = $2 AND t.expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(purpose.as_str())
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup one-time token owner")?;

    Ok(row.as_ref().map(user_from_row))
}

/// Consume a verification token and mark the owner's email verified, in one
/// transaction.
pub(super) async fn verify_email_with_token(
    pool: &PgPool,
    token_hash: &str,
) -> Result<ConsumeOutcome> {
    let mut tx = pool.begin().await.context("begin verify transaction")?;

    let Some(user_id) =
        take_one_time_token(&mut tx, TokenPurpose::VerifyEmail, token_hash).await?
    else {
        let _ = tx.rollback().await;
        return Ok(ConsumeOutcome::InvalidOrExpired);
    };

    mark_email_verified_tx(&mut tx, user_id).await?;

    tx.commit().await.context("commit verify transaction")?;

    Ok(ConsumeOutcome::Consumed)
}

/// Consume a reset token, set the new password hash, and revoke every session
/// of the account, in one transaction.
///
/// A valid reset link proves mailbox ownership, so the email is marked
/// verified as a side effect.
pub(super) async fn reset_password_with_token(
    pool: &PgPool,
    token_hash: &str,
    new_password_hash: &str,
) -> Result<ConsumeOutcome> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let Some(user_id) =
        take_one_time_token(&mut tx, TokenPurpose::ResetPassword, token_hash).await?
    else {
        let _ = tx.rollback().await;
        return Ok(ConsumeOutcome::InvalidOrExpired);
    };

    update_password_tx(&mut tx, user_id, new_password_hash).await?;
    mark_email_verified_tx(&mut tx, user_id).await?;

    let query = "DELETE FROM sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke sessions")?;

    tx.commit().await.context("commit reset transaction")?;

    Ok(ConsumeOutcome::Consumed)
}

/// Set a new password hash and revoke every session except the caller's
/// current one, in one transaction.
pub(super) async fn change_password(
    pool: &PgPool,
    user_id: Uuid,
    new_password_hash: &str,
    keep_session_id: Uuid,
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("begin change-password transaction")?;

    update_password_tx(&mut tx, user_id, new_password_hash).await?;

    let query = "DELETE FROM sessions WHERE user_id = $1 AND id <> $2";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(keep_session_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke other sessions")?;

    tx.commit()
        .await
        .context("commit change-password transaction")?;

    Ok(())
}

/// Claim an unexpired one-time token row, deleting it so the token can never
/// be replayed. Returns the owning user id.
async fn take_one_time_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    purpose: TokenPurpose,
    token_hash: &str,
) -> Result<Option<Uuid>> {
    let query = r"
        DELETE FROM one_time_tokens
        WHERE purpose = $1 AND token_hash = $2 AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(purpose.as_str())
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to consume one-time token")?;

    Ok(row.map(|row| row.get("user_id")))
}

async fn update_password_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    new_password_hash: &str,
) -> Result<()> {
    let query = "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(new_password_hash)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to update password")?;

    Ok(())
}

async fn mark_email_verified_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<()> {
    let query = "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;

    Ok(())
}

/// Resolve a federated profile to a local user.
///
/// An existing account with the same email is marked verified (the provider
/// vouches for the address); otherwise a new user is created with no local
/// password.
pub(super) async fn upsert_federated_user(
    pool: &PgPool,
    provider: &str,
    email: &str,
    name: &str,
    avatar_url: Option<&str>,
) -> Result<UserRecord> {
    let mut tx = pool.begin().await.context("begin federation transaction")?;

    let query = format!(
        r"
        UPDATE users SET email_verified = TRUE, updated_at = NOW()
        WHERE email = $1
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let existing = sqlx::query(&query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to link federated account")?;

    if let Some(row) = existing {
        let user = user_from_row(&row);
        tx.commit().await.context("commit federation transaction")?;
        return Ok(user);
    }

    let query = format!(
        r"
        INSERT INTO users (name, email, provider, avatar_url, email_verified)
        VALUES ($1, $2, $3, $4, TRUE)
        RETURNING {USER_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(email)
        .bind(provider)
        .bind(avatar_url.unwrap_or(DEFAULT_AVATAR_URL))
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .context("failed to create federated user")?;

    let user = user_from_row(&row);
    tx.commit().await.context("commit federation transaction")?;

    Ok(user)
}

/// Every user except the caller, newest first.
pub(super) async fn list_users(pool: &PgPool, exclude_user_id: Uuid) -> Result<Vec<UserRecord>> {
    let query = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id <> $1 ORDER BY created_at DESC"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(exclude_user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;

    Ok(rows.iter().map(user_from_row).collect())
}

#[cfg(test)]
mod tests {
    use super::TokenPurpose;

    #[test]
    fn token_purpose_names_are_stable() {
        // Stored in the database; renaming breaks outstanding tokens.
        assert_eq!(TokenPurpose::VerifyEmail.as_str(), "verify_email");
        assert_eq!(TokenPurpose::ResetPassword.as_str(), "reset_password");
    }
}
