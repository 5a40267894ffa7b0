//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::storage::{SessionRow, UserRecord};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ChangePasswordRequest {
    pub password: String,
}

/// A user as exposed over the API; never carries the password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub provider: String,
    pub avatar: String,
    pub is_email_verified: bool,
    pub created_at: String,
}

impl UserResponse {
    pub(super) fn from_record(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            role: record.role,
            provider: record.provider,
            avatar: record.avatar_url,
            is_email_verified: record.email_verified,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_agent: String,
    pub ip_address: String,
    /// Whether this row backs the session the caller is using right now.
    pub is_current: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionResponse {
    pub(super) fn from_row(row: SessionRow, current_session_id: Uuid) -> Self {
        Self {
            id: row.id,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
            is_current: row.id == current_session_id,
            created_at: row.created_at.to_rfc3339(),
            updated_at: row.updated_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn register_request_round_trips() -> Result<()> {
        let request = RegisterRequest {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: RegisterRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.name, "Alice");
        Ok(())
    }

    #[test]
    fn change_password_request_takes_a_single_password_field() -> Result<()> {
        let decoded: ChangePasswordRequest =
            serde_json::from_value(serde_json::json!({ "password": "new-secret" }))?;
        assert_eq!(decoded.password, "new-secret");

        // Wrapped shapes are not the documented contract.
        let rejected = serde_json::from_value::<ChangePasswordRequest>(serde_json::json!({
            "currentPassword": "old",
            "newPassword": "new-secret",
        }));
        assert!(rejected.is_err());
        Ok(())
    }

    #[test]
    fn user_response_uses_camel_case() -> Result<()> {
        let response = UserResponse {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: "user".to_string(),
            provider: "local".to_string(),
            avatar: "https://www.gravatar.com/avatar?d=mp".to_string(),
            is_email_verified: true,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("isEmailVerified"),
            Some(&serde_json::Value::Bool(true))
        );
        assert!(value.get("createdAt").is_some());
        assert!(value.get("password").is_none());
        Ok(())
    }
}
