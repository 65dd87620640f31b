//! User model - the registered principal and its auth bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Role of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("invalid role: {}", s)),
        }
    }
}

/// User entity. Email is stored lowercase; the active one-time code and its
/// expiry are set and cleared together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
    pub verified: bool,
    pub failed_logins: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    /// Codes issued within the current rate window.
    pub codes_sent: i32,
    pub last_code_sent_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a new unverified user.
    pub fn new(email: String, first_name: String, last_name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email,
            first_name,
            last_name,
            password_hash,
            role: Role::User,
            verified: false,
            failed_logins: 0,
            locked_until: None,
            otp_code: None,
            otp_expires_at: None,
            codes_sent: 0,
            last_code_sent_at: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Set the active code together with its expiry.
    pub fn set_code(&mut self, code: String, expires_at: DateTime<Utc>) {
        self.otp_code = Some(code);
        self.otp_expires_at = Some(expires_at);
    }

    /// Clear the active code together with its expiry.
    pub fn clear_code(&mut self) {
        self.otp_code = None;
        self.otp_expires_at = None;
    }

    /// Convert to sanitized response (no secret material).
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            user_id: self.user_id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            verified: self.verified,
            created_utc: self.created_utc,
        }
    }
}

/// User response for callers (no hash, no code material, no counters).
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUser {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub verified: bool,
    pub created_utc: DateTime<Utc>,
}

/// Request to register a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "first name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(max = 100, message = "last name must be at most 100 characters"))]
    pub last_name: String,
}

/// Request to login with email/password.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Successful login: the identity plus its bearer token.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: SanitizedUser,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_unverified_with_clean_counters() {
        let user = User::new(
            "a@example.com".into(),
            "Ada".into(),
            "Lovelace".into(),
            "$argon2id$stub".into(),
        );
        assert!(!user.verified);
        assert_eq!(user.failed_logins, 0);
        assert_eq!(user.codes_sent, 0);
        assert_eq!(user.role, Role::User);
        assert!(user.otp_code.is_none());
        assert!(user.otp_expires_at.is_none());
    }

    #[test]
    fn test_code_and_expiry_move_together() {
        let mut user = User::new(
            "a@example.com".into(),
            "Ada".into(),
            "Lovelace".into(),
            "$argon2id$stub".into(),
        );
        user.set_code("123456".into(), Utc::now());
        assert!(user.otp_code.is_some() && user.otp_expires_at.is_some());
        user.clear_code();
        assert!(user.otp_code.is_none() && user.otp_expires_at.is_none());
    }

    #[test]
    fn test_sanitized_user_serializes_without_secret_material() {
        let user = User::new(
            "a@example.com".into(),
            "Ada".into(),
            "Lovelace".into(),
            "$argon2id$stub".into(),
        );
        let json = serde_json::to_string(&user.sanitized()).expect("serialize");
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("otp_code"));
    }

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("admin".parse::<Role>().ok(), Some(Role::Admin));
        assert_eq!(Role::Admin.as_str(), "admin");
        assert!("owner".parse::<Role>().is_err());
    }
}
