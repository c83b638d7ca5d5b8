//! User model - sign-in identity with two-factor credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User entity.
///
/// `totp_secret` is only ever set through a confirmed enrollment; an
/// unconfirmed secret lives in `TotpEnrollment` until the user proves
/// possession of a valid code.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub verified: bool,
    pub totp_secret: Option<String>,
    pub otp_required_for_login: bool,
    pub platform_admin: bool,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user.
    pub fn new(email: String, password_hash: String, display_name: Option<String>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email,
            password_hash,
            display_name,
            verified: false,
            totp_secret: None,
            otp_required_for_login: false,
            platform_admin: false,
            created_utc: Utc::now(),
        }
    }

    /// Check whether sign-in must pass a second factor.
    pub fn two_factor_enabled(&self) -> bool {
        self.otp_required_for_login && self.totp_secret.is_some()
    }

    /// Check whether this user may impersonate others (cross-account
    /// privilege, unrelated to any account-level admin role).
    pub fn may_impersonate(&self) -> bool {
        self.platform_admin
    }

    /// Convert to sanitized response (no credential fields).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// Request to register a new user.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Request to sign in with email/password.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// User response for API (without credential fields).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub verified: bool,
    pub otp_required_for_login: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            display_name: u.display_name,
            verified: u.verified,
            otp_required_for_login: u.otp_required_for_login,
            created_utc: u.created_utc,
        }
    }
}
