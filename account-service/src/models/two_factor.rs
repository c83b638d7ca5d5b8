//! Two-factor enrollment and sign-in challenge models.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::{Session, User};

/// User-level two-factor state, derived from the persisted secret and any
/// outstanding enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorStatus {
    Disabled,
    PendingSetup,
    Enabled,
}

impl TwoFactorStatus {
    /// Derive the state for a user. A live (unexpired) enrollment row means
    /// the user is mid-setup; an expired one counts as absent.
    pub fn of(user: &User, enrollment: Option<&TotpEnrollment>) -> Self {
        if user.two_factor_enabled() {
            TwoFactorStatus::Enabled
        } else if enrollment.is_some_and(|e| !e.is_expired()) {
            TwoFactorStatus::PendingSetup
        } else {
            TwoFactorStatus::Disabled
        }
    }
}

/// An unconfirmed TOTP secret from enrollment start.
///
/// The secret is only copied onto the user record once the user submits a
/// code proving possession; until then it lives here with a bounded TTL.
#[derive(Debug, Clone, FromRow)]
pub struct TotpEnrollment {
    pub user_id: Uuid,
    pub secret: String,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl TotpEnrollment {
    /// Create a new enrollment with the given TTL.
    pub fn new(user_id: Uuid, secret: String, expiry_minutes: i64) -> Self {
        Self {
            user_id,
            secret,
            expiry_utc: Utc::now() + Duration::minutes(expiry_minutes),
            created_utc: Utc::now(),
        }
    }

    /// Check if the unconfirmed secret has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }
}

/// The awaiting-challenge sub-state of a sign-in.
///
/// Created once the primary credential check succeeds for a 2FA-enabled
/// user; consumed exactly once when a second factor satisfies it. Expiry is
/// evaluated lazily on next use.
#[derive(Debug, Clone, FromRow)]
pub struct LoginChallenge {
    pub challenge_id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl LoginChallenge {
    /// Create a new challenge for a user; returns the challenge and the
    /// opaque token the client must present.
    pub fn new(user_id: Uuid, expiry_minutes: i64) -> (Self, String) {
        let (token, token_hash) = Session::generate_token();
        let challenge = Self {
            challenge_id: Uuid::new_v4(),
            token_hash,
            user_id,
            expiry_utc: Utc::now() + Duration::minutes(expiry_minutes),
            created_utc: Utc::now(),
        };
        (challenge, token)
    }

    /// Check if the challenge has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(secret: Option<&str>, required: bool) -> User {
        let mut user = User::new("u@example.com".into(), "$argon2id$stub".into(), None);
        user.totp_secret = secret.map(|s| s.to_string());
        user.otp_required_for_login = required;
        user
    }

    #[test]
    fn status_disabled_without_secret_or_enrollment() {
        let user = user_with(None, false);
        assert_eq!(TwoFactorStatus::of(&user, None), TwoFactorStatus::Disabled);
    }

    #[test]
    fn status_pending_with_live_enrollment() {
        let user = user_with(None, false);
        let enrollment = TotpEnrollment::new(user.user_id, "SECRET".into(), 30);
        assert_eq!(
            TwoFactorStatus::of(&user, Some(&enrollment)),
            TwoFactorStatus::PendingSetup
        );
    }

    #[test]
    fn status_disabled_with_expired_enrollment() {
        let user = user_with(None, false);
        let mut enrollment = TotpEnrollment::new(user.user_id, "SECRET".into(), 30);
        enrollment.expiry_utc = Utc::now() - Duration::minutes(1);
        assert_eq!(
            TwoFactorStatus::of(&user, Some(&enrollment)),
            TwoFactorStatus::Disabled
        );
    }

    #[test]
    fn status_enabled_with_confirmed_secret() {
        let user = user_with(Some("SECRET"), true);
        assert_eq!(TwoFactorStatus::of(&user, None), TwoFactorStatus::Enabled);
    }

    #[test]
    fn secret_alone_does_not_enable() {
        // The required flag and the secret flip together at confirm time; a
        // secret without the flag must not force a challenge.
        let user = user_with(Some("SECRET"), false);
        assert_eq!(TwoFactorStatus::of(&user, None), TwoFactorStatus::Disabled);
    }
}
