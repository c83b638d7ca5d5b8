//! Two-factor challenge state machine.
//!
//! User-level states run `disabled → pending_setup → enabled`; each
//! sign-in of an enabled user runs `awaiting_challenge → satisfied`.
//! Wrong codes never move either machine and surface one uniform error
//! regardless of which code type was attempted.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::TwoFactorConfig;
use crate::models::{
    AuditEvent, AuditEventType, RecoveryCode, Session, TotpEnrollment, TwoFactorStatus, User,
};

use super::audit::AuditService;
use super::database::Database;
use super::error::ServiceError;
use super::{recovery, totp};

/// Payload returned by enrollment start, for the authenticator app.
#[derive(Debug, Serialize)]
pub struct EnrollmentStart {
    pub secret: String,
    pub provisioning_uri: String,
    pub expires_in_seconds: i64,
}

#[derive(Clone)]
pub struct TwoFactorService {
    db: Database,
    audit: AuditService,
    config: TwoFactorConfig,
}

impl TwoFactorService {
    pub fn new(db: Database, audit: AuditService, config: TwoFactorConfig) -> Self {
        Self { db, audit, config }
    }

    /// Derive the user's current state.
    pub async fn status(&self, user: &User) -> Result<TwoFactorStatus, ServiceError> {
        let enrollment = self.db.find_enrollment(user.user_id).await?;
        Ok(TwoFactorStatus::of(user, enrollment.as_ref()))
    }

    /// Start (or restart) enrollment: generate a secret and hold it
    /// unconfirmed with a bounded TTL. Nothing is persisted on the user
    /// record until confirmation.
    pub async fn begin_enrollment(&self, user: &User) -> Result<EnrollmentStart, ServiceError> {
        if user.two_factor_enabled() {
            return Err(ServiceError::InvalidState(
                "Two-factor authentication is already enabled".to_string(),
            ));
        }

        let secret = totp::generate_secret();
        let enrollment = TotpEnrollment::new(
            user.user_id,
            secret.clone(),
            self.config.enrollment_expiry_minutes,
        );
        self.db.upsert_enrollment(&enrollment).await?;

        let provisioning_uri = totp::provisioning_uri(&secret, &self.config.issuer, &user.email);

        Ok(EnrollmentStart {
            secret,
            provisioning_uri,
            expires_in_seconds: self.config.enrollment_expiry_minutes * 60,
        })
    }

    /// Confirm enrollment with a code from the authenticator app.
    ///
    /// A match persists the secret, flips the required flag, discards any
    /// prior recovery codes and issues a fresh batch of ten - all in one
    /// transaction. A miss leaves the user in pending_setup with nothing
    /// persisted.
    pub async fn confirm_enrollment(
        &self,
        user: &User,
        code: &str,
    ) -> Result<Vec<String>, ServiceError> {
        if user.two_factor_enabled() {
            return Err(ServiceError::InvalidState(
                "Two-factor authentication is already enabled".to_string(),
            ));
        }

        let enrollment = self
            .db
            .find_enrollment(user.user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState("No enrollment in progress".to_string())
            })?;

        if !totp::verify(&enrollment.secret, code, Utc::now()) {
            return Err(ServiceError::InvalidCredential);
        }

        let codes = recovery::generate_batch();
        let rows: Vec<RecoveryCode> = codes
            .iter()
            .map(|c| RecoveryCode::new(user.user_id, c.clone()))
            .collect();

        self.db
            .enable_two_factor(user.user_id, &enrollment.secret, &rows)
            .await?;

        tracing::info!(user_id = %user.user_id, "Two-factor authentication enabled");
        self.audit
            .record(AuditEvent::user_action(
                user.user_id,
                AuditEventType::TwoFactorEnabled,
                None,
                None,
                None,
            ))
            .await?;

        Ok(codes)
    }

    /// Satisfy a login challenge with a TOTP code.
    pub async fn verify_totp_challenge(
        &self,
        challenge_token: &str,
        code: &str,
    ) -> Result<User, ServiceError> {
        let (challenge, user) = self.load_challenge(challenge_token).await?;

        let secret = user
            .totp_secret
            .as_deref()
            .ok_or(ServiceError::InvalidCredential)?;

        if !totp::verify(secret, code, Utc::now()) {
            return Err(ServiceError::InvalidCredential);
        }

        self.claim_challenge(challenge.challenge_id).await?;
        Ok(user)
    }

    /// Satisfy a login challenge with a recovery code, consuming it.
    ///
    /// The code is only consumed on a match, and consumption is a
    /// conditional update: a code can never satisfy two challenges, even
    /// under concurrent requests.
    pub async fn verify_recovery_challenge(
        &self,
        challenge_token: &str,
        code: &str,
    ) -> Result<User, ServiceError> {
        let (challenge, user) = self.load_challenge(challenge_token).await?;

        let candidate = recovery::normalize(code);
        let unused = self.db.list_unused_recovery_codes(user.user_id).await?;

        // Scan every code so a miss costs the same as a hit.
        let mut matched_id: Option<Uuid> = None;
        for stored in &unused {
            if recovery::matches(&candidate, &stored.code) && matched_id.is_none() {
                matched_id = Some(stored.code_id);
            }
        }

        let code_id = matched_id.ok_or(ServiceError::InvalidCredential)?;

        let consumed = self.db.consume_recovery_code(code_id).await?;
        if consumed == 0 {
            // A concurrent request burned the same code first.
            return Err(ServiceError::InvalidCredential);
        }

        self.claim_challenge(challenge.challenge_id).await?;

        tracing::info!(user_id = %user.user_id, "Recovery code consumed for sign-in");
        Ok(user)
    }

    /// Replace every recovery code, used or not, with a fresh batch of
    /// ten. Fully-trusted sessions only - not available while
    /// impersonating.
    pub async fn regenerate_recovery_codes(
        &self,
        user: &User,
        session: &Session,
    ) -> Result<Vec<String>, ServiceError> {
        self.require_trusted(user, session)?;

        let codes = recovery::generate_batch();
        let rows: Vec<RecoveryCode> = codes
            .iter()
            .map(|c| RecoveryCode::new(user.user_id, c.clone()))
            .collect();

        self.db.replace_recovery_codes(user.user_id, &rows).await?;

        self.audit
            .record(AuditEvent::user_action(
                user.user_id,
                AuditEventType::RecoveryCodesRegenerated,
                None,
                None,
                None,
            ))
            .await?;

        Ok(codes)
    }

    /// List the unused codes for display after enrollment.
    pub async fn unused_recovery_codes(
        &self,
        user: &User,
        session: &Session,
    ) -> Result<Vec<String>, ServiceError> {
        self.require_trusted(user, session)?;

        let codes = self.db.list_unused_recovery_codes(user.user_id).await?;
        Ok(codes.into_iter().map(|c| c.code).collect())
    }

    /// Turn two-factor authentication off: clears the secret, the flag and
    /// every recovery code atomically.
    pub async fn disable(&self, user: &User, session: &Session) -> Result<(), ServiceError> {
        self.require_trusted(user, session)?;

        if !user.two_factor_enabled() {
            return Err(ServiceError::InvalidState(
                "Two-factor authentication is not enabled".to_string(),
            ));
        }

        self.db.disable_two_factor(user.user_id).await?;

        tracing::info!(user_id = %user.user_id, "Two-factor authentication disabled");
        self.audit
            .record(AuditEvent::user_action(
                user.user_id,
                AuditEventType::TwoFactorDisabled,
                None,
                None,
                None,
            ))
            .await?;
        Ok(())
    }

    /// Resolve a challenge token to its challenge and user. Expired or
    /// unknown tokens mean the sign-in must restart.
    async fn load_challenge(
        &self,
        challenge_token: &str,
    ) -> Result<(crate::models::LoginChallenge, User), ServiceError> {
        let hash = Session::hash_token(challenge_token);
        let challenge = self
            .db
            .find_challenge_by_token_hash(&hash)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState(
                    "Challenge expired or unknown; sign in again".to_string(),
                )
            })?;

        let user = self
            .db
            .find_user_by_id(challenge.user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState(
                    "Challenge expired or unknown; sign in again".to_string(),
                )
            })?;

        if !user.two_factor_enabled() {
            return Err(ServiceError::InvalidState(
                "Two-factor authentication is not enabled".to_string(),
            ));
        }

        Ok((challenge, user))
    }

    /// Claim a challenge exactly once; losing the race reads as a plain
    /// invalid attempt.
    async fn claim_challenge(&self, challenge_id: Uuid) -> Result<(), ServiceError> {
        let claimed = self.db.delete_challenge(challenge_id).await?;
        if claimed == 0 {
            return Err(ServiceError::InvalidCredential);
        }
        Ok(())
    }

    /// Recovery-code management requires a fully-trusted session: the
    /// user's own, not an impersonated one.
    fn require_trusted(&self, _user: &User, session: &Session) -> Result<(), ServiceError> {
        if session.is_impersonation() {
            return Err(ServiceError::InvalidState(
                "Not available while impersonating a user".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_normalization_matches_stored_codes() {
        let stored = "ZX12CV34BN56";
        let candidate = recovery::normalize(" zx12cv34bn56 ");
        assert!(recovery::matches(&candidate, stored));
    }
}
