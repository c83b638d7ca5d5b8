//! Registration, sign-in and sign-out flows.

use serde_json::json;
use uuid::Uuid;

use crate::config::{SecurityConfig, TwoFactorConfig};
use crate::models::{
    Account, AuditEvent, AuditEventType, LoginChallenge, Membership, RegisterRequest, Session,
    SignInRequest, User,
};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

use super::audit::AuditService;
use super::database::Database;
use super::error::ServiceError;

/// Outcome of a successful primary-credential check.
#[derive(Debug)]
pub enum SignInOutcome {
    /// 2FA disabled: a full session was opened.
    SessionIssued { session: Session, token: String },
    /// 2FA enabled: the sign-in is parked in the awaiting-challenge
    /// sub-state until a second factor satisfies it.
    ChallengeIssued { token: String },
}

#[derive(Clone)]
pub struct SessionService {
    db: Database,
    audit: AuditService,
    security: SecurityConfig,
    two_factor: TwoFactorConfig,
}

impl SessionService {
    pub fn new(
        db: Database,
        audit: AuditService,
        security: SecurityConfig,
        two_factor: TwoFactorConfig,
    ) -> Self {
        Self {
            db,
            audit,
            security,
            two_factor,
        }
    }

    /// Register a new user. Every registration creates the user's personal
    /// account with its owner membership in the same transaction.
    pub async fn register(&self, req: RegisterRequest) -> Result<User, ServiceError> {
        if self.db.find_user_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::InvalidState(
                "Email already registered".to_string(),
            ));
        }

        let password_hash = hash_password(&Password::new(req.password))
            .map_err(ServiceError::Internal)?
            .into_string();

        let user = User::new(req.email, password_hash, req.display_name);
        let account_name = user
            .display_name
            .clone()
            .unwrap_or_else(|| user.email.clone());
        let account = Account::new_personal(user.user_id, account_name);
        let membership = Membership::new_owner(account.account_id, user.user_id);

        let mut tx = self.db.begin().await?;
        self.db.insert_user_tx(&mut tx, &user).await?;
        self.db.insert_account_tx(&mut tx, &account).await?;
        self.db.insert_membership_tx(&mut tx, &membership).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.user_id, "User registered");
        self.audit.record_background(AuditEvent::user_action(
            user.user_id,
            AuditEventType::UserRegistered,
            Some("account".to_string()),
            Some(account.account_id),
            None,
        ));

        Ok(user)
    }

    /// Verify the primary credential and either open a session (2FA
    /// disabled) or park the sign-in behind a challenge (2FA enabled).
    ///
    /// Credential failures are uniform: the caller cannot tell an unknown
    /// email from a wrong password.
    pub async fn sign_in(&self, req: SignInRequest) -> Result<SignInOutcome, ServiceError> {
        let user = self
            .db
            .find_user_by_email(&req.email)
            .await?
            .ok_or(ServiceError::InvalidSignIn)?;

        verify_password(
            &Password::new(req.password),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(|_| {
            self.audit.record_background(AuditEvent::user_action(
                user.user_id,
                AuditEventType::SignInFailed,
                None,
                None,
                None,
            ));
            ServiceError::InvalidSignIn
        })?;

        if user.two_factor_enabled() {
            let (challenge, token) =
                LoginChallenge::new(user.user_id, self.two_factor.challenge_expiry_minutes);
            self.db.insert_challenge(&challenge).await?;

            tracing::info!(user_id = %user.user_id, "Sign-in awaiting second factor");
            return Ok(SignInOutcome::ChallengeIssued { token });
        }

        let (session, token) = self.open_session(user.user_id).await?;
        self.audit.record_background(AuditEvent::user_action(
            user.user_id,
            AuditEventType::SignInSucceeded,
            None,
            None,
            None,
        ));

        Ok(SignInOutcome::SessionIssued { session, token })
    }

    /// Open a full session for a user and return it with its bearer token.
    pub async fn open_session(&self, user_id: Uuid) -> Result<(Session, String), ServiceError> {
        let (token, token_hash) = Session::generate_token();
        let session = Session::new(user_id, token_hash, self.security.session_expiry_hours);
        self.db.insert_session(&session).await?;
        Ok((session, token))
    }

    /// Resolve a bearer token to its session, if any.
    pub async fn resolve(&self, token: &str) -> Result<Option<Session>, ServiceError> {
        let hash = Session::hash_token(token);
        self.db.find_session_by_token_hash(&hash).await
    }

    /// Destroy a session.
    pub async fn sign_out(&self, session: &Session) -> Result<(), ServiceError> {
        self.db.delete_session(session.session_id).await?;

        tracing::info!(user_id = %session.user_id, "User signed out");
        self.audit.record_background(
            AuditEvent::user_action(
                session.user_id,
                AuditEventType::SignedOut,
                None,
                None,
                Some(json!({ "session_id": session.session_id })),
            ),
        );
        Ok(())
    }
}
