//! Impersonation (masquerade) - a privileged admin temporarily acting as
//! another user, with an auditable back-link and a restorable original
//! session.

use serde_json::json;

use crate::config::SecurityConfig;
use crate::models::{AuditEvent, AuditEventType, Session, User};
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::audit::AuditService;
use super::database::Database;
use super::error::ServiceError;

#[derive(Clone)]
pub struct ImpersonationService {
    db: Database,
    audit: AuditService,
    security: SecurityConfig,
}

impl ImpersonationService {
    pub fn new(db: Database, audit: AuditService, security: SecurityConfig) -> Self {
        Self { db, audit, security }
    }

    /// Start impersonating `target_user_id`.
    ///
    /// Requires the cross-account impersonation privilege; callers without
    /// it are hard-denied so target existence is not revealed. The admin's
    /// session is suspended, not destroyed, and a new session is opened
    /// whose acting user is the target. Guard decisions made under the new
    /// session therefore use the target's memberships only.
    pub async fn start(
        &self,
        admin: &User,
        admin_session: &Session,
        target_user_id: Uuid,
    ) -> Result<(Session, String), ServiceError> {
        if !admin.may_impersonate() {
            return Err(ServiceError::NotFound);
        }

        if admin_session.is_impersonation() {
            return Err(ServiceError::InvalidState(
                "Already impersonating a user".to_string(),
            ));
        }

        if target_user_id == admin.user_id {
            return Err(ServiceError::InvalidState(
                "Cannot impersonate yourself".to_string(),
            ));
        }

        let target = self
            .db
            .find_user_by_id(target_user_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let (token, token_hash) = Session::generate_token();
        let session = Session::new_impersonation(
            target.user_id,
            admin.user_id,
            admin_session.session_id,
            token_hash,
            self.security.session_expiry_hours,
        );

        let mut tx = self.db.begin().await?;
        let suspended = self
            .db
            .suspend_session_tx(&mut tx, admin_session.session_id)
            .await?;
        if suspended == 0 {
            // Someone else suspended or destroyed the session between the
            // request and now.
            return Err(ServiceError::Conflict);
        }
        self.db.insert_session_tx(&mut tx, &session).await?;
        tx.commit().await?;

        tracing::info!(
            impersonator = %admin.user_id,
            target = %target.user_id,
            "Impersonation started"
        );
        self.audit
            .record(AuditEvent::user_action(
                admin.user_id,
                AuditEventType::ImpersonationStarted,
                Some("user".to_string()),
                Some(target.user_id),
                Some(json!({ "session_id": session.session_id })),
            ))
            .await?;

        Ok((session, token))
    }

    /// Stop impersonating: drop the impersonation session and restore the
    /// suspended admin session under a fresh token.
    pub async fn stop(&self, session: &Session) -> Result<(Session, String), ServiceError> {
        let (impersonator_id, parent_id) =
            match (session.impersonator_user_id, session.parent_session_id) {
                (Some(impersonator), Some(parent)) => (impersonator, parent),
                _ => {
                    return Err(ServiceError::InvalidState(
                        "This session is not impersonating anyone".to_string(),
                    ))
                }
            };

        let (token, token_hash) = Session::generate_token();
        let expiry_utc = Utc::now() + Duration::hours(self.security.session_expiry_hours);

        let mut tx = self.db.begin().await?;
        self.db.delete_session_tx(&mut tx, session.session_id).await?;
        let restored = self
            .db
            .resume_session_tx(&mut tx, parent_id, &token_hash, expiry_utc)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState(
                    "The original session no longer exists; sign in again".to_string(),
                )
            })?;
        tx.commit().await?;

        tracing::info!(
            impersonator = %impersonator_id,
            target = %session.user_id,
            "Impersonation stopped"
        );
        self.audit
            .record(AuditEvent::user_action(
                impersonator_id,
                AuditEventType::ImpersonationStopped,
                Some("user".to_string()),
                Some(session.user_id),
                Some(json!({ "session_id": session.session_id })),
            ))
            .await?;

        Ok((restored, token))
    }
}
