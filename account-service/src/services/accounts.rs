//! Account switching, shape conversion, rename, and membership management.

use serde_json::json;
use uuid::Uuid;

use crate::models::{
    Account, AuditEvent, AuditEventType, Membership, Session,
};

use super::audit::AuditService;
use super::authz::{decide, AccountAction};
use super::database::Database;
use super::error::ServiceError;

/// Postgres error codes worth one retry before surfacing a conflict.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct AccountService {
    db: Database,
    audit: AuditService,
}

impl AccountService {
    pub fn new(db: Database, audit: AuditService) -> Self {
        Self { db, audit }
    }

    /// Create a team account owned by the acting user.
    pub async fn create_team(&self, user_id: Uuid, name: String) -> Result<Account, ServiceError> {
        let account = Account::new_team(user_id, name);
        let membership = Membership::new_owner(account.account_id, user_id);
        self.db.insert_account_with_owner(&account, &membership).await?;

        tracing::info!(account_id = %account.account_id, owner = %user_id, "Team account created");
        Ok(account)
    }

    /// Switch the session's acting account.
    ///
    /// Lookup is restricted to the user's membership set; an id outside it
    /// yields not-found whether or not the account exists. Switching to the
    /// already-current account is a no-op success. Ownership is not
    /// required.
    pub async fn switch(
        &self,
        session: &Session,
        account_id: Uuid,
    ) -> Result<Account, ServiceError> {
        let account = self
            .db
            .find_account_for_member(account_id, session.user_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if session.account_id == Some(account.account_id) {
            return Ok(account);
        }

        self.db
            .update_session_account(session.session_id, account.account_id)
            .await?;

        self.audit.record_background(AuditEvent::user_action(
            session.user_id,
            AuditEventType::AccountSwitched,
            Some("account".to_string()),
            Some(account.account_id),
            None,
        ));

        Ok(account)
    }

    /// Rename an account. Owner only.
    pub async fn rename(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        name: String,
    ) -> Result<Account, ServiceError> {
        let account = self.load_guarded(user_id, account_id, AccountAction::Rename).await?;

        self.db.rename_account(account.account_id, &name).await?;

        self.audit.record_background(AuditEvent::user_action(
            user_id,
            AuditEventType::AccountRenamed,
            Some("account".to_string()),
            Some(account.account_id),
            Some(json!({ "from": account.name, "to": name })),
        ));

        Ok(Account { name, ..account })
    }

    /// Convert a personal account into a team account. Owner only; the
    /// account must currently be personal. Membership is untouched.
    pub async fn to_team(&self, user_id: Uuid, account_id: Uuid) -> Result<(), ServiceError> {
        self.load_guarded(user_id, account_id, AccountAction::ConvertShape)
            .await?;

        self.with_conflict_retry(|| self.convert_shape(account_id, false))
            .await?;

        self.audit
            .record(AuditEvent::user_action(
                user_id,
                AuditEventType::AccountConvertedToTeam,
                Some("account".to_string()),
                Some(account_id),
                None,
            ))
            .await?;
        Ok(())
    }

    /// Convert a team account back into a personal account. Owner only;
    /// the account must currently be a team with exactly one membership.
    pub async fn to_personal(&self, user_id: Uuid, account_id: Uuid) -> Result<(), ServiceError> {
        self.load_guarded(user_id, account_id, AccountAction::ConvertShape)
            .await?;

        self.with_conflict_retry(|| self.convert_shape(account_id, true))
            .await?;

        self.audit
            .record(AuditEvent::user_action(
                user_id,
                AuditEventType::AccountConvertedToPersonal,
                Some("account".to_string()),
                Some(account_id),
                None,
            ))
            .await?;
        Ok(())
    }

    /// The locked conversion transaction. The shape check, the membership
    /// count and the flag flip all happen under the account row lock, so
    /// either the flag flips against a state that satisfies the invariant
    /// or nothing changes.
    async fn convert_shape(&self, account_id: Uuid, to_personal: bool) -> Result<(), ServiceError> {
        let mut tx = self.db.begin().await?;

        let account = self
            .db
            .lock_account_tx(&mut tx, account_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if to_personal {
            if account.personal {
                return Err(ServiceError::InvalidState(
                    "Account is already a personal account".to_string(),
                ));
            }
            let members = self.db.count_memberships_tx(&mut tx, account_id).await?;
            if members != 1 {
                return Err(ServiceError::InvalidState(
                    "Team accounts with more than one member cannot become personal".to_string(),
                ));
            }
        } else if !account.personal {
            return Err(ServiceError::InvalidState(
                "Account is already a team account".to_string(),
            ));
        }

        self.db
            .set_account_personal_tx(&mut tx, account_id, to_personal)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Add a member to an account. Requires the admin role (or ownership).
    pub async fn add_member(
        &self,
        actor_user_id: Uuid,
        account_id: Uuid,
        email: &str,
        admin: bool,
    ) -> Result<Membership, ServiceError> {
        let account = self
            .load_guarded(actor_user_id, account_id, AccountAction::ManageMembers)
            .await?;

        if account.personal {
            return Err(ServiceError::InvalidState(
                "Personal accounts cannot have additional members".to_string(),
            ));
        }

        let user = self
            .db
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::InvalidState("No user with that email".to_string()))?;

        let membership = if admin {
            Membership::new_admin(account_id, user.user_id)
        } else {
            Membership::new_member(account_id, user.user_id)
        };

        let mut tx = self.db.begin().await?;
        // Lock serializes against a concurrent to_personal conversion.
        self.db
            .lock_account_tx(&mut tx, account_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        match self.db.insert_membership_tx(&mut tx, &membership).await {
            Ok(()) => {}
            Err(ServiceError::Database(e)) if has_pg_code(&e, UNIQUE_VIOLATION) => {
                return Err(ServiceError::InvalidState(
                    "Already a member of this account".to_string(),
                ));
            }
            Err(e) => return Err(e),
        }
        tx.commit().await?;

        self.audit.record_background(AuditEvent::user_action(
            actor_user_id,
            AuditEventType::MemberAdded,
            Some("membership".to_string()),
            Some(membership.membership_id),
            Some(json!({ "account_id": account_id, "user_id": user.user_id })),
        ));

        Ok(membership)
    }

    /// Remove a member from an account. Owner only; the owner's own
    /// membership can never be removed.
    pub async fn remove_member(
        &self,
        actor_user_id: Uuid,
        account_id: Uuid,
        member_user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let account = self
            .load_guarded(actor_user_id, account_id, AccountAction::RemoveMembers)
            .await?;

        if member_user_id == account.owner_user_id {
            return Err(ServiceError::InvalidState(
                "The account owner cannot be removed".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        self.db
            .lock_account_tx(&mut tx, account_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let removed = self
            .db
            .delete_membership_tx(&mut tx, account_id, member_user_id)
            .await?;
        if removed == 0 {
            return Err(ServiceError::InvalidState(
                "Not a member of this account".to_string(),
            ));
        }
        tx.commit().await?;

        self.audit.record_background(AuditEvent::user_action(
            actor_user_id,
            AuditEventType::MemberRemoved,
            Some("account".to_string()),
            Some(account_id),
            Some(json!({ "user_id": member_user_id })),
        ));

        Ok(())
    }

    /// List the acting user's accounts.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Account>, ServiceError> {
        self.db.list_accounts_for_member(user_id).await
    }

    /// Load an account and run the guard for the given action. The guard's
    /// hard denial already covers both "no such account" and "not a
    /// member".
    async fn load_guarded(
        &self,
        user_id: Uuid,
        account_id: Uuid,
        action: AccountAction,
    ) -> Result<Account, ServiceError> {
        let account = self
            .db
            .find_account_by_id(account_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let membership = self.db.find_membership(account_id, user_id).await?;

        decide(user_id, &account, membership.as_ref(), action).require()?;
        Ok(account)
    }

    /// Run an operation, retrying once on a transient store conflict.
    async fn with_conflict_retry<F, Fut>(&self, op: F) -> Result<(), ServiceError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<(), ServiceError>>,
    {
        match op().await {
            Err(ServiceError::Database(e)) if is_retryable(&e) => {
                tracing::debug!(error = %e, "Retrying after transient conflict");
                op().await.map_err(|err| match err {
                    ServiceError::Database(e) if is_retryable(&e) => ServiceError::Conflict,
                    other => other,
                })
            }
            other => other,
        }
    }
}

fn is_retryable(e: &sqlx::Error) -> bool {
    has_pg_code(e, SERIALIZATION_FAILURE) || has_pg_code(e, DEADLOCK_DETECTED)
}

fn has_pg_code(e: &sqlx::Error, code: &str) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(code))
}
