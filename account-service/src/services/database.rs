//! PostgreSQL database service.
//!
//! Typed query wrapper over the connection pool. Multi-step invariants
//! (account conversion, membership changes, impersonation handover,
//! recovery-code replacement) run inside transactions; the `_tx` helpers
//! here are the only place that SQL lives.

use chrono::Utc;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    Account, AuditEvent, LoginChallenge, Membership, RecoveryCode, Session, TotpEnrollment, User,
};

use super::error::ServiceError;

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, ServiceError> {
        Ok(self.pool.begin().await?)
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Find user by ID.
    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Find user by email (case-insensitive).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    /// Insert a new user inside a transaction.
    pub async fn insert_user_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        user: &User,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO users
                (user_id, email, password_hash, display_name, verified,
                 totp_secret, otp_required_for_login, platform_admin, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .bind(user.verified)
        .bind(&user.totp_secret)
        .bind(user.otp_required_for_login)
        .bind(user.platform_admin)
        .bind(user.created_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Persist a confirmed TOTP secret and issue the first recovery-code
    /// batch in one transaction: flag + secret flip together, the
    /// enrollment row disappears, and any prior codes are discarded.
    pub async fn enable_two_factor(
        &self,
        user_id: Uuid,
        secret: &str,
        codes: &[RecoveryCode],
    ) -> Result<(), ServiceError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            "UPDATE users SET totp_secret = $2, otp_required_for_login = TRUE WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(secret)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM totp_enrollments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        self.replace_recovery_codes_tx(&mut tx, user_id, codes).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Clear the secret, the flag, and every recovery code atomically.
    pub async fn disable_two_factor(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            "UPDATE users SET totp_secret = NULL, otp_required_for_login = FALSE WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM recovery_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM totp_enrollments WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ==================== Account Operations ====================

    /// Find account by ID.
    pub async fn find_account_by_id(
        &self,
        account_id: Uuid,
    ) -> Result<Option<Account>, ServiceError> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    /// Find an account restricted to the set the user is a member of.
    /// Returns None both for unknown ids and for accounts the user cannot
    /// see, so callers cannot distinguish the two.
    pub async fn find_account_for_member(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Account>, ServiceError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.* FROM accounts a
            JOIN memberships m ON m.account_id = a.account_id
            WHERE a.account_id = $1 AND m.user_id = $2 AND m.member
            "#,
        )
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    /// List every account the user is a member of.
    pub async fn list_accounts_for_member(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Account>, ServiceError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.* FROM accounts a
            JOIN memberships m ON m.account_id = a.account_id
            WHERE m.user_id = $1 AND m.member
            ORDER BY a.created_utc
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(accounts)
    }

    /// Insert an account together with its owner membership.
    pub async fn insert_account_with_owner(
        &self,
        account: &Account,
        owner_membership: &Membership,
    ) -> Result<(), ServiceError> {
        let mut tx = self.begin().await?;
        self.insert_account_tx(&mut tx, account).await?;
        self.insert_membership_tx(&mut tx, owner_membership).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert an account inside a transaction.
    pub async fn insert_account_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account: &Account,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, name, owner_user_id, personal, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.account_id)
        .bind(&account.name)
        .bind(account.owner_user_id)
        .bind(account.personal)
        .bind(account.created_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Rename an account.
    pub async fn rename_account(&self, account_id: Uuid, name: &str) -> Result<(), ServiceError> {
        sqlx::query("UPDATE accounts SET name = $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Lock an account row for the remainder of the transaction. Shape
    /// conversions and membership changes all go through this lock so they
    /// serialize against each other.
    pub async fn lock_account_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: Uuid,
    ) -> Result<Option<Account>, ServiceError> {
        let account =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE account_id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut **tx)
                .await?;
        Ok(account)
    }

    /// Flip the personal shape flag inside a transaction.
    pub async fn set_account_personal_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: Uuid,
        personal: bool,
    ) -> Result<(), ServiceError> {
        sqlx::query("UPDATE accounts SET personal = $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(personal)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    // ==================== Membership Operations ====================

    /// Find a user's membership on an account.
    pub async fn find_membership(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, ServiceError> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE account_id = $1 AND user_id = $2",
        )
        .bind(account_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    /// Count effective memberships inside a transaction (after the account
    /// row has been locked).
    pub async fn count_memberships_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: Uuid,
    ) -> Result<i64, ServiceError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM memberships WHERE account_id = $1 AND member",
        )
        .bind(account_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    /// Insert a membership inside a transaction.
    pub async fn insert_membership_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        membership: &Membership,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO memberships (membership_id, account_id, user_id, admin, member, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(membership.membership_id)
        .bind(membership.account_id)
        .bind(membership.user_id)
        .bind(membership.admin)
        .bind(membership.member)
        .bind(membership.created_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Delete a membership inside a transaction; returns affected rows.
    pub async fn delete_membership_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM memberships WHERE account_id = $1 AND user_id = $2")
            .bind(account_id)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    // ==================== Session Operations ====================

    /// Insert a new session.
    pub async fn insert_session(&self, session: &Session) -> Result<(), ServiceError> {
        let mut tx = self.begin().await?;
        self.insert_session_tx(&mut tx, session).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert a session inside a transaction.
    pub async fn insert_session_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        session: &Session,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (session_id, token_hash, user_id, account_id, impersonator_user_id,
                 parent_session_id, suspended_utc, expiry_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.session_id)
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.account_id)
        .bind(session.impersonator_user_id)
        .bind(session.parent_session_id)
        .bind(session.suspended_utc)
        .bind(session.expiry_utc)
        .bind(session.created_utc)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Find a session by bearer-token hash. Expired sessions are deleted on
    /// sight and reported as absent (lazy expiry).
    pub async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, ServiceError> {
        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token_hash = $1")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;

        match session {
            Some(s) if s.is_expired() => {
                self.delete_session(s.session_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Point a session at a different acting account.
    pub async fn update_session_account(
        &self,
        session_id: Uuid,
        account_id: Uuid,
    ) -> Result<(), ServiceError> {
        sqlx::query("UPDATE sessions SET account_id = $2 WHERE session_id = $1")
            .bind(session_id)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Suspend a session inside a transaction; returns affected rows (zero
    /// when the session was already suspended or gone).
    pub async fn suspend_session_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        session_id: Uuid,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE sessions SET suspended_utc = $2 WHERE session_id = $1 AND suspended_utc IS NULL",
        )
        .bind(session_id)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reactivate a suspended session with a fresh token inside a
    /// transaction, returning the updated row.
    pub async fn resume_session_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        session_id: Uuid,
        token_hash: &str,
        expiry_utc: chrono::DateTime<Utc>,
    ) -> Result<Option<Session>, ServiceError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET suspended_utc = NULL, token_hash = $2, expiry_utc = $3
            WHERE session_id = $1 AND suspended_utc IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(token_hash)
        .bind(expiry_utc)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(session)
    }

    /// Delete a session.
    pub async fn delete_session(&self, session_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a session inside a transaction.
    pub async fn delete_session_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        session_id: Uuid,
    ) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    // ==================== Login Challenge Operations ====================

    /// Insert a login challenge.
    pub async fn insert_challenge(&self, challenge: &LoginChallenge) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO login_challenges (challenge_id, token_hash, user_id, expiry_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(challenge.challenge_id)
        .bind(&challenge.token_hash)
        .bind(challenge.user_id)
        .bind(challenge.expiry_utc)
        .bind(challenge.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find a challenge by token hash. Expired challenges are deleted on
    /// sight and reported as absent.
    pub async fn find_challenge_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<LoginChallenge>, ServiceError> {
        let challenge = sqlx::query_as::<_, LoginChallenge>(
            "SELECT * FROM login_challenges WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        match challenge {
            Some(c) if c.is_expired() => {
                self.delete_challenge(c.challenge_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Delete a challenge; returns affected rows so concurrent consumers
    /// can detect they lost the race.
    pub async fn delete_challenge(&self, challenge_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM login_challenges WHERE challenge_id = $1")
            .bind(challenge_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ==================== TOTP Enrollment Operations ====================

    /// Create or restart an enrollment; restarting replaces the secret.
    pub async fn upsert_enrollment(
        &self,
        enrollment: &TotpEnrollment,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO totp_enrollments (user_id, secret, expiry_utc, created_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id)
            DO UPDATE SET secret = $2, expiry_utc = $3, created_utc = $4
            "#,
        )
        .bind(enrollment.user_id)
        .bind(&enrollment.secret)
        .bind(enrollment.expiry_utc)
        .bind(enrollment.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Find a user's unconfirmed enrollment. Expired enrollments are
    /// deleted on sight and reported as absent.
    pub async fn find_enrollment(
        &self,
        user_id: Uuid,
    ) -> Result<Option<TotpEnrollment>, ServiceError> {
        let enrollment = sqlx::query_as::<_, TotpEnrollment>(
            "SELECT * FROM totp_enrollments WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match enrollment {
            Some(e) if e.is_expired() => {
                self.delete_enrollment(user_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Delete a user's enrollment.
    pub async fn delete_enrollment(&self, user_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM totp_enrollments WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Recovery Code Operations ====================

    /// List a user's unused recovery codes.
    pub async fn list_unused_recovery_codes(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RecoveryCode>, ServiceError> {
        let codes = sqlx::query_as::<_, RecoveryCode>(
            "SELECT * FROM recovery_codes WHERE user_id = $1 AND used_utc IS NULL ORDER BY created_utc",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Consume a recovery code. The `used_utc IS NULL` guard makes this a
    /// conditional update: of two concurrent consumers exactly one sees an
    /// affected row.
    pub async fn consume_recovery_code(&self, code_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE recovery_codes SET used_utc = $2 WHERE code_id = $1 AND used_utc IS NULL",
        )
        .bind(code_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Replace a user's entire recovery-code set atomically.
    pub async fn replace_recovery_codes(
        &self,
        user_id: Uuid,
        codes: &[RecoveryCode],
    ) -> Result<(), ServiceError> {
        let mut tx = self.begin().await?;
        self.replace_recovery_codes_tx(&mut tx, user_id, codes).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_recovery_codes_tx(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        user_id: Uuid,
        codes: &[RecoveryCode],
    ) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM recovery_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        for code in codes {
            sqlx::query(
                r#"
                INSERT INTO recovery_codes (code_id, user_id, code, used_utc, created_utc)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(code.code_id)
            .bind(code.user_id)
            .bind(&code.code)
            .bind(code.used_utc)
            .bind(code.created_utc)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    // ==================== Audit Operations ====================

    /// Insert an audit event.
    pub async fn insert_audit_event(&self, event: &AuditEvent) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events
                (event_id, actor_user_id, event_type_code, target_type, target_id,
                 event_data, ip_address, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id)
        .bind(event.actor_user_id)
        .bind(&event.event_type_code)
        .bind(&event.target_type)
        .bind(event.target_id)
        .bind(&event.event_data)
        .bind(&event.ip_address)
        .bind(event.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
