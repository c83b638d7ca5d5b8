//! Session model - one authenticated client, its acting account, and an
//! optional impersonator link.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Session entity.
///
/// Invariant: `impersonator_user_id` and `parent_session_id` are either
/// both set (an impersonation session, with the suspended admin session to
/// restore) or both absent. Constructors are the only way to build one.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub account_id: Option<Uuid>,
    pub impersonator_user_id: Option<Uuid>,
    pub parent_session_id: Option<Uuid>,
    pub suspended_utc: Option<DateTime<Utc>>,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl Session {
    /// Create a new session for a signed-in user.
    pub fn new(user_id: Uuid, token_hash: String, expiry_hours: i64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            token_hash,
            user_id,
            account_id: None,
            impersonator_user_id: None,
            parent_session_id: None,
            suspended_utc: None,
            expiry_utc: Utc::now() + Duration::hours(expiry_hours),
            created_utc: Utc::now(),
        }
    }

    /// Create an impersonation session acting as `target_user_id`,
    /// anchored to the admin session it will restore on stop.
    pub fn new_impersonation(
        target_user_id: Uuid,
        impersonator_user_id: Uuid,
        parent_session_id: Uuid,
        token_hash: String,
        expiry_hours: i64,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            token_hash,
            user_id: target_user_id,
            account_id: None,
            impersonator_user_id: Some(impersonator_user_id),
            parent_session_id: Some(parent_session_id),
            suspended_utc: None,
            expiry_utc: Utc::now() + Duration::hours(expiry_hours),
            created_utc: Utc::now(),
        }
    }

    /// Generate a fresh opaque bearer token and its storage hash.
    pub fn generate_token() -> (String, String) {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let hash = Self::hash_token(&token);
        (token, hash)
    }

    /// Hash a bearer token for storage/lookup.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check if the session is still usable.
    pub fn is_valid(&self) -> bool {
        self.suspended_utc.is_none() && self.expiry_utc > Utc::now()
    }

    /// Check if the session has expired.
    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    /// Check if this session is acting on behalf of an impersonator.
    pub fn is_impersonation(&self) -> bool {
        self.impersonator_user_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_hashed() {
        let (token_a, hash_a) = Session::generate_token();
        let (token_b, hash_b) = Session::generate_token();

        assert_ne!(token_a, token_b);
        assert_ne!(hash_a, hash_b);
        assert_eq!(hash_a, Session::hash_token(&token_a));
        assert_ne!(token_a, hash_a);
    }

    #[test]
    fn impersonation_session_carries_both_links() {
        let target = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let (_, hash) = Session::generate_token();

        let session = Session::new_impersonation(target, admin, parent, hash, 72);

        assert!(session.is_impersonation());
        assert_eq!(session.user_id, target);
        assert_eq!(session.impersonator_user_id, Some(admin));
        assert_eq!(session.parent_session_id, Some(parent));
    }

    #[test]
    fn plain_session_has_no_impersonation_links() {
        let (_, hash) = Session::generate_token();
        let session = Session::new(Uuid::new_v4(), hash, 72);

        assert!(!session.is_impersonation());
        assert!(session.parent_session_id.is_none());
        assert!(session.is_valid());
    }
}
