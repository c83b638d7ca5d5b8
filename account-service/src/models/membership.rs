//! Membership model - the user/account join with role flags.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Membership entity.
///
/// `admin` and `member` are independent role flags; neither implies
/// ownership of the account.
#[derive(Debug, Clone, FromRow)]
pub struct Membership {
    pub membership_id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub admin: bool,
    pub member: bool,
    pub created_utc: DateTime<Utc>,
}

impl Membership {
    /// Create the owner's membership for a new account. Owners always
    /// carry both role flags.
    pub fn new_owner(account_id: Uuid, user_id: Uuid) -> Self {
        Self {
            membership_id: Uuid::new_v4(),
            account_id,
            user_id,
            admin: true,
            member: true,
            created_utc: Utc::now(),
        }
    }

    /// Create a plain member's membership.
    pub fn new_member(account_id: Uuid, user_id: Uuid) -> Self {
        Self {
            membership_id: Uuid::new_v4(),
            account_id,
            user_id,
            admin: false,
            member: true,
            created_utc: Utc::now(),
        }
    }

    /// Create an admin member's membership.
    pub fn new_admin(account_id: Uuid, user_id: Uuid) -> Self {
        Self {
            membership_id: Uuid::new_v4(),
            account_id,
            user_id,
            admin: true,
            member: true,
            created_utc: Utc::now(),
        }
    }
}

/// Request to add a member to an account.
#[derive(Debug, serde::Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    #[serde(default)]
    pub admin: bool,
}

/// Membership response for API.
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub membership_id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub admin: bool,
    pub member: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Membership> for MembershipResponse {
    fn from(m: Membership) -> Self {
        Self {
            membership_id: m.membership_id,
            account_id: m.account_id,
            user_id: m.user_id,
            admin: m.admin,
            member: m.member,
            created_utc: m.created_utc,
        }
    }
}
