//! Account model - the billable/organizational unit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Account entity.
///
/// Every account has exactly one owner, who is always also a member.
/// Ownership is a column on the account, never inferred from the admin
/// role flag on a membership.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub account_id: Uuid,
    pub name: String,
    pub owner_user_id: Uuid,
    pub personal: bool,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    /// Create a new personal account for a user.
    pub fn new_personal(owner_user_id: Uuid, name: String) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            name,
            owner_user_id,
            personal: true,
            created_utc: Utc::now(),
        }
    }

    /// Create a new team account.
    pub fn new_team(owner_user_id: Uuid, name: String) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            name,
            owner_user_id,
            personal: false,
            created_utc: Utc::now(),
        }
    }

    /// Check whether a user is this account's owner.
    pub fn owned_by(&self, user_id: Uuid) -> bool {
        self.owner_user_id == user_id
    }
}

/// Request to create a team account.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// Request to rename an account.
#[derive(Debug, serde::Deserialize, Validate)]
pub struct RenameAccountRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// Account response for API.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub name: String,
    pub owner_user_id: Uuid,
    pub personal: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            account_id: a.account_id,
            name: a.name,
            owner_user_id: a.owner_user_id,
            personal: a.personal,
            created_utc: a.created_utc,
        }
    }
}
