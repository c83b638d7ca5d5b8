//! Authorization guard - pure account-scoped access decisions.
//!
//! Callers receive an explicit tagged decision and must match on it; the
//! guard itself never touches request state and can be evaluated any
//! number of times per request.

use uuid::Uuid;

use crate::models::{Account, Membership};

use super::error::ServiceError;

/// Account-scoped actions subject to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    /// Read account pages, switch into the account.
    View,
    /// Invite members. Requires the admin role flag.
    ManageMembers,
    /// Remove members. Owner only.
    RemoveMembers,
    /// Rename the account. Owner only.
    Rename,
    /// Convert between personal and team shape. Owner only.
    ConvertShape,
    /// Destroy the account. Owner only.
    Destroy,
}

impl AccountAction {
    /// Owner-only actions ignore the admin role flag entirely.
    fn requires_owner(&self) -> bool {
        matches!(
            self,
            AccountAction::Rename
                | AccountAction::ConvertShape
                | AccountAction::Destroy
                | AccountAction::RemoveMembers
        )
    }

    fn requires_admin(&self) -> bool {
        matches!(self, AccountAction::ManageMembers)
    }
}

/// Why a member was refused a specific action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotOwner,
    NotAdmin,
}

impl DenyReason {
    pub fn user_message(&self) -> &'static str {
        match self {
            DenyReason::NotOwner => "Only the account owner can do that",
            DenyReason::NotAdmin => "Only an account admin can do that",
        }
    }
}

/// The guard's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    /// Member lacking the specific right; surfaced with a reason.
    SoftDenied(DenyReason),
    /// No membership at all; surfaced as not-found to hide existence.
    HardDenied,
}

impl AccessDecision {
    /// Convert into a service result, collapsing the two denial shapes to
    /// their error-taxonomy counterparts.
    pub fn require(self) -> Result<(), ServiceError> {
        match self {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::SoftDenied(reason) => Err(ServiceError::Denied(reason)),
            AccessDecision::HardDenied => Err(ServiceError::NotFound),
        }
    }
}

/// Decide whether `user_id` may perform `action` on `account`.
///
/// `membership` is the user's membership row on the account, if any.
/// Ownership is `account.owner_user_id == user_id` and nothing else; an
/// admin member is not an owner.
pub fn decide(
    user_id: Uuid,
    account: &Account,
    membership: Option<&Membership>,
    action: AccountAction,
) -> AccessDecision {
    let membership = match membership {
        Some(m) if m.member => m,
        // A row with the member flag cleared is not an effective membership.
        _ => return AccessDecision::HardDenied,
    };

    if action.requires_owner() {
        if account.owned_by(user_id) {
            return AccessDecision::Allowed;
        }
        return AccessDecision::SoftDenied(DenyReason::NotOwner);
    }

    if action.requires_admin() {
        if membership.admin || account.owned_by(user_id) {
            return AccessDecision::Allowed;
        }
        return AccessDecision::SoftDenied(DenyReason::NotAdmin);
    }

    AccessDecision::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, Membership};

    fn account_owned_by(owner: Uuid) -> Account {
        Account::new_team(owner, "Acme".into())
    }

    #[test]
    fn no_membership_is_hard_denied_for_every_action() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let account = account_owned_by(owner);

        for action in [
            AccountAction::View,
            AccountAction::ManageMembers,
            AccountAction::RemoveMembers,
            AccountAction::Rename,
            AccountAction::ConvertShape,
            AccountAction::Destroy,
        ] {
            assert_eq!(
                decide(stranger, &account, None, action),
                AccessDecision::HardDenied
            );
        }
    }

    #[test]
    fn owner_is_allowed_everything() {
        let owner = Uuid::new_v4();
        let account = account_owned_by(owner);
        let membership = Membership::new_owner(account.account_id, owner);

        for action in [
            AccountAction::View,
            AccountAction::ManageMembers,
            AccountAction::RemoveMembers,
            AccountAction::Rename,
            AccountAction::ConvertShape,
            AccountAction::Destroy,
        ] {
            assert_eq!(
                decide(owner, &account, Some(&membership), action),
                AccessDecision::Allowed
            );
        }
    }

    #[test]
    fn admin_member_is_soft_denied_owner_only_actions() {
        let owner = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let account = account_owned_by(owner);
        let membership = Membership::new_admin(account.account_id, admin);

        for action in [
            AccountAction::Rename,
            AccountAction::ConvertShape,
            AccountAction::Destroy,
            AccountAction::RemoveMembers,
        ] {
            assert_eq!(
                decide(admin, &account, Some(&membership), action),
                AccessDecision::SoftDenied(DenyReason::NotOwner)
            );
        }
    }

    #[test]
    fn admin_member_may_manage_members() {
        let owner = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let account = account_owned_by(owner);
        let membership = Membership::new_admin(account.account_id, admin);

        assert_eq!(
            decide(admin, &account, Some(&membership), AccountAction::ManageMembers),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn plain_member_may_view_but_not_manage() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let account = account_owned_by(owner);
        let membership = Membership::new_member(account.account_id, member);

        assert_eq!(
            decide(member, &account, Some(&membership), AccountAction::View),
            AccessDecision::Allowed
        );
        assert_eq!(
            decide(member, &account, Some(&membership), AccountAction::ManageMembers),
            AccessDecision::SoftDenied(DenyReason::NotAdmin)
        );
        assert_eq!(
            decide(member, &account, Some(&membership), AccountAction::Rename),
            AccessDecision::SoftDenied(DenyReason::NotOwner)
        );
    }

    #[test]
    fn cleared_member_flag_counts_as_no_membership() {
        let owner = Uuid::new_v4();
        let user = Uuid::new_v4();
        let account = account_owned_by(owner);
        let mut membership = Membership::new_member(account.account_id, user);
        membership.member = false;

        assert_eq!(
            decide(user, &account, Some(&membership), AccountAction::View),
            AccessDecision::HardDenied
        );
    }

    #[test]
    fn decision_is_deterministic() {
        let owner = Uuid::new_v4();
        let account = account_owned_by(owner);
        let membership = Membership::new_owner(account.account_id, owner);

        let first = decide(owner, &account, Some(&membership), AccountAction::Rename);
        let second = decide(owner, &account, Some(&membership), AccountAction::Rename);
        assert_eq!(first, second);
    }
}
