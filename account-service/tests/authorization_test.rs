//! Authorization guard behavior across the user/account/action matrix.

use account_service::models::{Account, Membership};
use account_service::services::{decide, AccessDecision, AccountAction, DenyReason};
use uuid::Uuid;

const ALL_ACTIONS: [AccountAction; 6] = [
    AccountAction::View,
    AccountAction::ManageMembers,
    AccountAction::RemoveMembers,
    AccountAction::Rename,
    AccountAction::ConvertShape,
    AccountAction::Destroy,
];

const OWNER_ONLY_ACTIONS: [AccountAction; 4] = [
    AccountAction::Rename,
    AccountAction::ConvertShape,
    AccountAction::Destroy,
    AccountAction::RemoveMembers,
];

#[test]
fn hard_deny_iff_no_membership_exists() {
    let owner = Uuid::new_v4();
    let outsider = Uuid::new_v4();
    let account = Account::new_team(owner, "Ops".into());
    let owner_membership = Membership::new_owner(account.account_id, owner);

    for action in ALL_ACTIONS {
        // No membership: always hidden.
        assert_eq!(
            decide(outsider, &account, None, action),
            AccessDecision::HardDenied
        );
        // A membership never produces a hard denial.
        assert_ne!(
            decide(owner, &account, Some(&owner_membership), action),
            AccessDecision::HardDenied
        );
    }
}

#[test]
fn owner_only_actions_require_ownership_not_admin_role() {
    let owner = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let account = Account::new_team(owner, "Ops".into());
    let owner_membership = Membership::new_owner(account.account_id, owner);
    let admin_membership = Membership::new_admin(account.account_id, admin);

    for action in OWNER_ONLY_ACTIONS {
        assert_eq!(
            decide(owner, &account, Some(&owner_membership), action),
            AccessDecision::Allowed
        );
        assert_eq!(
            decide(admin, &account, Some(&admin_membership), action),
            AccessDecision::SoftDenied(DenyReason::NotOwner)
        );
    }
}

#[test]
fn soft_denials_carry_a_specific_reason() {
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let account = Account::new_team(owner, "Ops".into());
    let membership = Membership::new_member(account.account_id, member);

    match decide(member, &account, Some(&membership), AccountAction::Rename) {
        AccessDecision::SoftDenied(reason) => {
            assert_eq!(reason, DenyReason::NotOwner);
            assert!(!reason.user_message().is_empty());
        }
        other => panic!("expected soft denial, got {:?}", other),
    }

    match decide(
        member,
        &account,
        Some(&membership),
        AccountAction::ManageMembers,
    ) {
        AccessDecision::SoftDenied(reason) => assert_eq!(reason, DenyReason::NotAdmin),
        other => panic!("expected soft denial, got {:?}", other),
    }
}

// While impersonating, decisions are made with the target's memberships
// only: an admin who belongs to account A but impersonates a user with no
// membership there is hidden from A like any outsider.
#[test]
fn impersonated_identity_narrows_privilege() {
    let admin = Uuid::new_v4();
    let target = Uuid::new_v4();

    let account_a = Account::new_team(admin, "Admins Own Team".into());
    let account_b = Account::new_team(target, "Targets Team".into());
    let target_membership_b = Membership::new_owner(account_b.account_id, target);

    // Acting as the target: account A has no membership row for them.
    assert_eq!(
        decide(target, &account_a, None, AccountAction::View),
        AccessDecision::HardDenied
    );

    // The target's own account stays reachable.
    assert_eq!(
        decide(
            target,
            &account_b,
            Some(&target_membership_b),
            AccountAction::View
        ),
        AccessDecision::Allowed
    );
}

#[test]
fn guard_is_pure_and_repeatable() {
    let owner = Uuid::new_v4();
    let account = Account::new_team(owner, "Ops".into());
    let membership = Membership::new_owner(account.account_id, owner);

    for _ in 0..3 {
        assert_eq!(
            decide(owner, &account, Some(&membership), AccountAction::ConvertShape),
            AccessDecision::Allowed
        );
    }
}
