//! Recovery code format and matching semantics.

use account_service::models::{RecoveryCode, RECOVERY_CODE_BATCH, RECOVERY_CODE_LENGTH};
use account_service::services::recovery;
use uuid::Uuid;

#[test]
fn a_generation_issues_exactly_ten_codes() {
    assert_eq!(recovery::generate_batch().len(), RECOVERY_CODE_BATCH);
}

#[test]
fn codes_are_fixed_length_alphanumeric() {
    for code in recovery::generate_batch() {
        assert_eq!(code.len(), RECOVERY_CODE_LENGTH);
        assert!(code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }
}

#[test]
fn input_matching_is_case_insensitive() {
    let stored = recovery::generate_batch().remove(0);
    let lowered = stored.to_lowercase();

    assert!(recovery::matches(&recovery::normalize(&lowered), &stored));
    assert!(recovery::matches(
        &recovery::normalize(&format!("  {}  ", lowered)),
        &stored
    ));
}

#[test]
fn near_misses_do_not_match() {
    let stored = "A1B2C3D4E5F6";
    assert!(!recovery::matches(&recovery::normalize("A1B2C3D4E5F0"), stored));
    assert!(!recovery::matches(&recovery::normalize("A1B2C3D4E5F"), stored));
    assert!(!recovery::matches(&recovery::normalize(""), stored));
}

#[test]
fn fresh_codes_start_unused() {
    let user_id = Uuid::new_v4();
    for code in recovery::generate_batch() {
        let row = RecoveryCode::new(user_id, code);
        assert!(!row.is_used());
        assert!(row.used_utc.is_none());
    }
}
