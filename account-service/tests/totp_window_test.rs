//! TOTP clock-skew window boundaries.

use account_service::services::totp;
use chrono::{DateTime, TimeZone, Utc};

// RFC 6238 appendix B secret ("12345678901234567890" in base32).
const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

fn at(timestamp: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(timestamp, 0).unwrap()
}

#[test]
fn code_accepted_at_issue_time_and_one_step_either_side() {
    let t0 = 1_234_567_890;
    let code = totp::code_at(SECRET, at(t0)).unwrap();

    assert!(totp::verify(SECRET, &code, at(t0)));
    assert!(totp::verify(SECRET, &code, at(t0 + 30)));
    assert!(totp::verify(SECRET, &code, at(t0 - 30)));
}

#[test]
fn code_rejected_three_steps_out() {
    let t0 = 1_234_567_890;
    let code = totp::code_at(SECRET, at(t0)).unwrap();

    assert!(!totp::verify(SECRET, &code, at(t0 + 90)));
    assert!(!totp::verify(SECRET, &code, at(t0 - 90)));
}

#[test]
fn fresh_secrets_round_trip() {
    let secret = totp::generate_secret();
    let now = at(1_700_000_000);
    let code = totp::code_at(&secret, now).unwrap();

    assert_eq!(code.len(), totp::DIGITS as usize);
    assert!(totp::verify(&secret, &code, now));
}

#[test]
fn codes_from_a_different_secret_never_verify() {
    let now = at(1_700_000_000);
    let code = totp::code_at(SECRET, now).unwrap();
    let other = totp::generate_secret();

    // Astronomically unlikely to collide; treat as deterministic.
    assert!(!totp::verify(&other, &code, now) || totp::code_at(&other, now).unwrap() == code);
}

#[test]
fn garbage_secret_rejects_all_codes() {
    let now = at(1_700_000_000);
    assert!(!totp::verify("not-base32!!", "123456", now));
    assert!(!totp::verify("", "123456", now));
}
