//! Time-based one-time passwords (RFC 6238 over RFC 4226).
//!
//! 30-second step, 6-digit codes, HMAC-SHA1, with a ±1 step window to
//! tolerate clock drift between the server and the authenticator app.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Seconds per time step.
pub const STEP_SECONDS: u64 = 30;

/// Digits per code.
pub const DIGITS: u32 = 6;

/// Accepted steps either side of the current one.
pub const SKEW_STEPS: i64 = 1;

const BASE32: base32::Alphabet = base32::Alphabet::Rfc4648 { padding: false };

/// Generate a fresh 160-bit secret, base32-encoded for authenticator apps.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    base32::encode(BASE32, &bytes)
}

/// Build the otpauth:// provisioning URI an authenticator app can scan.
pub fn provisioning_uri(secret: &str, issuer: &str, account_label: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(account_label),
        secret,
        urlencoding::encode(issuer),
        DIGITS,
        STEP_SECONDS,
    )
}

/// Verify a submitted code against a base32 secret at the given time.
///
/// Accepts the current step and SKEW_STEPS either side; every candidate is
/// compared constant-time and all candidates are always evaluated.
pub fn verify(secret: &str, code: &str, at: DateTime<Utc>) -> bool {
    let code = code.trim();
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let key = match base32::decode(BASE32, secret) {
        Some(key) if !key.is_empty() => key,
        _ => return false,
    };

    let timestamp = at.timestamp();
    if timestamp < 0 {
        return false;
    }
    let current_step = timestamp as u64 / STEP_SECONDS;

    let mut matched = subtle::Choice::from(0u8);
    for skew in -SKEW_STEPS..=SKEW_STEPS {
        let step = match current_step.checked_add_signed(skew as i64) {
            Some(step) => step,
            None => continue,
        };
        let expected = code_for_step(&key, step);
        matched |= expected.as_bytes().ct_eq(code.as_bytes());
    }
    matched.into()
}

/// Compute the code for a raw key at a given step (RFC 4226 dynamic
/// truncation).
fn code_for_step(key: &[u8], step: u64) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&step.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    let code = binary % 10u32.pow(DIGITS);
    format!("{:0width$}", code, width = DIGITS as usize)
}

/// Compute the code for a base32 secret at a given time.
///
/// Verification during sign-in goes through `verify`; this is the
/// generation side, for enrollment previews and test tooling.
pub fn code_at(secret: &str, at: DateTime<Utc>) -> Option<String> {
    if at.timestamp() < 0 {
        return None;
    }
    let key = base32::decode(BASE32, secret)?;
    let step = at.timestamp() as u64 / STEP_SECONDS;
    Some(code_for_step(&key, step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // RFC 6238 appendix B secret ("12345678901234567890" in base32).
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn at(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(timestamp, 0).unwrap()
    }

    #[test]
    fn rfc6238_reference_codes() {
        // Low-order six digits of the RFC 6238 SHA-1 reference values.
        let cases = [
            (59, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
        ];
        for (timestamp, expected) in cases {
            assert_eq!(
                code_at(RFC_SECRET, at(timestamp)).as_deref(),
                Some(expected),
                "timestamp {}",
                timestamp
            );
        }
    }

    #[test]
    fn code_valid_within_one_step_either_side() {
        let t0 = 1_111_111_109;
        let code = code_at(RFC_SECRET, at(t0)).unwrap();

        assert!(verify(RFC_SECRET, &code, at(t0)));
        assert!(verify(RFC_SECRET, &code, at(t0 + 30)));
        assert!(verify(RFC_SECRET, &code, at(t0 - 30)));
    }

    #[test]
    fn code_invalid_three_steps_away() {
        let t0 = 1_111_111_109;
        let code = code_at(RFC_SECRET, at(t0)).unwrap();

        assert!(!verify(RFC_SECRET, &code, at(t0 + 90)));
        assert!(!verify(RFC_SECRET, &code, at(t0 - 90)));
    }

    #[test]
    fn malformed_codes_rejected() {
        let t0 = 1_111_111_109;
        assert!(!verify(RFC_SECRET, "28708", at(t0)));
        assert!(!verify(RFC_SECRET, "2870820", at(t0)));
        assert!(!verify(RFC_SECRET, "28708a", at(t0)));
        assert!(!verify(RFC_SECRET, "", at(t0)));
    }

    #[test]
    fn surrounding_whitespace_tolerated() {
        let t0 = 1_111_111_109;
        let code = code_at(RFC_SECRET, at(t0)).unwrap();
        assert!(verify(RFC_SECRET, &format!(" {} ", code), at(t0)));
    }

    #[test]
    fn generated_secret_is_decodable_base32() {
        let secret = generate_secret();
        let decoded = base32::decode(BASE32, &secret).unwrap();
        assert_eq!(decoded.len(), 20);
    }

    #[test]
    fn provisioning_uri_carries_secret_and_issuer() {
        let uri = provisioning_uri("SECRETBASE32", "Example App", "user@example.com");
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("secret=SECRETBASE32"));
        assert!(uri.contains("issuer=Example%20App"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }
}
