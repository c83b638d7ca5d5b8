//! Recovery code generation and matching.

use rand::Rng;
use subtle::ConstantTimeEq;

use crate::models::{RECOVERY_CODE_BATCH, RECOVERY_CODE_LENGTH};

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a full batch of fresh recovery codes.
pub fn generate_batch() -> Vec<String> {
    (0..RECOVERY_CODE_BATCH).map(|_| generate_code()).collect()
}

/// Generate one fixed-length alphanumeric code.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..RECOVERY_CODE_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Normalize user input for comparison: codes are case-insensitive.
pub fn normalize(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Constant-time comparison of a normalized candidate against a stored
/// code.
pub fn matches(candidate: &str, stored: &str) -> bool {
    if candidate.len() != stored.len() {
        return false;
    }
    candidate.as_bytes().ct_eq(stored.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_has_ten_distinct_codes() {
        let batch = generate_batch();
        assert_eq!(batch.len(), RECOVERY_CODE_BATCH);

        let unique: std::collections::HashSet<&String> = batch.iter().collect();
        assert_eq!(unique.len(), batch.len());
    }

    #[test]
    fn codes_are_fixed_length_uppercase_alphanumeric() {
        for code in generate_batch() {
            assert_eq!(code.len(), RECOVERY_CODE_LENGTH);
            assert!(code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn comparison_is_case_insensitive_via_normalize() {
        let stored = "A1B2C3D4E5F6";
        assert!(matches(&normalize("a1b2c3d4e5f6"), stored));
        assert!(matches(&normalize("  A1B2C3D4E5F6  "), stored));
        assert!(!matches(&normalize("a1b2c3d4e5f7"), stored));
    }

    #[test]
    fn length_mismatch_never_matches() {
        assert!(!matches("A1B2C3", "A1B2C3D4E5F6"));
        assert!(!matches("", "A1B2C3D4E5F6"));
    }
}
