//! Recovery code model - single-use backup credentials.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Number of codes issued per (re)generation.
pub const RECOVERY_CODE_BATCH: usize = 10;

/// Length of a recovery code in characters.
pub const RECOVERY_CODE_LENGTH: usize = 12;

/// Recovery code entity.
///
/// A code moves from unused to used exactly once and is never validated
/// again afterwards.
#[derive(Debug, Clone, FromRow)]
pub struct RecoveryCode {
    pub code_id: Uuid,
    pub user_id: Uuid,
    pub code: String,
    pub used_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl RecoveryCode {
    /// Create a new unused code.
    pub fn new(user_id: Uuid, code: String) -> Self {
        Self {
            code_id: Uuid::new_v4(),
            user_id,
            code,
            used_utc: None,
            created_utc: Utc::now(),
        }
    }

    /// Check if this code has been consumed.
    pub fn is_used(&self) -> bool {
        self.used_utc.is_some()
    }
}
