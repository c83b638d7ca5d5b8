//! Service-level error taxonomy.
//!
//! Every expected outcome of a core operation is a modeled variant here;
//! only genuinely unexpected failures (store unavailable) surface as the
//! generic database/internal variants.

use app_core::error::AppError;
use thiserror::Error;

use super::authz::DenyReason;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Hard denial: the resource is hidden from the caller. Surfaced as
    /// not-found, never as forbidden, so existence is not confirmed.
    #[error("Resource not found")]
    NotFound,

    /// Soft denial: the caller knows the resource exists but lacks the
    /// specific right. Carries a user-readable reason.
    #[error("{}", .0.user_message())]
    Denied(DenyReason),

    /// Operation requested against the wrong current state (account shape,
    /// membership count, 2FA state machine position).
    #[error("{0}")]
    InvalidState(String),

    /// Wrong TOTP or recovery code. Deliberately uniform regardless of
    /// which sub-path was attempted.
    #[error("Invalid code, try again")]
    InvalidCredential,

    /// Wrong email or password. Uniform regardless of which was wrong.
    #[error("Invalid email or password")]
    InvalidSignIn,

    /// Concurrent mutation race; retried internally before surfacing.
    #[error("Concurrent update conflict")]
    Conflict,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound => AppError::NotFound(anyhow::anyhow!("Resource not found")),
            ServiceError::Denied(reason) => {
                AppError::Forbidden(anyhow::anyhow!(reason.user_message().to_string()))
            }
            ServiceError::InvalidState(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::InvalidCredential => {
                AppError::AuthError(anyhow::anyhow!("Invalid code, try again"))
            }
            ServiceError::InvalidSignIn => {
                AppError::AuthError(anyhow::anyhow!("Invalid email or password"))
            }
            ServiceError::Conflict => {
                AppError::Conflict(anyhow::anyhow!("Concurrent update conflict"))
            }
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
