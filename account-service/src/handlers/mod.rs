//! HTTP handlers.
//!
//! Browser-facing flows are POST + 302: success and denial messages travel
//! as urlencoded `notice`/`alert` query parameters on the redirect target.
//! Payload-bearing two-factor reads return JSON.

pub mod accounts;
pub mod impersonation;
pub mod session;
pub mod two_factor;

use app_core::error::AppError;
use axum::response::{IntoResponse, Redirect, Response};

use crate::services::ServiceError;

/// Redirect carrying a success message.
pub(crate) fn redirect_with_notice(path: &str, notice: &str) -> Redirect {
    Redirect::to(&format!("{}?notice={}", path, urlencoding::encode(notice)))
}

/// Redirect carrying a denial or validation message.
pub(crate) fn redirect_with_alert(path: &str, alert: &str) -> Redirect {
    Redirect::to(&format!("{}?alert={}", path, urlencoding::encode(alert)))
}

/// Translate an expected service failure into the browser surface.
///
/// Soft denials, invalid state and invalid credentials become a redirect
/// back to a page the user can see, with the specific message. Hard
/// denials stay a plain 404 (existence is not confirmed), and unexpected
/// failures propagate as the generic error response.
pub(crate) fn flash_or_error(err: ServiceError, back: &str) -> Result<Response, AppError> {
    match err {
        ServiceError::Denied(_)
        | ServiceError::InvalidState(_)
        | ServiceError::InvalidCredential
        | ServiceError::InvalidSignIn => {
            Ok(redirect_with_alert(back, &err.to_string()).into_response())
        }
        other => Err(other.into()),
    }
}
