//! Two-factor enrollment, challenge and recovery-code handlers.

use axum::{
    extract::{Form, State},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use app_core::error::AppError;

use crate::middleware::CurrentContext;
use crate::services::{EnrollmentStart, ServiceError};
use crate::AppState;

use super::session::{auth_cookie, removal_cookie};
use super::{flash_or_error, redirect_with_notice};

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct RecoveryCodesResponse {
    pub codes: Vec<String>,
}

/// Start (or restart) enrollment; returns the secret and the otpauth
/// provisioning payload for an authenticator app.
///
/// GET /two-factor/enrollment
pub async fn enrollment_start(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> Result<Json<EnrollmentStart>, AppError> {
    let start = state.two_factor.begin_enrollment(&ctx.user).await?;
    Ok(Json(start))
}

/// Confirm enrollment with a code from the authenticator app.
///
/// POST /two-factor/enrollment
pub async fn enrollment_confirm(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Form(req): Form<CodeRequest>,
) -> Result<Response, AppError> {
    match state.two_factor.confirm_enrollment(&ctx.user, &req.code).await {
        Ok(_codes) => Ok(redirect_with_notice(
            "/two-factor/recovery-codes",
            "Two-factor authentication enabled. Save your recovery codes now",
        )
        .into_response()),
        Err(e) => flash_or_error(e, "/two-factor/enrollment"),
    }
}

/// Show the unused recovery codes (the enrollment redirect target).
///
/// GET /two-factor/recovery-codes
pub async fn recovery_codes(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> Result<Json<RecoveryCodesResponse>, AppError> {
    let codes = state
        .two_factor
        .unused_recovery_codes(&ctx.user, &ctx.session)
        .await?;
    Ok(Json(RecoveryCodesResponse { codes }))
}

/// Replace every recovery code with a fresh batch; the new set is shown
/// only in this response.
///
/// POST /two-factor/recovery-codes
pub async fn regenerate_recovery_codes(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> Result<Json<RecoveryCodesResponse>, AppError> {
    let codes = state
        .two_factor
        .regenerate_recovery_codes(&ctx.user, &ctx.session)
        .await?;
    Ok(Json(RecoveryCodesResponse { codes }))
}

/// Disable two-factor authentication.
///
/// POST /two-factor/disable
pub async fn disable(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> Result<Response, AppError> {
    match state.two_factor.disable(&ctx.user, &ctx.session).await {
        Ok(()) => {
            Ok(redirect_with_notice("/", "Two-factor authentication disabled").into_response())
        }
        Err(e) => flash_or_error(e, "/"),
    }
}

/// Satisfy the sign-in challenge with a TOTP code.
///
/// POST /two-factor/challenge/totp
pub async fn challenge_totp(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(req): Form<CodeRequest>,
) -> Result<Response, AppError> {
    let token = match challenge_token(&state, &jar) {
        Some(token) => token,
        None => return restart_sign_in(),
    };

    match state.two_factor.verify_totp_challenge(&token, &req.code).await {
        Ok(user) => grant_session(&state, jar, user.user_id).await,
        Err(e) => challenge_failure(e),
    }
}

/// Satisfy the sign-in challenge with a recovery code, consuming it.
///
/// POST /two-factor/challenge/recovery-code
pub async fn challenge_recovery_code(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(req): Form<CodeRequest>,
) -> Result<Response, AppError> {
    let token = match challenge_token(&state, &jar) {
        Some(token) => token,
        None => return restart_sign_in(),
    };

    match state
        .two_factor
        .verify_recovery_challenge(&token, &req.code)
        .await
    {
        Ok(user) => grant_session(&state, jar, user.user_id).await,
        Err(e) => challenge_failure(e),
    }
}

fn challenge_token(state: &AppState, jar: &CookieJar) -> Option<String> {
    jar.get(&state.config.security.challenge_cookie_name)
        .map(|c| c.value().to_string())
}

/// Promote a satisfied challenge into a full session.
async fn grant_session(
    state: &AppState,
    jar: CookieJar,
    user_id: uuid::Uuid,
) -> Result<Response, AppError> {
    let (_session, token) = state.sessions.open_session(user_id).await?;

    let jar = jar
        .remove(removal_cookie(&state.config.security.challenge_cookie_name))
        .add(auth_cookie(
            &state.config.security.session_cookie_name,
            token,
            state.config.security.cookie_secure,
        ));

    Ok((jar, redirect_with_notice("/", "Signed in")).into_response())
}

/// Challenge misses stay on the challenge page with one uniform message;
/// an expired or unknown challenge sends the user back to sign-in.
fn challenge_failure(err: ServiceError) -> Result<Response, AppError> {
    match err {
        ServiceError::InvalidCredential => flash_or_error(err, "/two-factor/challenge"),
        ServiceError::InvalidState(_) => flash_or_error(err, "/session/new"),
        other => Err(other.into()),
    }
}

fn restart_sign_in() -> Result<Response, AppError> {
    Ok(
        super::redirect_with_alert("/session/new", "Challenge expired or unknown; sign in again")
            .into_response(),
    )
}
