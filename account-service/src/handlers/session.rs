//! Registration and session handlers.

use axum::{
    extract::{Form, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use app_core::error::AppError;

use crate::middleware::CurrentContext;
use crate::models::{RegisterRequest, SignInRequest};
use crate::services::SignInOutcome;
use crate::AppState;

use super::{flash_or_error, redirect_with_notice};

/// Register a new user.
///
/// POST /users
pub async fn register(
    State(state): State<AppState>,
    Form(req): Form<RegisterRequest>,
) -> Result<Response, AppError> {
    match state.sessions.register(req).await {
        Ok(_user) => Ok(redirect_with_notice(
            "/session/new",
            "Welcome! Sign in to get started",
        )
        .into_response()),
        Err(e) => flash_or_error(e, "/users/new"),
    }
}

/// Sign in with email and password.
///
/// POST /session
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(req): Form<SignInRequest>,
) -> Result<Response, AppError> {
    match state.sessions.sign_in(req).await {
        Ok(SignInOutcome::SessionIssued { token, .. }) => {
            let jar = jar.add(auth_cookie(
                &state.config.security.session_cookie_name,
                token,
                state.config.security.cookie_secure,
            ));
            Ok((jar, redirect_with_notice("/", "Signed in")).into_response())
        }
        Ok(SignInOutcome::ChallengeIssued { token }) => {
            let jar = jar.add(auth_cookie(
                &state.config.security.challenge_cookie_name,
                token,
                state.config.security.cookie_secure,
            ));
            Ok((jar, axum::response::Redirect::to("/two-factor/challenge")).into_response())
        }
        Err(e) => flash_or_error(e, "/session/new"),
    }
}

/// Sign out and destroy the session.
///
/// POST /session/delete
pub async fn sign_out(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    jar: CookieJar,
) -> Result<Response, AppError> {
    state.sessions.sign_out(&ctx.session).await?;

    let jar = jar.remove(removal_cookie(&state.config.security.session_cookie_name));
    Ok((jar, redirect_with_notice("/session/new", "Signed out")).into_response())
}

/// Build the session/challenge bearer cookie.
pub(crate) fn auth_cookie(name: &str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Build a removal cookie matching `auth_cookie`'s path.
pub(crate) fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/")
        .build()
}
