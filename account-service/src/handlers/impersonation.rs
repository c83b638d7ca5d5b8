//! Impersonation handlers.

use axum::{
    extract::{Form, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use app_core::error::AppError;

use crate::middleware::CurrentContext;
use crate::AppState;

use super::session::auth_cookie;
use super::{flash_or_error, redirect_with_notice};

#[derive(Debug, Deserialize)]
pub struct StartImpersonationRequest {
    pub user_id: Uuid,
}

/// Start impersonating a user. Requires the cross-account impersonation
/// privilege; without it the target is reported as not found.
///
/// POST /impersonation
pub async fn start_impersonation(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    jar: CookieJar,
    Form(req): Form<StartImpersonationRequest>,
) -> Result<Response, AppError> {
    match state
        .impersonation
        .start(&ctx.user, &ctx.session, req.user_id)
        .await
    {
        Ok((_session, token)) => {
            let jar = jar.add(auth_cookie(
                &state.config.security.session_cookie_name,
                token,
                state.config.security.cookie_secure,
            ));
            Ok((jar, redirect_with_notice("/", "Impersonation started")).into_response())
        }
        Err(e) => flash_or_error(e, "/"),
    }
}

/// Stop impersonating and restore the original session.
///
/// POST /impersonation/stop
pub async fn stop_impersonation(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    jar: CookieJar,
) -> Result<Response, AppError> {
    match state.impersonation.stop(&ctx.session).await {
        Ok((_session, token)) => {
            let jar = jar.add(auth_cookie(
                &state.config.security.session_cookie_name,
                token,
                state.config.security.cookie_secure,
            ));
            Ok((jar, redirect_with_notice("/", "Impersonation stopped")).into_response())
        }
        Err(e) => flash_or_error(e, "/"),
    }
}
