//! Session middleware - resolves the bearer cookie into an explicit
//! request-scoped context.
//!
//! Every core operation receives the context as an argument; nothing reads
//! identity from ambient state. While impersonating, `user` is the target
//! (the acting user) and the impersonator is carried separately, so
//! account-scoped authorization can only ever see the target's
//! memberships.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::models::{Account, Session, User};
use crate::AppState;

/// Everything the request's identity resolves to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session: Session,
    /// The acting user. During impersonation this is the target, never the
    /// impersonator.
    pub user: User,
    /// The session's current acting account, if one has been chosen.
    pub account: Option<Account>,
    /// Set only while masquerading.
    pub impersonator: Option<User>,
}

impl RequestContext {
    pub fn is_impersonation(&self) -> bool {
        self.impersonator.is_some()
    }
}

/// Middleware to require an authenticated session.
///
/// A missing or invalid cookie is treated as anonymous and redirected to
/// sign-in.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = jar
        .get(&state.config.security.session_cookie_name)
        .map(|c| c.value().to_string());

    let token = match token {
        Some(token) => token,
        None => return Err(Redirect::to("/session/new").into_response()),
    };

    let session = match state.sessions.resolve(&token).await {
        Ok(Some(session)) if session.is_valid() => session,
        Ok(_) => return Err(Redirect::to("/session/new").into_response()),
        Err(e) => return Err(app_core::error::AppError::from(e).into_response()),
    };

    let context = match load_context(&state, session).await {
        Ok(context) => context,
        Err(e) => return Err(e.into_response()),
    };

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

async fn load_context(
    state: &AppState,
    session: Session,
) -> Result<RequestContext, app_core::error::AppError> {
    let user = state
        .db
        .find_user_by_id(session.user_id)
        .await
        .map_err(app_core::error::AppError::from)?
        .ok_or_else(|| {
            app_core::error::AppError::AuthError(anyhow::anyhow!("Session user no longer exists"))
        })?;

    let account = match session.account_id {
        Some(account_id) => state
            .db
            .find_account_by_id(account_id)
            .await
            .map_err(app_core::error::AppError::from)?,
        None => None,
    };

    let impersonator = match session.impersonator_user_id {
        Some(impersonator_id) => state
            .db
            .find_user_by_id(impersonator_id)
            .await
            .map_err(app_core::error::AppError::from)?,
        None => None,
    };

    Ok(RequestContext {
        session,
        user,
        account,
        impersonator,
    })
}

/// Extractor for the request context in handlers.
pub struct CurrentContext(pub RequestContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentContext
where
    S: Send + Sync,
{
    type Rejection = app_core::error::AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts.extensions.get::<RequestContext>().ok_or_else(|| {
            app_core::error::AppError::InternalError(anyhow::anyhow!(
                "Request context missing from request extensions"
            ))
        })?;

        Ok(CurrentContext(context.clone()))
    }
}
