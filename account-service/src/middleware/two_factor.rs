//! Mandatory two-factor enforcement.
//!
//! When the deployment requires 2FA, a signed-in user who has not enabled
//! it may only reach the setup routes and sign-out; everything else is
//! redirected to enrollment. Evaluated once per request, independent of
//! the state machine itself.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::AppState;

use super::RequestContext;

pub async fn require_two_factor_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !state.config.two_factor.mandatory {
        return next.run(req).await;
    }

    let Some(context) = req.extensions().get::<RequestContext>() else {
        // Runs inside the session-guarded router; an absent context means
        // the route is public and not ours to police.
        return next.run(req).await;
    };

    if context.user.two_factor_enabled() {
        return next.run(req).await;
    }

    if setup_path_allowed(req.uri().path()) {
        return next.run(req).await;
    }

    Redirect::to("/two-factor/enrollment").into_response()
}

fn setup_path_allowed(path: &str) -> bool {
    path.starts_with("/two-factor") || path == "/session/delete"
}

#[cfg(test)]
mod tests {
    use super::setup_path_allowed;

    #[test]
    fn setup_and_sign_out_paths_stay_reachable() {
        assert!(setup_path_allowed("/two-factor/enrollment"));
        assert!(setup_path_allowed("/two-factor/recovery-codes"));
        assert!(setup_path_allowed("/session/delete"));
    }

    #[test]
    fn everything_else_is_redirected() {
        assert!(!setup_path_allowed("/"));
        assert!(!setup_path_allowed("/accounts"));
        assert!(!setup_path_allowed("/impersonation"));
        assert!(!setup_path_allowed("/session"));
    }
}
