pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use app_core::error::AppError;
use app_core::middleware::{
    rate_limit::ip_rate_limit_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};

use crate::config::AccountConfig;
use crate::services::{
    AccountService, AuditService, Database, ImpersonationService, SessionService, TwoFactorService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AccountConfig,
    pub db: Database,
    pub sessions: SessionService,
    pub accounts: AccountService,
    pub impersonation: ImpersonationService,
    pub two_factor: TwoFactorService,
    pub audit: AuditService,
    pub login_rate_limiter: app_core::middleware::rate_limit::IpRateLimiter,
    pub challenge_rate_limiter: app_core::middleware::rate_limit::IpRateLimiter,
    pub ip_rate_limiter: app_core::middleware::rate_limit::IpRateLimiter,
}

impl AppState {
    /// Wire the full service graph from a config and a database wrapper.
    pub fn build(config: AccountConfig, db: Database) -> Self {
        let audit = AuditService::new(db.clone());
        let sessions = SessionService::new(
            db.clone(),
            audit.clone(),
            config.security.clone(),
            config.two_factor.clone(),
        );
        let accounts = AccountService::new(db.clone(), audit.clone());
        let impersonation =
            ImpersonationService::new(db.clone(), audit.clone(), config.security.clone());
        let two_factor =
            TwoFactorService::new(db.clone(), audit.clone(), config.two_factor.clone());

        let login_rate_limiter = app_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let challenge_rate_limiter = app_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.challenge_attempts,
            config.rate_limit.challenge_window_seconds,
        );
        let ip_rate_limiter = app_core::middleware::rate_limit::create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
        );

        Self {
            config,
            db,
            sessions,
            accounts,
            impersonation,
            two_factor,
            audit,
            login_rate_limiter,
            challenge_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    // Sign-in carries the brunt of credential stuffing; it gets its own
    // limiter, as do the 2FA challenge posts.
    let login_limiter = state.login_rate_limiter.clone();
    let login_route = Router::new()
        .route("/session", post(handlers::session::sign_in))
        .layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let challenge_limiter = state.challenge_rate_limiter.clone();
    let challenge_routes = Router::new()
        .route(
            "/two-factor/challenge/totp",
            post(handlers::two_factor::challenge_totp),
        )
        .route(
            "/two-factor/challenge/recovery-code",
            post(handlers::two_factor::challenge_recovery_code),
        )
        .layer(from_fn_with_state(
            challenge_limiter,
            ip_rate_limit_middleware,
        ));

    // Everything behind a session, with the mandatory-2FA guard applied
    // after the context is resolved.
    let protected_routes = Router::new()
        .route("/session/delete", post(handlers::session::sign_out))
        .route(
            "/accounts",
            get(handlers::accounts::list_accounts).post(handlers::accounts::create_account),
        )
        .route(
            "/accounts/:account_id/switch",
            post(handlers::accounts::switch_account),
        )
        .route(
            "/accounts/:account_id/rename",
            post(handlers::accounts::rename_account),
        )
        .route(
            "/accounts/:account_id/convert-to-team",
            post(handlers::accounts::convert_to_team),
        )
        .route(
            "/accounts/:account_id/convert-to-personal",
            post(handlers::accounts::convert_to_personal),
        )
        .route(
            "/accounts/:account_id/members",
            post(handlers::accounts::add_member),
        )
        .route(
            "/accounts/:account_id/members/:user_id/remove",
            post(handlers::accounts::remove_member),
        )
        .route(
            "/impersonation",
            post(handlers::impersonation::start_impersonation),
        )
        .route(
            "/impersonation/stop",
            post(handlers::impersonation::stop_impersonation),
        )
        .route(
            "/two-factor/enrollment",
            get(handlers::two_factor::enrollment_start)
                .post(handlers::two_factor::enrollment_confirm),
        )
        .route(
            "/two-factor/recovery-codes",
            get(handlers::two_factor::recovery_codes)
                .post(handlers::two_factor::regenerate_recovery_codes),
        )
        .route("/two-factor/disable", post(handlers::two_factor::disable))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::require_two_factor_middleware,
        ))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/users", post(handlers::session::register))
        .merge(login_route)
        .merge(challenge_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| {
                            o.parse::<axum::http::HeaderValue>()
                                .map_err(|e| {
                                    tracing::error!("Invalid CORS origin '{}': {}", o, e);
                                    e
                                })
                                .ok()
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_credentials(true),
        );

    Ok(app)
}

/// Service health check.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<axum::Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::from(e)
    })?;

    Ok(axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgres": "up"
        }
    })))
}
