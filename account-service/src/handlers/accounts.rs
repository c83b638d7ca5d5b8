//! Account handlers: creation, switching, renaming, shape conversion and
//! membership management.

use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use app_core::error::AppError;

use crate::middleware::CurrentContext;
use crate::models::{
    AccountResponse, AddMemberRequest, CreateAccountRequest, RenameAccountRequest,
};
use crate::AppState;

use super::{flash_or_error, redirect_with_notice};

/// List the acting user's accounts.
///
/// GET /accounts
pub async fn list_accounts(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let accounts = state.accounts.list_for_user(ctx.user.user_id).await?;
    Ok(Json(accounts.into_iter().map(AccountResponse::from).collect()))
}

/// Create a team account owned by the acting user.
///
/// POST /accounts
pub async fn create_account(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Form(req): Form<CreateAccountRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let account = state
        .accounts
        .create_team(ctx.user.user_id, req.name)
        .await?;

    Ok(redirect_with_notice(
        &format!("/accounts/{}", account.account_id),
        "Team account created",
    )
    .into_response())
}

/// Switch the session's acting account.
///
/// POST /accounts/:account_id/switch
///
/// 302 to the landing page on success; 404 when the account is outside the
/// user's membership set, whether or not it exists.
pub async fn switch_account(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(account_id): Path<Uuid>,
) -> Result<Response, AppError> {
    match state.accounts.switch(&ctx.session, account_id).await {
        Ok(account) => Ok(redirect_with_notice(
            "/",
            &format!("Now acting in {}", account.name),
        )
        .into_response()),
        Err(e) => flash_or_error(e, "/"),
    }
}

/// Rename an account. Owner only.
///
/// POST /accounts/:account_id/rename
pub async fn rename_account(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(account_id): Path<Uuid>,
    Form(req): Form<RenameAccountRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let back = format!("/accounts/{}", account_id);
    match state
        .accounts
        .rename(ctx.user.user_id, account_id, req.name)
        .await
    {
        Ok(_) => Ok(redirect_with_notice(&back, "Account renamed").into_response()),
        Err(e) => flash_or_error(e, &back),
    }
}

/// Convert a personal account into a team account.
///
/// POST /accounts/:account_id/convert-to-team
pub async fn convert_to_team(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(account_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let back = format!("/accounts/{}", account_id);
    match state.accounts.to_team(ctx.user.user_id, account_id).await {
        Ok(()) => {
            Ok(redirect_with_notice(&back, "Account converted to a team account").into_response())
        }
        Err(e) => flash_or_error(e, &back),
    }
}

/// Convert a single-member team account back into a personal account.
///
/// POST /accounts/:account_id/convert-to-personal
pub async fn convert_to_personal(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(account_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let back = format!("/accounts/{}", account_id);
    match state.accounts.to_personal(ctx.user.user_id, account_id).await {
        Ok(()) => Ok(
            redirect_with_notice(&back, "Account converted to a personal account").into_response(),
        ),
        Err(e) => flash_or_error(e, &back),
    }
}

/// Add a member by email. Requires the admin role on the account.
///
/// POST /accounts/:account_id/members
pub async fn add_member(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path(account_id): Path<Uuid>,
    Form(req): Form<AddMemberRequest>,
) -> Result<Response, AppError> {
    let back = format!("/accounts/{}", account_id);
    match state
        .accounts
        .add_member(ctx.user.user_id, account_id, &req.email, req.admin)
        .await
    {
        Ok(_) => Ok(redirect_with_notice(&back, "Member added").into_response()),
        Err(e) => flash_or_error(e, &back),
    }
}

/// Remove a member. Owner only; the owner cannot be removed.
///
/// POST /accounts/:account_id/members/:user_id/remove
pub async fn remove_member(
    State(state): State<AppState>,
    CurrentContext(ctx): CurrentContext,
    Path((account_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    let back = format!("/accounts/{}", account_id);
    match state
        .accounts
        .remove_member(ctx.user.user_id, account_id, user_id)
        .await
    {
        Ok(()) => Ok(redirect_with_notice(&back, "Member removed").into_response()),
        Err(e) => flash_or_error(e, &back),
    }
}
