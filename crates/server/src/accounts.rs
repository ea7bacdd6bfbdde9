//! Account API endpoints

use api_types::account::{AccountNew, AccountRoles, AccountView};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{Account, NewAccount};

use crate::{ServerError, server::ServerState};

fn view(account: Account) -> AccountView {
    AccountView {
        id: account.id,
        user_id: account.user_id,
        status: account.status.as_str().to_string(),
        email: account.email,
        firstname: account.firstname,
        lastname: account.lastname,
        roles: account.roles,
    }
}

/// Handle requests for registering a staff account
pub async fn account_new(
    Extension(creator): Extension<Account>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountView>), ServerError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ServerError::Generic(
            "email and password are required".to_string(),
        ));
    }

    let new_account = payload.roles.into_iter().fold(
        NewAccount::new(
            payload.email,
            payload.password,
            payload.firstname,
            payload.lastname,
        ),
        NewAccount::role,
    );
    let account = state.engine.create_account(new_account, Utc::now()).await?;
    tracing::info!(creator = creator.id, id = account.id, "account registered");

    Ok((StatusCode::CREATED, Json(view(account))))
}

/// Replace the roles stored on an account
pub async fn set_roles(
    Extension(editor): Extension<Account>,
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(payload): Json<AccountRoles>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state
        .engine
        .set_roles(id, payload.roles, Utc::now())
        .await?;
    tracing::info!(editor = editor.id, id = account.id, "account roles replaced");

    Ok(Json(view(account)))
}

/// The authenticated account
pub async fn me(Extension(account): Extension<Account>) -> Json<AccountView> {
    Json(view(account))
}
