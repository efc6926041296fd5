//! Account handlers: credential flow, reauthentication and lifecycle

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;
use vimg_core::Credentials;
use vimg_refresh::{AccountConfig, EntryState, EntrySummary};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct AccountsResponse {
    pub items: Vec<EntrySummary>,
}

#[derive(Serialize)]
pub struct ReauthResponse {
    /// Always `reauth_successful`
    pub result: &'static str,
    pub state: EntryState,
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub state: EntryState,
}

fn parse_entry_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Account entry not found: {}", raw)))
}

/// GET /accounts
pub async fn list_accounts(State(state): State<AppState>) -> Json<AccountsResponse> {
    Json(AccountsResponse {
        items: state
            .registry()
            .entries()
            .iter()
            .map(|entry| entry.summary())
            .collect(),
    })
}

/// GET /accounts/{entry_id}
pub async fn get_account(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Result<Json<EntrySummary>, ApiError> {
    let entry = state.registry().entry(parse_entry_id(&entry_id)?)?;
    Ok(Json(entry.summary()))
}

/// POST /accounts
/// Validate the credentials and add the account
pub async fn add_account(
    State(state): State<AppState>,
    Json(account): Json<AccountConfig>,
) -> Result<(StatusCode, Json<EntrySummary>), ApiError> {
    let connector = state.connector_for(&account.session);
    let entry = state
        .registry()
        .add_account(account.credentials, connector)
        .await?;
    Ok((StatusCode::CREATED, Json(entry.summary())))
}

/// DELETE /accounts/{entry_id}
pub async fn remove_account(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.registry().remove(parse_entry_id(&entry_id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /accounts/{entry_id}/reauth
/// Replace the credentials of an existing account and reload it
pub async fn reauthenticate(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<ReauthResponse>, ApiError> {
    let entry_id = parse_entry_id(&entry_id)?;
    let entry_state = state
        .registry()
        .reauthenticate(entry_id, credentials)
        .await?;
    Ok(Json(ReauthResponse {
        result: "reauth_successful",
        state: entry_state,
    }))
}

/// POST /accounts/{entry_id}/reload
pub async fn reload_account(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let entry_state = state.registry().reload(parse_entry_id(&entry_id)?).await?;
    Ok(Json(ReloadResponse { state: entry_state }))
}
