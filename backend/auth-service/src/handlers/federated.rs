//! Federated-login endpoints: flow start and provider callback.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AuthError, Result};
use crate::models::{OAuthCallbackParams, OAuthProvider, StartOAuthFlowRequest};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct OAuthStartResponse {
    pub authorization_url: String,
    pub state: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OAuthLoginResponse {
    pub account_id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub is_new_account: bool,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/oauth/start",
    request_body = StartOAuthFlowRequest,
    responses(
        (status = 200, description = "Authorization URL for the provider", body = OAuthStartResponse),
        (status = 400, description = "Unknown identity provider"),
    ),
    tag = "oauth"
)]
pub async fn start_flow(
    State(state): State<AppState>,
    Json(request): Json<StartOAuthFlowRequest>,
) -> Result<Json<OAuthStartResponse>> {
    let provider = OAuthProvider::parse(&request.provider)
        .ok_or_else(|| AuthError::InvalidProvider(request.provider.clone()))?;

    let (authorization_url, csrf_state) = state.federation.start_flow(provider)?;
    Ok(Json(OAuthStartResponse {
        authorization_url,
        state: csrf_state,
    }))
}

/// Provider redirect target. Consumes the CSRF state, exchanges the code for
/// a profile, reconciles it onto a local account, and logs that account in.
#[utoipa::path(
    get,
    path = "/api/v1/oauth/callback",
    params(
        ("state" = String, Query, description = "CSRF state issued at flow start"),
        ("code" = String, Query, description = "Provider authorization code"),
    ),
    responses(
        (status = 200, description = "Federated login completed", body = OAuthLoginResponse),
        (status = 400, description = "Invalid or expired OAuth state"),
        (status = 502, description = "Provider exchange failed"),
    ),
    tag = "oauth"
)]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallbackParams>,
) -> Result<Json<OAuthLoginResponse>> {
    let (identity, is_new_account) = state
        .federation
        .complete_flow(&params.state, &params.code)
        .await?;

    let pair = state.tokens.issue_pair(&identity)?;
    let account = identity.account();

    Ok(Json(OAuthLoginResponse {
        account_id: account.id,
        username: account.username.clone(),
        email: account.email.clone(),
        is_new_account,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: pair.token_type,
        expires_in: pair.expires_in,
    }))
}
