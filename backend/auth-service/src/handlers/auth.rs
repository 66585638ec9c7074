//! Local-credential endpoints: register, login, refresh, logout,
//! change-password, and the authenticated `me` probe.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::error::Result;
use crate::middleware::AuthContext;
use crate::models::{
    AuthenticatedIdentity, ChangePasswordRequest, LoginRequest, RefreshTokenRequest,
    RegisterRequest,
};
use crate::services::TokenPair;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub account_id: uuid::Uuid,
    pub username: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl LoginResponse {
    pub fn from_parts(identity: &AuthenticatedIdentity, pair: TokenPair) -> Self {
        let account = identity.account();
        Self {
            account_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: pair.token_type,
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = LoginResponse),
        (status = 400, description = "Validation or password-strength failure"),
        (status = 409, description = "Email or username already registered"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let (identity, pair) = state.auth.register(&request).await?;
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse::from_parts(&identity, pair)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (identity, pair) = state.auth.login(&request).await?;
    Ok(Json(LoginResponse::from_parts(&identity, pair)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Refresh token invalid or expired"),
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<RefreshResponse>> {
    let access_token = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_ttl_secs(),
    }))
}

/// Revokes the presented access token. Returns 200 regardless of whether a
/// usable token was attached: logout is idempotent and never leaks token
/// validity.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    if let Some(token) = bearer_from_headers(&headers) {
        state.auth.logout(&token).await?;
    }
    Ok(Json(json!({ "message": "Logged out" })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; outstanding tokens invalidated"),
        (status = 400, description = "New password too weak"),
        (status = 401, description = "Not authenticated or old password wrong"),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    context: AuthContext,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse> {
    state
        .auth
        .change_password(&context.identity, &request)
        .await?;
    Ok(Json(json!({ "message": "Password changed" })))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "The authenticated account"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(context: AuthContext) -> Result<impl IntoResponse> {
    Ok(Json(context.identity.account().clone()))
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
