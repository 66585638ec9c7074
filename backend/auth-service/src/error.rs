use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the auth service.
///
/// The variants are deliberately finer-grained than anything a client ever
/// sees: every unauthorized-class failure collapses to the same generic 401
/// body so that responses never reveal whether an account exists or which
/// way a token failed. The distinctions exist for logs and for tests.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    BadCredentials,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Token is malformed")]
    TokenMalformed,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token signature is invalid")]
    TokenInvalidSignature,

    #[error("Token version is stale")]
    TokenStaleVersion,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Refresh token expired")]
    RefreshExpired,

    #[error("Refresh token invalid")]
    RefreshInvalid,

    #[error("External identity is already linked to another account")]
    ExternalLinkConflict,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Email already exists")]
    EmailTaken,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Unknown identity provider: {0}")]
    InvalidProvider(String),

    #[error("Invalid or expired OAuth state")]
    OAuthStateInvalid,

    #[error("OAuth provider error: {0}")]
    OAuthExchange(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // Username enumeration guard: a missing account and a wrong
            // password are indistinguishable from outside.
            AuthError::BadCredentials | AuthError::AccountNotFound => {
                tracing::debug!(error = %self, "login rejected");
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }

            // Token failure modes are logged but never echoed.
            AuthError::TokenMalformed
            | AuthError::TokenExpired
            | AuthError::TokenInvalidSignature
            | AuthError::TokenStaleVersion
            | AuthError::TokenRevoked
            | AuthError::RefreshExpired
            | AuthError::RefreshInvalid => {
                tracing::debug!(error = %self, "token rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                )
            }

            AuthError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),

            AuthError::ExternalLinkConflict => {
                tracing::error!("external identity claimed by more than one account");
                (
                    StatusCode::CONFLICT,
                    "External identity conflict".to_string(),
                )
            }

            AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::EmailTaken => (
                StatusCode::CONFLICT,
                "Email already registered".to_string(),
            ),
            AuthError::UsernameTaken => (
                StatusCode::CONFLICT,
                "Username already registered".to_string(),
            ),
            AuthError::InvalidProvider(_) => (
                StatusCode::BAD_REQUEST,
                "Unknown identity provider".to_string(),
            ),
            AuthError::OAuthStateInvalid => (
                StatusCode::BAD_REQUEST,
                "Invalid or expired OAuth state".to_string(),
            ),
            AuthError::OAuthExchange(msg) => {
                tracing::error!(error = %msg, "OAuth provider exchange failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Identity provider error".to_string(),
                )
            }
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            // Internal detail stays in the logs.
            AuthError::Database(msg) | AuthError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}
