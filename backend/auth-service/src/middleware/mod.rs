//! Request authentication layer
//!
//! Runs on every request. Public paths pass straight through; for everything
//! else the bearer token is verified, checked against the revocation store
//! and the account's current token version, and resolved to an account. The
//! result is attached to the request as an `AuthContext`.
//!
//! The layer itself never rejects: a request with a missing or bad token
//! simply proceeds unauthenticated, and handlers that extract `AuthContext`
//! are the ones that turn its absence into a 401. Public handlers on the
//! same router stay reachable without special-casing.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::AuthError;
use crate::models::AuthenticatedIdentity;
use crate::AppState;

/// Authenticated request identity, attached by the middleware.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub roles: Vec<String>,
    pub identity: AuthenticatedIdentity,
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::AuthenticationRequired)
    }
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_public(path, &state.public_prefixes) {
        return next.run(request).await;
    }

    if let Some(token) = bearer_token(&request) {
        match resolve_identity(&state, &token).await {
            Ok(context) => {
                request.extensions_mut().insert(context);
            }
            Err(e) => {
                // Attach nothing; the handler's extractor produces the 401.
                tracing::debug!(path, error = %e, "request token rejected");
            }
        }
    }

    next.run(request).await
}

async fn resolve_identity(state: &AppState, token: &str) -> crate::error::Result<AuthContext> {
    if state.revocations.is_revoked(token) {
        return Err(AuthError::TokenRevoked);
    }

    let claims = state.tokens.validate_and_extract(token).await?;

    let account = state
        .store
        .find_by_identifier(&claims.sub)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    Ok(AuthContext {
        subject: claims.sub,
        roles: claims.roles.unwrap_or_default(),
        identity: AuthenticatedIdentity::from_account(account),
    })
}

/// Whether a path skips authentication entirely.
pub fn is_public(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}

fn bearer_token(request: &Request) -> Option<String> {
    let header = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<String> {
        vec![
            "/api/v1/auth/login".to_string(),
            "/health".to_string(),
            "/metrics".to_string(),
        ]
    }

    #[test]
    fn test_public_prefix_match() {
        assert!(is_public("/api/v1/auth/login", &prefixes()));
        assert!(is_public("/health", &prefixes()));
        assert!(!is_public("/api/v1/auth/change-password", &prefixes()));
        assert!(!is_public("/api/v1/orders", &prefixes()));
    }

    fn request_with_auth(value: Option<&str>) -> Request {
        let builder = axum::http::Request::builder();
        let builder = match value {
            Some(v) => builder.header(header::AUTHORIZATION, v),
            None => builder,
        };
        builder.body(axum::body::Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_extraction() {
        let request = request_with_auth(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&request), Some("abc.def.ghi".to_string()));

        let no_scheme = request_with_auth(Some("abc.def.ghi"));
        assert_eq!(bearer_token(&no_scheme), None);

        let empty = request_with_auth(Some("Bearer "));
        assert_eq!(bearer_token(&empty), None);

        let bare = request_with_auth(None);
        assert_eq!(bearer_token(&bare), None);
    }
}
