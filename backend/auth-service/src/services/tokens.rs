//! Token issuance, refresh, and validation
//!
//! Turns an authenticated identity into a token pair and a refresh token
//! back into a fresh access token. The codec answers "authentic and
//! unexpired"; this service layers the business checks on top, chiefly the
//! token-version comparison against the credential store.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use token_codec::{Claims, TokenCodec, TokenError};
use utoipa::ToSchema;

use crate::db::CredentialStore;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::AuthenticatedIdentity;

/// Token pair response structure
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub struct TokenService {
    codec: TokenCodec,
    store: Arc<dyn CredentialStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        codec: TokenCodec,
        store: Arc<dyn CredentialStore>,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            codec,
            store,
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    /// The underlying codec, for callers that need raw signature checks
    /// (logout inspects a token's expiry without business validation).
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Lifetime advertised alongside every issued access token.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Issue a short-lived access token carrying the identity's role
    /// authorities and token-version snapshot.
    pub fn issue_access_token(&self, identity: &AuthenticatedIdentity) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.username().to_string(),
            roles: Some(identity.role_names()),
            tv: Some(identity.token_version()),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        self.codec
            .sign(&claims)
            .map_err(|e| AuthError::Internal(format!("Failed to sign access token: {}", e)))
    }

    /// Issue a long-lived refresh token.
    ///
    /// Carries only subject, iat, and exp: roles and token version are
    /// re-derived from the credential store at refresh time, so these claims
    /// can never go stale in a way that matters.
    pub fn issue_refresh_token(&self, identity: &AuthenticatedIdentity) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.username().to_string(),
            roles: None,
            tv: None,
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        self.codec
            .sign(&claims)
            .map_err(|e| AuthError::Internal(format!("Failed to sign refresh token: {}", e)))
    }

    /// Issue both tokens for one authentication event.
    pub fn issue_pair(&self, identity: &AuthenticatedIdentity) -> Result<TokenPair> {
        let access_token = self.issue_access_token(identity)?;
        let refresh_token = self.issue_refresh_token(identity)?;
        metrics::TOKEN_PAIRS_ISSUED_TOTAL.inc();

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Exchange a valid refresh token for a fresh access token.
    ///
    /// The account is re-resolved by subject so the new access token always
    /// reflects the account's current roles and token version, never the
    /// state at original login.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String> {
        let claims = self.codec.verify(refresh_token).map_err(|e| match e {
            TokenError::Expired => AuthError::RefreshExpired,
            _ => AuthError::RefreshInvalid,
        })?;

        // An access token presented at the refresh endpoint is not a refresh
        // token, however valid its signature.
        if claims.is_access() {
            return Err(AuthError::RefreshInvalid);
        }

        let account = self
            .store
            .find_by_identifier(&claims.sub)
            .await?
            .ok_or(AuthError::RefreshInvalid)?;

        let identity = AuthenticatedIdentity::from_account(account);
        let access_token = self.issue_access_token(&identity)?;
        metrics::TOKENS_REFRESHED_TOTAL.inc();

        tracing::info!(subject = %claims.sub, "access token refreshed");
        Ok(access_token)
    }

    /// Verify an access token and return its claims.
    ///
    /// Signature and expiry come from the codec; on top of that, the token's
    /// embedded version snapshot must match the account's current
    /// `token_version` (one indexed lookup). A mismatch means the token
    /// predates the last credential-affecting change.
    pub async fn validate_and_extract(&self, access_token: &str) -> Result<Claims> {
        let claims = self.codec.verify(access_token).map_err(|e| match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::InvalidSignature => AuthError::TokenInvalidSignature,
            _ => AuthError::TokenMalformed,
        })?;

        let snapshot = claims.tv.ok_or(AuthError::TokenMalformed)?;

        let current = self
            .store
            .current_token_version(&claims.sub)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        if snapshot != current {
            return Err(AuthError::TokenStaleVersion);
        }

        Ok(claims)
    }
}
