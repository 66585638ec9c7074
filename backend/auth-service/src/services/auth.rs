//! Login, registration, logout, and refresh orchestration
//!
//! Ties the credential store, token service, and revocation store together
//! into the account-facing operations. Handlers stay thin; everything that
//! has to happen in order happens here.

use std::sync::Arc;
use validator::Validate;

use crate::db::CredentialStore;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::{
    AuthenticatedIdentity, ChangePasswordRequest, LoginRequest, RegisterRequest, Role,
};
use crate::revocation::RevocationStore;
use crate::security::password;
use crate::services::tokens::{TokenPair, TokenService};

pub struct AuthOrchestrator {
    store: Arc<dyn CredentialStore>,
    tokens: Arc<TokenService>,
    revocations: Arc<RevocationStore>,
}

impl AuthOrchestrator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: Arc<TokenService>,
        revocations: Arc<RevocationStore>,
    ) -> Self {
        Self {
            store,
            tokens,
            revocations,
        }
    }

    /// Create a local account and log it in.
    pub async fn register(
        &self,
        request: &RegisterRequest,
    ) -> Result<(AuthenticatedIdentity, TokenPair)> {
        request.validate()?;

        // Strength rules are enforced inside the hasher.
        let hash = password::hash_password(&request.password)?;
        let account = self
            .store
            .create_local_account(&request.email, &request.username, &hash, Role::default())
            .await?;

        tracing::info!(account_id = %account.id, "account registered");

        let identity = AuthenticatedIdentity::from_account(account);
        let pair = self.tokens.issue_pair(&identity)?;
        Ok((identity, pair))
    }

    /// Authenticate a username-or-email plus password and issue tokens.
    ///
    /// Unknown account and wrong password surface as distinct variants for
    /// logging but collapse to the same HTTP response, so callers cannot
    /// probe which identifiers exist.
    pub async fn login(
        &self,
        request: &LoginRequest,
    ) -> Result<(AuthenticatedIdentity, TokenPair)> {
        let account = match self.store.find_by_identifier(&request.identifier).await? {
            Some(account) => account,
            None => {
                metrics::LOGIN_FAILURE_TOTAL.inc();
                return Err(AuthError::AccountNotFound);
            }
        };

        // Federated-only accounts have no password to check.
        let hash = match account.password_hash.as_deref() {
            Some(hash) => hash,
            None => {
                metrics::LOGIN_FAILURE_TOTAL.inc();
                return Err(AuthError::BadCredentials);
            }
        };

        if !password::verify_password(&request.password, hash)? {
            metrics::LOGIN_FAILURE_TOTAL.inc();
            tracing::debug!(identifier = %request.identifier, "password mismatch");
            return Err(AuthError::BadCredentials);
        }

        metrics::LOGIN_SUCCESS_TOTAL.inc();
        tracing::info!(account_id = %account.id, "login succeeded");

        let identity = AuthenticatedIdentity::from_account(account);
        let pair = self.tokens.issue_pair(&identity)?;
        Ok((identity, pair))
    }

    /// Revoke an access token for the remainder of its lifetime.
    ///
    /// Always succeeds from the caller's perspective: an expired or garbage
    /// token needs no revocation, and reporting the difference would leak
    /// token validity to whoever presents it.
    pub async fn logout(&self, access_token: &str) -> Result<()> {
        match self.tokens.codec().verify(access_token) {
            Ok(claims) => {
                self.revocations.revoke(access_token, claims.exp);
                tracing::info!(subject = %claims.sub, "access token revoked");
            }
            Err(e) => {
                tracing::debug!(error = %e, "logout presented a non-verifiable token");
            }
        }
        Ok(())
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        self.tokens.refresh_access_token(refresh_token).await
    }

    /// Change a password, invalidating every outstanding access token.
    ///
    /// The credential store bumps `token_version` in the same statement as
    /// the hash update, so tokens minted before this call fail the version
    /// check from that moment on.
    pub async fn change_password(
        &self,
        identity: &AuthenticatedIdentity,
        request: &ChangePasswordRequest,
    ) -> Result<()> {
        let account = identity.account();
        let hash = account
            .password_hash
            .as_deref()
            .ok_or(AuthError::BadCredentials)?;

        if !password::verify_password(&request.old_password, hash)? {
            return Err(AuthError::BadCredentials);
        }

        let new_hash = password::hash_password(&request.new_password)?;

        let new_version = self.store.update_password(account.id, &new_hash).await?;
        tracing::info!(
            account_id = %account.id,
            token_version = new_version,
            "password changed, outstanding tokens invalidated"
        );
        Ok(())
    }
}
