//! Federated login: provider flows and identity reconciliation
//!
//! Two concerns live here. The provider client speaks OAuth2 to Google and
//! Facebook (authorization URL, code exchange, profile fetch) and normalizes
//! the result into a `FederatedCallback`. The reconciler maps that callback
//! onto a local account: existing link, silent email link, or fresh account.

use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OAuthSettings;
use crate::db::CredentialStore;
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::{AuthenticatedIdentity, FederatedCallback, OAuthProvider, Role};

/// CSRF state tokens are single-use and short-lived.
const OAUTH_STATE_TTL_SECS: i64 = 600;

/// In-process store of pending OAuth states.
///
/// Same one-time-use semantics as a TTL'd key-value store: issued with an
/// expiry, consumed exactly once, expired entries dropped on contact.
#[derive(Default)]
struct OAuthStateStore {
    states: DashMap<String, (OAuthProvider, i64)>,
}

impl OAuthStateStore {
    fn issue(&self, provider: OAuthProvider) -> String {
        // Opportunistic cleanup keeps the map bounded by recent traffic.
        let now = chrono::Utc::now().timestamp();
        self.states.retain(|_, (_, exp)| *exp > now);

        let state = Uuid::new_v4().to_string();
        self.states
            .insert(state.clone(), (provider, now + OAUTH_STATE_TTL_SECS));
        state
    }

    /// Consume a state token, returning its provider if still valid.
    fn take(&self, state: &str) -> Option<OAuthProvider> {
        let (_, (provider, expires_at)) = self.states.remove(state)?;
        if expires_at <= chrono::Utc::now().timestamp() {
            return None;
        }
        Some(provider)
    }
}

/// Maps a federated callback onto a local account.
pub struct IdentityReconciler {
    store: Arc<dyn CredentialStore>,
}

impl IdentityReconciler {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Find-or-create the local account for a provider identity.
    ///
    /// Resolution order:
    /// 1. existing `(provider, provider_user_id)` link, the stable path for
    ///    repeat logins;
    /// 2. account with the same email, which gets the provider identity
    ///    silently linked to it (a trust boundary, hence the warn-level log);
    /// 3. a new federated-only account with the default role.
    ///
    /// Returns the identity plus whether an account was created.
    pub async fn reconcile(
        &self,
        callback: &FederatedCallback,
    ) -> Result<(AuthenticatedIdentity, bool)> {
        if let Some(account) = self
            .store
            .find_by_external_link(callback.provider, &callback.provider_user_id)
            .await?
        {
            return Ok((AuthenticatedIdentity::Federated { account }, false));
        }

        if !callback.email.is_empty() {
            if let Some(account) = self.store.find_by_email(&callback.email).await? {
                tracing::warn!(
                    account_id = %account.id,
                    provider = callback.provider.as_str(),
                    "linking provider identity to existing account by email match"
                );
                self.store
                    .link_external_identity(account.id, callback)
                    .await?;
                return Ok((AuthenticatedIdentity::Federated { account }, false));
            }
        }

        let username = derive_username(&callback.email);
        let account = self
            .store
            .create_federated_account(&username, callback, Role::default())
            .await?;
        self.store
            .link_external_identity(account.id, callback)
            .await?;

        tracing::info!(
            account_id = %account.id,
            provider = callback.provider.as_str(),
            "new account created via federated login"
        );

        Ok((AuthenticatedIdentity::Federated { account }, true))
    }
}

/// Derive a username for an account created from a provider callback.
fn derive_username(email: &str) -> String {
    let base = email
        .split('@')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("member")
        .replace(['.', '+'], "_");
    format!("{base}_{}", &Uuid::new_v4().simple().to_string()[..6])
}

/// OAuth2 flows composed end to end: state issuance, authorization URL,
/// code exchange, and reconciliation.
pub struct FederationService {
    config: OAuthSettings,
    http: reqwest::Client,
    states: OAuthStateStore,
    reconciler: IdentityReconciler,
}

impl FederationService {
    pub fn new(config: OAuthSettings, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            states: OAuthStateStore::default(),
            reconciler: IdentityReconciler::new(store),
        }
    }

    pub fn reconciler(&self) -> &IdentityReconciler {
        &self.reconciler
    }

    /// Begin a flow: mint a CSRF state and build the provider's
    /// authorization URL.
    pub fn start_flow(&self, provider: OAuthProvider) -> Result<(String, String)> {
        let state = self.states.issue(provider);
        let url = match provider {
            OAuthProvider::Google => self.google_auth_url(&state)?,
            OAuthProvider::Facebook => self.facebook_auth_url(&state)?,
        };
        Ok((url, state))
    }

    /// Complete a flow after the provider redirected back to us.
    ///
    /// Consumes the state token, exchanges the code, and reconciles the
    /// provider identity onto a local account.
    pub async fn complete_flow(
        &self,
        state: &str,
        code: &str,
    ) -> Result<(AuthenticatedIdentity, bool)> {
        let provider = self.states.take(state).ok_or(AuthError::OAuthStateInvalid)?;

        let callback = match provider {
            OAuthProvider::Google => self.exchange_google(code).await?,
            OAuthProvider::Facebook => self.exchange_facebook(code).await?,
        };

        let outcome = self.reconciler.reconcile(&callback).await?;
        metrics::FEDERATED_LOGINS_TOTAL.inc();
        Ok(outcome)
    }

    fn google_auth_url(&self, state: &str) -> Result<String> {
        let client_id = self.google_client_id()?;
        Ok(format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope=openid%20profile%20email&state={}",
            client_id,
            urlencoding::encode(self.redirect_uri()?),
            state
        ))
    }

    fn facebook_auth_url(&self, state: &str) -> Result<String> {
        let app_id = self.facebook_app_id()?;
        Ok(format!(
            "https://www.facebook.com/v19.0/dialog/oauth?client_id={}&redirect_uri={}&response_type=code&scope=email%20public_profile&state={}",
            app_id,
            urlencoding::encode(self.redirect_uri()?),
            state
        ))
    }

    async fn exchange_google(&self, code: &str) -> Result<FederatedCallback> {
        let client_id = self.google_client_id()?;
        let client_secret = self
            .config
            .google_client_secret
            .as_deref()
            .ok_or_else(|| AuthError::OAuthExchange("Google client secret not configured".into()))?;

        let token_response = self
            .http
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", self.redirect_uri()?),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?
            .json::<GoogleTokenResponse>()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?;

        let user_info = self
            .http
            .get("https://www.googleapis.com/oauth2/v2/userinfo")
            .bearer_auth(&token_response.access_token)
            .send()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?;

        Ok(FederatedCallback {
            provider: OAuthProvider::Google,
            provider_user_id: user_info.id,
            email: user_info.email,
            first_name: user_info.given_name,
            last_name: user_info.family_name,
            picture_url: user_info.picture,
        })
    }

    async fn exchange_facebook(&self, code: &str) -> Result<FederatedCallback> {
        let app_id = self.facebook_app_id()?;
        let app_secret = self
            .config
            .facebook_app_secret
            .as_deref()
            .ok_or_else(|| AuthError::OAuthExchange("Facebook app secret not configured".into()))?;

        let token_response = self
            .http
            .get("https://graph.facebook.com/v19.0/oauth/access_token")
            .query(&[
                ("client_id", app_id),
                ("client_secret", app_secret),
                ("redirect_uri", self.redirect_uri()?),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?
            .json::<FacebookTokenResponse>()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?;

        let user_info = self
            .http
            .get("https://graph.facebook.com/me")
            .query(&[
                ("fields", "id,email,first_name,last_name,picture"),
                ("access_token", token_response.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?
            .json::<FacebookUserInfo>()
            .await
            .map_err(|e| AuthError::OAuthExchange(e.to_string()))?;

        Ok(FederatedCallback {
            provider: OAuthProvider::Facebook,
            provider_user_id: user_info.id,
            email: user_info.email.unwrap_or_default(),
            first_name: user_info.first_name,
            last_name: user_info.last_name,
            picture_url: user_info.picture.and_then(|p| p.data).map(|d| d.url),
        })
    }

    fn redirect_uri(&self) -> Result<&str> {
        self.config
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::OAuthExchange("OAuth redirect URI not configured".into()))
    }

    fn google_client_id(&self) -> Result<&str> {
        self.config
            .google_client_id
            .as_deref()
            .ok_or_else(|| AuthError::OAuthExchange("Google client ID not configured".into()))
    }

    fn facebook_app_id(&self) -> Result<&str> {
        self.config
            .facebook_app_id
            .as_deref()
            .ok_or_else(|| AuthError::OAuthExchange("Facebook app ID not configured".into()))
    }
}

// ===== Provider Response Types =====

#[derive(Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct FacebookTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct FacebookUserInfo {
    id: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Deserialize)]
struct FacebookPicture {
    data: Option<FacebookPictureData>,
}

#[derive(Deserialize)]
struct FacebookPictureData {
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_single_use() {
        let states = OAuthStateStore::default();
        let state = states.issue(OAuthProvider::Google);

        assert_eq!(states.take(&state), Some(OAuthProvider::Google));
        assert_eq!(states.take(&state), None);
    }

    #[test]
    fn test_unknown_state_rejected() {
        let states = OAuthStateStore::default();
        assert_eq!(states.take("never-issued"), None);
    }

    #[test]
    fn test_derive_username_shape() {
        let name = derive_username("jane.doe+shop@example.com");
        assert!(name.starts_with("jane_doe_shop_"));
        assert!(!name.contains('@'));

        // Degenerate email still yields something usable.
        let fallback = derive_username("");
        assert!(fallback.starts_with("member_"));
    }
}
