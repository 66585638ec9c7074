use chrono::{DateTime, Utc};
/// Federated-login models
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(OAuthProvider::Google),
            "facebook" => Some(OAuthProvider::Facebook),
            _ => None,
        }
    }
}

/// Payload of a federated-login callback after the provider exchange.
///
/// This is the reconciler's entire view of the provider: a stable
/// `(provider, provider_user_id)` identity plus display attributes.
#[derive(Debug, Clone)]
pub struct FederatedCallback {
    pub provider: OAuthProvider,
    pub provider_user_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture_url: Option<String>,
}

impl FederatedCallback {
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

/// Persisted binding between a provider identity and a local account.
///
/// `(provider, provider_user_id)` is unique together and owned by exactly
/// one account; repeat federated logins resolve through this link rather
/// than by email matching.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExternalIdentityLink {
    pub id: Uuid,
    pub account_id: Uuid,
    pub provider: String,
    pub provider_user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub picture_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartOAuthFlowRequest {
    pub provider: String,
}

/// Query parameters on the provider redirect back to us.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OAuthCallbackParams {
    pub state: String,
    pub code: String,
}
