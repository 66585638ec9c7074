pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod revocation;
pub mod routes;
pub mod security;
pub mod services;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use error::{AuthError, Result};

use std::sync::Arc;

use crate::db::CredentialStore;
use crate::revocation::RevocationStore;
use crate::services::{AuthOrchestrator, FederationService, TokenService};

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub revocations: Arc<RevocationStore>,
    pub auth: Arc<AuthOrchestrator>,
    pub federation: Arc<FederationService>,
    pub public_prefixes: Arc<Vec<String>>,
}
