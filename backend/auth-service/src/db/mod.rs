//! Credential store boundary
//!
//! The auth subsystem consumes account data through this interface; the rest
//! of the backend owns the tables. `PgCredentialStore` is the production
//! implementation; tests substitute an in-memory one.

pub mod postgres;

pub use postgres::PgCredentialStore;

use crate::error::Result;
use crate::models::{Account, FederatedCallback, OAuthProvider, Role};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolve an account by username or email, roles eagerly loaded.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>>;

    /// Resolve an account by email only (federated silent-linking path).
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Resolve the account owning a `(provider, provider_user_id)` link.
    async fn find_by_external_link(
        &self,
        provider: OAuthProvider,
        provider_user_id: &str,
    ) -> Result<Option<Account>>;

    /// Single indexed read of an account's current token version.
    ///
    /// Deliberately not a full account load: this runs on every access-token
    /// validation.
    async fn current_token_version(&self, username: &str) -> Result<Option<i32>>;

    /// Create a password-bearing account with one initial role.
    async fn create_local_account(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Account>;

    /// Create a federated-only account (no password hash) with one initial
    /// role, attributes taken from the provider callback.
    async fn create_federated_account(
        &self,
        username: &str,
        callback: &FederatedCallback,
        role: Role,
    ) -> Result<Account>;

    /// Bind a provider identity to an account. Fails with
    /// `ExternalLinkConflict` if another account already claims it.
    async fn link_external_identity(
        &self,
        account_id: Uuid,
        callback: &FederatedCallback,
    ) -> Result<()>;

    /// Replace the password hash and bump the token version in one
    /// statement, returning the new version. Every outstanding access token
    /// becomes stale at that instant.
    async fn update_password(&self, account_id: Uuid, new_hash: &str) -> Result<i32>;
}
