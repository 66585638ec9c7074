//! Request-scoped authenticated identity
//!
//! Created fresh per authentication event (a login, a federated callback, or
//! a refresh), handed to the token service, never persisted.

use crate::models::Account;

/// The identity produced by a successful authentication.
///
/// A tagged variant rather than one object wearing every capability: the
/// local flavor exists only where a password was actually checked, the
/// federated flavor where an identity provider vouched for the account. Both
/// share the same underlying `Account`.
#[derive(Debug, Clone)]
pub enum AuthenticatedIdentity {
    /// Authenticated against a locally stored password hash.
    Local { account: Account },
    /// Authenticated via an external identity provider.
    Federated { account: Account },
}

impl AuthenticatedIdentity {
    /// Wrap an account in the variant matching how it is able to
    /// authenticate. Used on the refresh path, where the original
    /// authentication event is not replayed.
    pub fn from_account(account: Account) -> Self {
        if account.is_federated_only() {
            AuthenticatedIdentity::Federated { account }
        } else {
            AuthenticatedIdentity::Local { account }
        }
    }

    pub fn account(&self) -> &Account {
        match self {
            AuthenticatedIdentity::Local { account } => account,
            AuthenticatedIdentity::Federated { account } => account,
        }
    }

    pub fn username(&self) -> &str {
        &self.account().username
    }

    pub fn role_names(&self) -> Vec<String> {
        self.account().role_names()
    }

    /// Token-version snapshot embedded in access tokens issued for this
    /// identity.
    pub fn token_version(&self) -> i32 {
        self.account().token_version
    }
}
