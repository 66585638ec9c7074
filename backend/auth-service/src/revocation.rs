//! In-process revocation store for access tokens
//!
//! Tokens are self-verifying, so server-side logout needs a registry of
//! revoked-but-unexpired tokens. Entries are keyed by the SHA-256 of the
//! token (raw tokens never sit in memory dumps) and carry the token's own
//! expiry: once that passes the token rejects itself and the entry is moot.
//!
//! Eviction happens two ways: lazily when a lookup finds an expired entry,
//! and via a periodic sweep that bounds memory for tokens revoked and never
//! presented again. The map is sharded (dashmap), so neither path serializes
//! unrelated request traffic through one lock.
//!
//! Only access tokens are registered here. A refresh token stolen before
//! logout stays valid until natural expiry; the token-version counter is the
//! compensating control for credential-affecting changes.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::metrics;

#[derive(Default)]
pub struct RevocationStore {
    entries: DashMap<String, i64>,
}

impl RevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token as revoked until `expires_at_secs`.
    ///
    /// Idempotent; safe under arbitrary concurrent writers.
    pub fn revoke(&self, token: &str, expires_at_secs: i64) {
        self.entries.insert(hash_token(token), expires_at_secs);
        metrics::TOKENS_REVOKED_TOTAL.inc();
    }

    /// Whether a token is currently revoked.
    ///
    /// An entry whose expiry has passed is removed on the spot and reported
    /// as not revoked: the token can no longer pass signature verification
    /// anyway.
    pub fn is_revoked(&self, token: &str) -> bool {
        let key = hash_token(token);
        let now = chrono::Utc::now().timestamp();

        let expires_at = match self.entries.get(&key) {
            Some(entry) => *entry,
            None => return false,
        };

        if expires_at > now {
            return true;
        }

        // Lazy eviction. remove_if guards against racing a fresh revoke of
        // the same token.
        self.entries.remove_if(&key, |_, exp| *exp <= now);
        false
    }

    /// Drop every expired entry, returning how many were evicted.
    ///
    /// `retain` works shard-by-shard, so readers and writers on other shards
    /// are never blocked for the duration of the scan.
    pub fn sweep(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let before = self.entries.len();
        self.entries.retain(|_, exp| *exp > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Start the periodic sweep on its own timer.
///
/// A missed or failed cycle is harmless: lazy eviction on lookup is the
/// correctness backstop, the sweep only bounds memory.
pub fn spawn_sweeper(store: Arc<RevocationStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick fires immediately; skip it.
        interval.tick().await;

        loop {
            interval.tick().await;
            let evicted = store.sweep();
            metrics::REVOCATION_SWEEP_EVICTIONS_TOTAL.inc_by(evicted as u64);
            metrics::REVOKED_TOKENS_LIVE.set(store.len() as i64);
            tracing::debug!(evicted, live = store.len(), "revocation sweep completed");
        }
    })
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
