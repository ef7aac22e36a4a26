use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Remembers recently applied webhook bodies so Clay retries of the same
/// delivery are acknowledged without being applied twice.
///
/// Entries are SHA-256 fingerprints (hex) of the raw request body, scoped by
/// route so an identical body sent to two endpoints is not a replay.
#[derive(Clone)]
pub struct ReplayGuard {
    seen: Cache<String, ()>,
}

impl ReplayGuard {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
    const MAX_ENTRIES: u64 = 10_000;

    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Cache::builder()
                .max_capacity(Self::MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Hex SHA-256 of `scope` and `body`.
    pub fn fingerprint(scope: &str, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        hasher.update([0u8]);
        hasher.update(body);
        hex::encode(hasher.finalize())
    }

    /// `true` the first time a body is seen within the TTL, `false` on a replay.
    pub async fn check_and_remember(&self, scope: &str, body: &[u8]) -> bool {
        let key = Self::fingerprint(scope, body);
        let entry = self.seen.entry(key).or_insert(()).await;
        if !entry.is_fresh() {
            tracing::info!(
                "Duplicate {} delivery ignored (fingerprint {})",
                scope,
                &entry.key()[..12]
            );
        }
        entry.is_fresh()
    }

    /// Forget a fingerprint, e.g. when applying the delivery failed and Clay should retry.
    pub async fn forget(&self, scope: &str, body: &[u8]) {
        self.seen
            .invalidate(&Self::fingerprint(scope, body))
            .await;
    }

    /// Forget everything; a new search session starts from scratch.
    pub fn reset(&self) {
        self.seen.invalidate_all();
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
