//! Revocation cache for explicitly invalidated tokens.
//!
//! Only tokens that were poisoned before their natural expiry are tracked.
//! Each entry carries the instant it is poisoned until and the cache drops
//! it once that instant passes, so memory stays bounded by the set of
//! recently revoked tokens.
//!
//! The cache has no capacity bound: evicting a live entry early would
//! make its token valid again.

use moka::sync::Cache;
use std::time::{Duration, Instant};

/// Per-entry expiry: an entry lives until the instant stored as its value.
struct PoisonExpiry;

impl moka::Expiry<String, Instant> for PoisonExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Instant,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Instant,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.saturating_duration_since(updated_at))
    }
}

/// Concurrent set of poisoned token strings, each with its own expiry.
#[derive(Clone)]
pub struct RevocationCache {
    entries: Cache<String, Instant>,
}

impl Default for RevocationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RevocationCache {
    pub fn new() -> Self {
        let entries = Cache::builder().expire_after(PoisonExpiry).build();
        Self { entries }
    }

    /// Reject `token` until `expires_at`.
    ///
    /// Poisoning an already poisoned token keeps the later of the two expiries.
    pub fn poison(&self, token: &str, expires_at: Instant) {
        self.entries
            .entry(token.to_owned())
            .and_upsert_with(|current| match current {
                Some(entry) if *entry.value() > expires_at => entry.into_value(),
                _ => expires_at,
            });
    }

    /// Reject `token` for `window` from now.
    pub fn poison_for(&self, token: &str, window: Duration) {
        self.poison(token, Instant::now() + window);
    }

    /// True while `token` is poisoned and its entry has not expired.
    pub fn contains(&self, token: &str) -> bool {
        self.entries
            .get(token)
            .map_or(false, |expires_at| Instant::now() < expires_at)
    }

    /// Apply pending evictions now instead of on the next access.
    pub fn purge_expired(&self) {
        self.entries.run_pending_tasks();
    }

    /// Number of live entries as of the last `purge_expired`.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
