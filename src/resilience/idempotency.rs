//! Guard against executing the same (request, model) pair twice.

use super::error::IdempotencyError;
use crate::config::IdempotencyConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Remembers executed `(request_id, model_id)` keys for a TTL.
///
/// Keys are kept whether the execution succeeded or failed; a caller that
/// wants to retry a failed request must use a new request id.
#[derive(Debug)]
pub struct IdempotencyGuard {
    seen: DashMap<(String, String), Instant>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(config: &IdempotencyConfig) -> Self {
        Self::with_ttl(config.ttl())
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register the key, or fail if it was registered within the TTL.
    ///
    /// Check and insert happen under one shard lock, so two concurrent
    /// callers with the same key cannot both succeed.
    pub fn check_and_register(&self, request_id: &str, model_id: &str) -> Result<(), IdempotencyError> {
        let now = Instant::now();
        match self.seen.entry((request_id.to_string(), model_id.to_string())) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.ttl {
                    tracing::warn!(request_id, model_id, "Duplicate request rejected");
                    return Err(IdempotencyError::Duplicate {
                        request_id: request_id.to_string(),
                        model_id: model_id.to_string(),
                    });
                }
                entry.insert(now);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(())
            }
        }
    }

    pub fn contains(&self, request_id: &str, model_id: &str) -> bool {
        self.seen
            .get(&(request_id.to_string(), model_id.to_string()))
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Drop expired keys. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.seen.len();
        let ttl = self.ttl;
        self.seen.retain(|_, at| at.elapsed() < ttl);
        let removed = before.saturating_sub(self.seen.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.seen.len(), "Purged expired idempotency keys");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for IdempotencyGuard {
    fn default() -> Self {
        Self::new(&IdempotencyConfig::default())
    }
}
