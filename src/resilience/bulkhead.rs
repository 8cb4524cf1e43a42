//! Per-provider concurrency pools.
//!
//! Each provider gets a fixed number of slots. Callers beyond capacity wait
//! in FIFO order (tokio's semaphore is fair) instead of being rejected, so
//! one saturated provider cannot starve the others.

use super::error::BulkheadError;
use crate::config::{BulkheadConfig, DEFAULT_POOL};
use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkheadStats {
    pub pool: String,
    pub capacity: usize,
    pub in_flight: usize,
    pub queued: usize,
    pub available: usize,
}

/// A single named concurrency pool.
#[derive(Debug)]
pub struct BulkheadPool {
    name: String,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    in_flight: AtomicUsize,
    queued: AtomicUsize,
}

impl BulkheadPool {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            in_flight: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Wait for a slot, run `f`, release the slot.
    pub async fn run<T, F, Fut>(&self, f: F) -> Result<T, BulkheadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = {
            let _waiting = QueuedSlot::enter(self);
            self.semaphore.acquire().await
        };
        let _permit = permit.map_err(|_| BulkheadError::Closed {
            pool: self.name.clone(),
        })?;

        let _slot = InFlightSlot::enter(self);
        Ok(f().await)
    }

    pub fn stats(&self) -> BulkheadStats {
        BulkheadStats {
            pool: self.name.clone(),
            capacity: self.capacity,
            in_flight: self.in_flight(),
            queued: self.queued(),
            available: self.semaphore.available_permits(),
        }
    }

    fn close(&self) {
        self.semaphore.close();
    }
}

/// Counts a caller waiting for a permit, including one that gives up.
struct QueuedSlot<'a> {
    pool: &'a BulkheadPool,
}

impl<'a> QueuedSlot<'a> {
    fn enter(pool: &'a BulkheadPool) -> Self {
        pool.queued.fetch_add(1, Ordering::SeqCst);
        Self { pool }
    }
}

impl Drop for QueuedSlot<'_> {
    fn drop(&mut self) {
        self.pool.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keeps `in_flight` and its gauge accurate even if the future is dropped.
struct InFlightSlot<'a> {
    pool: &'a BulkheadPool,
}

impl<'a> InFlightSlot<'a> {
    fn enter(pool: &'a BulkheadPool) -> Self {
        let now = pool.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::gauge!("arbiter_bulkhead_in_flight", "pool" => pool.name.clone()).set(now as f64);
        Self { pool }
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let now = self.pool.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::gauge!("arbiter_bulkhead_in_flight", "pool" => self.pool.name.clone())
            .set(now as f64);
    }
}

/// Routes calls to the pool belonging to their provider.
#[derive(Debug)]
pub struct BulkheadExecutor {
    pools: DashMap<String, Arc<BulkheadPool>>,
}

impl BulkheadExecutor {
    pub fn new(config: &BulkheadConfig) -> Self {
        let pools = DashMap::new();
        for (name, capacity) in &config.pools {
            let name = name.to_ascii_lowercase();
            pools.insert(name.clone(), Arc::new(BulkheadPool::new(name, *capacity)));
        }
        if !pools.contains_key(DEFAULT_POOL) {
            pools.insert(
                DEFAULT_POOL.to_string(),
                Arc::new(BulkheadPool::new(DEFAULT_POOL, config.default_capacity())),
            );
        }
        Self { pools }
    }

    /// Pool for `provider`; unknown providers share the default pool.
    pub fn pool_for(&self, provider: &str) -> Arc<BulkheadPool> {
        let key = provider.to_ascii_lowercase();
        if let Some(pool) = self.pools.get(&key) {
            return Arc::clone(pool.value());
        }
        let entry = self
            .pools
            .entry(DEFAULT_POOL.to_string())
            .or_insert_with(|| Arc::new(BulkheadPool::new(DEFAULT_POOL, 5)));
        Arc::clone(entry.value())
    }

    /// Run `f` inside the pool for `provider`.
    pub async fn execute<T, F, Fut>(&self, provider: &str, f: F) -> Result<T, BulkheadError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let pool = self.pool_for(provider);
        if pool.semaphore.available_permits() == 0 {
            tracing::debug!(pool = %pool.name(), queued = pool.queued() + 1, "Bulkhead full, waiting for slot");
        }
        pool.run(f).await
    }

    pub fn stats(&self, pool: &str) -> Option<BulkheadStats> {
        self.pools.get(pool).map(|p| p.stats())
    }

    /// Stats for every pool sorted by name.
    pub fn all_stats(&self) -> Vec<BulkheadStats> {
        let mut stats: Vec<_> = self.pools.iter().map(|p| p.stats()).collect();
        stats.sort_by(|a, b| a.pool.cmp(&b.pool));
        stats
    }

    /// Close every pool. Waiting and future callers get `BulkheadError::Closed`.
    pub fn shutdown(&self) {
        for pool in self.pools.iter() {
            pool.close();
        }
    }
}

impl Default for BulkheadExecutor {
    fn default() -> Self {
        Self::new(&BulkheadConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn config(pools: &[(&str, usize)]) -> BulkheadConfig {
        BulkheadConfig {
            pools: pools
                .iter()
                .map(|(n, c)| (n.to_string(), *c))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn unknown_provider_uses_default_pool() {
        let executor = BulkheadExecutor::default();
        assert_eq!(executor.pool_for("openai").capacity(), 10);
        assert_eq!(executor.pool_for("OpenAI").capacity(), 10);
        assert_eq!(executor.pool_for("mistral").name(), DEFAULT_POOL);
        assert_eq!(executor.pool_for("mistral").capacity(), 5);
    }

    #[test]
    fn default_pool_added_when_missing() {
        let executor = BulkheadExecutor::new(&config(&[("openai", 2)]));
        assert_eq!(executor.all_stats().len(), 2);
        assert_eq!(executor.stats(DEFAULT_POOL).unwrap().capacity, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_capacity() {
        let executor = Arc::new(BulkheadExecutor::new(&config(&[("openai", 2)])));
        let peak = Arc::new(AtomicUsize::new(0));
        let current = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let executor = Arc::clone(&executor);
                let peak = Arc::clone(&peak);
                let current = Arc::clone(&current);
                tokio::spawn(async move {
                    executor
                        .execute("openai", || async {
                            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            current.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
        let stats = executor.stats("openai").unwrap();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.available, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn waiters_are_admitted_in_arrival_order() {
        let executor = Arc::new(BulkheadExecutor::new(&config(&[("openai", 1)])));
        let (release, hold) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .execute("openai", || async move {
                        let _ = hold.await;
                    })
                    .await
            })
        };
        while executor.stats("openai").unwrap().in_flight == 0 {
            tokio::task::yield_now().await;
        }

        let started = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut waiters = Vec::new();
        for i in 0..5 {
            let task_executor = Arc::clone(&executor);
            let started = Arc::clone(&started);
            waiters.push(tokio::spawn(async move {
                task_executor
                    .execute("openai", || async move {
                        started.lock().unwrap().push(i);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    })
                    .await
            }));
            while executor.stats("openai").unwrap().queued < i + 1 {
                tokio::task::yield_now().await;
            }
        }

        release.send(()).unwrap();
        holder.await.unwrap().unwrap();
        for waiter in waiters {
            waiter.await.unwrap().unwrap();
        }
        assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn pools_are_isolated() {
        let executor = Arc::new(BulkheadExecutor::new(&config(&[("openai", 1), ("anthropic", 1)])));

        let blocker = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move {
                executor
                    .execute("openai", || tokio::time::sleep(Duration::from_secs(60)))
                    .await
            })
        };
        while executor.stats("openai").unwrap().in_flight == 0 {
            tokio::task::yield_now().await;
        }

        let value = executor.execute("anthropic", || async { 7 }).await.unwrap();
        assert_eq!(value, 7);

        blocker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_rejects_callers() {
        let executor = BulkheadExecutor::default();
        executor.shutdown();
        let result = executor.execute("openai", || async {}).await;
        assert_eq!(
            result,
            Err(BulkheadError::Closed {
                pool: "openai".to_string()
            })
        );
    }
}
