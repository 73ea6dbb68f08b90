//! Versioned relationship cache with single-flight coalescing.
//!
//! ## Cache Key Design
//!
//! The key is derived from everything that can change an answer:
//! - the unordered person pair
//! - the graph version the answer was computed at
//! - the cache epoch (advanced by [`RelationshipCache::advance_epoch`])
//! - the policy parameters hash
//!
//! Entries are never swept. A new version or epoch makes old entries
//! unreachable and the LRU bound ages them out.
//!
//! ## Single-flight
//!
//! The first caller to miss on a key becomes the leader and computes; callers
//! arriving while it runs wait on a `watch` channel for its outcome instead of
//! computing again. A waiter never receives an aborted computation as its
//! answer: it retries under its own deadline. Lock order is always in-flight
//! map, then entries, and neither lock is held while computing or awaiting.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::types::{Deadline, GraphVersion, KinshipError, PersonPair, Relationship};

/// Configuration for the relationship cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Whether results are stored. Coalescing stays on either way.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Load from `KINSHIP_CACHE_MAX_ENTRIES` and `KINSHIP_CACHE_ENABLED`,
    /// falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: std::env::var("KINSHIP_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entries),
            enabled: std::env::var("KINSHIP_CACHE_ENABLED")
                .ok()
                .map(|s| !matches!(s.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.enabled),
        }
    }
}

/// Cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Normalized person pair.
    pub pair: PersonPair,
    /// Graph version.
    pub version: GraphVersion,
    /// Cache epoch.
    pub epoch: u64,
    /// Policy parameters hash.
    pub policy: u64,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that computed.
    pub misses: u64,
    /// Lookups that waited on another caller's computation.
    pub coalesced: u64,
    /// Entries pushed out by the LRU bound.
    pub evictions: u64,
    /// Current epoch.
    pub epoch: u64,
}

type Outcome = Result<Arc<Relationship>, KinshipError>;
type Flight = watch::Receiver<Option<Outcome>>;

/// Relationship cache.
///
/// Orientation-free: callers store and read the `(lo, hi)` orientation of
/// each pair and invert for flipped requests.
pub struct RelationshipCache {
    config: CacheConfig,
    entries: Mutex<LruCache<CacheKey, Arc<Relationship>>>,
    in_flight: Mutex<HashMap<CacheKey, Flight>>,
    epoch: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

impl Default for RelationshipCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

enum Role {
    Hit(Arc<Relationship>),
    Lead(watch::Sender<Option<Outcome>>),
    Follow(Flight),
}

/// Removes the in-flight marker if the leader unwinds before publishing.
struct FlightGuard<'c> {
    cache: &'c RelationshipCache,
    key: CacheKey,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.in_flight.lock().remove(&self.key);
        }
    }
}

impl RelationshipCache {
    /// Create a cache.
    pub fn new(config: CacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            entries: Mutex::new(LruCache::new(cap)),
            in_flight: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Advance the epoch, making every existing entry unreachable.
    ///
    /// Returns the new epoch.
    pub fn advance_epoch(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(epoch, "Relationship cache invalidated");
        epoch
    }

    /// Key for `pair` at `version` under the current epoch.
    pub fn key(&self, pair: PersonPair, version: GraphVersion, policy: u64) -> CacheKey {
        CacheKey {
            pair,
            version,
            epoch: self.epoch(),
            policy,
        }
    }

    /// Cached value for `key`, if present.
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<Relationship>> {
        self.entries.lock().peek(key).cloned()
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            len: entries.len(),
            cap: entries.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            epoch: self.epoch(),
        }
    }

    /// Return the cached relationship for `key`, or compute it once.
    ///
    /// Concurrent callers with the same key share one computation. Waiting
    /// honors `deadline`; `compute` is expected to honor it too.
    pub async fn get_or_compute<F>(
        &self,
        key: CacheKey,
        deadline: &Deadline,
        compute: F,
    ) -> Result<Arc<Relationship>, KinshipError>
    where
        F: FnOnce() -> Result<Relationship, KinshipError>,
    {
        let mut compute = Some(compute);

        loop {
            let role = {
                let mut flights = self.in_flight.lock();
                let hit = if self.config.enabled {
                    self.entries.lock().get(&key).cloned()
                } else {
                    None
                };
                if let Some(hit) = hit {
                    Role::Hit(hit)
                } else if let Some(flight) = flights.get(&key) {
                    Role::Follow(flight.clone())
                } else {
                    let (tx, rx) = watch::channel(None);
                    flights.insert(key, rx);
                    Role::Lead(tx)
                }
            };

            match role {
                Role::Hit(hit) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(pair = ?key.pair, version = %key.version, "Relationship cache hit");
                    return Ok(hit);
                }
                Role::Lead(tx) => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(pair = ?key.pair, version = %key.version, "Relationship cache miss");
                    let Some(compute) = compute.take() else {
                        // Unreachable: a caller leads at most once.
                        self.in_flight.lock().remove(&key);
                        return Err(KinshipError::InvariantViolation(
                            "single-flight leader ran twice".into(),
                        ));
                    };
                    return self.lead(key, tx, compute);
                }
                Role::Follow(mut flight) => {
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    let outcome = tokio::select! {
                        outcome = wait_for(&mut flight) => outcome,
                        reason = deadline.expired() => {
                            return Err(KinshipError::ComputationAborted(reason));
                        }
                    };
                    match outcome {
                        Some(Ok(rel)) => return Ok(rel),
                        Some(Err(e)) if !e.is_retryable() => return Err(e),
                        _ => {
                            tracing::debug!(pair = ?key.pair, "Leader did not finish, retrying");
                            deadline.check()?;
                        }
                    }
                }
            }
        }
    }

    fn lead<F>(&self, key: CacheKey, tx: watch::Sender<Option<Outcome>>, compute: F) -> Outcome
    where
        F: FnOnce() -> Result<Relationship, KinshipError>,
    {
        let mut guard = FlightGuard {
            cache: self,
            key,
            armed: true,
        };

        let outcome: Outcome = compute().map(Arc::new);

        {
            let mut flights = self.in_flight.lock();
            if let (Ok(rel), true) = (&outcome, self.config.enabled) {
                if let Some((evicted, _)) = self.entries.lock().push(key, Arc::clone(rel)) {
                    if evicted != key {
                        self.evictions.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            flights.remove(&key);
            guard.armed = false;
        }

        if let Err(e) = &outcome {
            tracing::debug!(pair = ?key.pair, error = %e, "Relationship computation failed");
        }
        tx.send_replace(Some(outcome.clone()));
        outcome
    }
}

/// Wait for the leader's outcome. `None` if the leader went away without one.
async fn wait_for(flight: &mut Flight) -> Option<Outcome> {
    loop {
        let current = flight.borrow_and_update().clone();
        if current.is_some() {
            return current;
        }
        if flight.changed().await.is_err() {
            return flight.borrow().clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use crate::types::{AbortReason, PersonId};

    fn key(cache: &RelationshipCache, a: u128, b: u128) -> CacheKey {
        cache.key(
            PersonPair::new(PersonId::from_u128(a), PersonId::from_u128(b)),
            GraphVersion::new(1),
            0,
        )
    }

    fn unrelated() -> Result<Relationship, KinshipError> {
        Ok(Relationship::unrelated(GraphVersion::new(1)))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = RelationshipCache::default();
        let k = key(&cache, 1, 2);

        cache.get_or_compute(k, &Deadline::none(), unrelated).await.unwrap();
        cache
            .get_or_compute(k, &Deadline::none(), || panic!("should be cached"))
            .await
            .unwrap();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = RelationshipCache::default();
        let k = key(&cache, 1, 2);

        let err = cache
            .get_or_compute(k, &Deadline::none(), || {
                Err(KinshipError::ComputationAborted(AbortReason::DeadlineElapsed))
            })
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(cache.stats().len, 0);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_epoch_makes_entries_unreachable() {
        let cache = RelationshipCache::default();
        let before = key(&cache, 1, 2);
        cache.get_or_compute(before, &Deadline::none(), unrelated).await.unwrap();

        assert_eq!(cache.advance_epoch(), 1);
        let after = key(&cache, 1, 2);
        assert_ne!(before, after);
        assert!(cache.peek(&after).is_none());
        assert!(cache.peek(&before).is_some());
    }

    #[tokio::test]
    async fn test_lru_bound_counts_evictions() {
        let cache = RelationshipCache::new(CacheConfig {
            max_entries: 2,
            enabled: true,
        });
        for n in 0..3 {
            let k = key(&cache, 10 + n, 20);
            cache.get_or_compute(k, &Deadline::none(), unrelated).await.unwrap();
        }
        let stats = cache.stats();
        assert_eq!((stats.len, stats.cap, stats.evictions), (2, 2, 1));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let cache = RelationshipCache::new(CacheConfig {
            max_entries: 10,
            enabled: false,
        });
        let calls = AtomicUsize::new(0);
        let k = key(&cache, 1, 2);
        for _ in 0..2 {
            cache
                .get_or_compute(k, &Deadline::none(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    unrelated()
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().len, 0);
    }

    #[tokio::test]
    async fn test_follower_times_out_while_leader_runs() {
        let cache = RelationshipCache::default();
        let k = key(&cache, 1, 2);

        // Simulate a leader mid-computation.
        let (tx, rx) = watch::channel(None);
        cache.in_flight.lock().insert(k, rx);

        let deadline = Deadline::after(Duration::from_millis(20));
        let err = cache
            .get_or_compute(k, &deadline, || panic!("follower must not compute"))
            .await
            .unwrap_err();
        assert_eq!(err, KinshipError::ComputationAborted(AbortReason::DeadlineElapsed));
        assert_eq!(cache.stats().coalesced, 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_follower_receives_leader_result() {
        let cache = Arc::new(RelationshipCache::default());
        let k = key(&cache, 1, 2);

        let (tx, rx) = watch::channel(None);
        cache.in_flight.lock().insert(k, rx);

        let follower = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(k, &Deadline::none(), || panic!("follower must not compute"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace(Some(Ok(Arc::new(Relationship::unrelated(GraphVersion::new(1))))));

        let rel = follower.await.unwrap().unwrap();
        assert!(!rel.is_related());
    }

    #[tokio::test]
    async fn test_follower_retries_when_leader_vanishes() {
        let cache = Arc::new(RelationshipCache::default());
        let k = key(&cache, 1, 2);

        let (tx, rx) = watch::channel(None);
        cache.in_flight.lock().insert(k, rx);

        let follower = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_compute(k, &Deadline::none(), unrelated).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Leader dropped without publishing, as its guard would on unwind.
        cache.in_flight.lock().remove(&k);
        drop(tx);

        assert!(follower.await.unwrap().is_ok());
        assert_eq!(cache.stats().misses, 1);
    }
}
