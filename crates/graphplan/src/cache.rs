//! Plan cache.
//!
//! Plans embed the literal values of their request, so a plan is only
//! reusable for an identical request. Requests are fingerprinted by
//! hashing their serialized form; a cached plan is valid only for the
//! metadata generation it was built against.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use graphplan_core::QueryPlan;
use graphplan_proto::QueryRequest;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::Error;

/// Stable hash of a request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanFingerprint([u8; 32]);

impl PlanFingerprint {
    /// Fingerprint a request from its JSON form.
    pub fn of(request: &QueryRequest) -> Result<Self, Error> {
        let bytes = serde_json::to_vec(request)?;
        Ok(Self(*blake3::hash(&bytes).as_bytes()))
    }

    /// Hex form of the fingerprint.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PlanFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlanFingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PlanFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

struct CachedPlan {
    plan: Arc<QueryPlan>,
    generation: u64,
    hits: AtomicU64,
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that hit, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}

/// Bounded plan cache. When full, the least-hit entry is evicted.
pub struct PlanCache {
    entries: RwLock<HashMap<PlanFingerprint, CachedPlan>>,
    capacity: usize,
    stats: CacheStats,
}

impl PlanCache {
    /// Create a cache holding at most `capacity` plans.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            stats: CacheStats::default(),
        }
    }

    /// Look up a plan built against metadata `generation`.
    pub fn get(&self, fingerprint: &PlanFingerprint, generation: u64) -> Option<Arc<QueryPlan>> {
        let entries = self.entries.read();
        match entries.get(fingerprint) {
            Some(cached) if cached.generation == generation => {
                cached.hits.fetch_add(1, Ordering::Relaxed);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&cached.plan))
            }
            _ => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a plan. Entries of older generations are dropped first.
    pub fn insert(&self, fingerprint: PlanFingerprint, plan: Arc<QueryPlan>, generation: u64) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, cached| cached.generation >= generation);
        let stale = before - entries.len();
        if stale > 0 {
            trace!(stale, generation, "stale plans dropped");
        }

        if entries.len() >= self.capacity && !entries.contains_key(&fingerprint) {
            let victim = entries
                .iter()
                .min_by_key(|(_, cached)| cached.hits.load(Ordering::Relaxed))
                .map(|(key, _)| *key);
            if let Some(victim) = victim {
                entries.remove(&victim);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        entries.insert(
            fingerprint,
            CachedPlan {
                plan,
                generation,
                hits: AtomicU64::new(0),
            },
        );
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphplan_core::{Source, SourceIds};
    use graphplan_proto::FilterExpr;

    fn plan() -> Arc<QueryPlan> {
        let mut ids = SourceIds::new();
        Arc::new(QueryPlan::new(Source::table(ids.next_id(), "Orders", None)))
    }

    #[test]
    fn test_fingerprint_tracks_values() {
        let a = QueryRequest::new("Order").with_filter(FilterExpr::eq("Id", 1));
        let b = QueryRequest::new("Order").with_filter(FilterExpr::eq("Id", 2));

        assert_eq!(PlanFingerprint::of(&a).unwrap(), PlanFingerprint::of(&a.clone()).unwrap());
        assert_ne!(PlanFingerprint::of(&a).unwrap(), PlanFingerprint::of(&b).unwrap());
        assert_eq!(PlanFingerprint::of(&a).unwrap().to_hex().len(), 64);
    }

    #[test]
    fn test_get_checks_generation() {
        let cache = PlanCache::new(4);
        let key = PlanFingerprint::of(&QueryRequest::new("Order")).unwrap();
        cache.insert(key, plan(), 0);

        assert!(cache.get(&key, 0).is_some());
        assert!(cache.get(&key, 1).is_none());
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hit_rate(), 0.5);

        // A newer generation drops older plans.
        let other = PlanFingerprint::of(&QueryRequest::new("Customer")).unwrap();
        cache.insert(other, plan(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_hit() {
        let cache = PlanCache::new(2);
        let keys: Vec<PlanFingerprint> = ["A", "B", "C"]
            .iter()
            .map(|t| PlanFingerprint::of(&QueryRequest::new(*t)).unwrap())
            .collect();

        cache.insert(keys[0], plan(), 0);
        cache.insert(keys[1], plan(), 0);
        cache.get(&keys[0], 0);
        cache.insert(keys[2], plan(), 0);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0], 0).is_some());
        assert!(cache.get(&keys[1], 0).is_none());
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = PlanCache::new(0);
        let key = PlanFingerprint::of(&QueryRequest::new("Order")).unwrap();
        cache.insert(key, plan(), 0);
        assert!(cache.is_empty());
    }
}
