use parking_lot::Mutex;
use printforge_core::CacheConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::pricing::Quote;

/// Quotes are cached per model content and material.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QuoteKey {
    pub model_hash: String,
    pub material: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Quote,
    created_at: SystemTime,
    last_accessed: SystemTime,
    access_count: u64,
    ttl: Duration,
    ttl_extended: bool,
}

impl CacheEntry {
    fn new(value: Quote, ttl: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            value,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            ttl,
            ttl_extended: false,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed().unwrap_or(Duration::ZERO) > self.ttl
    }

    fn touch(&mut self) {
        self.last_accessed = SystemTime::now();
        self.access_count += 1;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}

struct CacheInner {
    entries: HashMap<QuoteKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Content-addressed quote cache: capacity-bounded, TTL'd, LRU-evicted.
/// Entries that prove popular earn one TTL extension so recurring models
/// outlive the base window.
pub struct QuotationCache {
    inner: Mutex<CacheInner>,
    config: CacheConfig,
}

impl QuotationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            config,
        }
    }

    pub fn get(&self, key: &QuoteKey) -> Option<Quote> {
        let mut inner = self.inner.lock();
        let expired = inner.entries.get(key).map(|entry| entry.is_expired());
        match expired {
            None => {
                inner.misses += 1;
                None
            }
            Some(true) => {
                inner.entries.remove(key);
                inner.expirations += 1;
                inner.misses += 1;
                None
            }
            Some(false) => {
                let threshold = self.config.popularity_threshold;
                let factor = self.config.ttl_extension_factor;
                let entry = inner.entries.get_mut(key).expect("entry exists");
                entry.touch();
                if !entry.ttl_extended && entry.access_count >= threshold {
                    entry.ttl = Duration::from_secs_f64(entry.ttl.as_secs_f64() * factor);
                    entry.ttl_extended = true;
                }
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
        }
    }

    pub fn insert(&self, key: QuoteKey, value: Quote) {
        let ttl = Duration::from_secs(self.config.ttl_secs);
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.capacity {
            // Prefer dropping something already dead before the LRU victim.
            let expired: Option<QuoteKey> = inner
                .entries
                .iter()
                .find(|(_, entry)| entry.is_expired())
                .map(|(k, _)| k.clone());
            match expired {
                Some(victim) => {
                    inner.entries.remove(&victim);
                    inner.expirations += 1;
                }
                None => {
                    let lru: Option<QuoteKey> = inner
                        .entries
                        .iter()
                        .min_by_key(|(_, entry)| entry.last_accessed)
                        .map(|(k, _)| k.clone());
                    if let Some(victim) = lru {
                        inner.entries.remove(&victim);
                        inner.evictions += 1;
                    }
                }
            }
        }
        inner.entries.insert(key, CacheEntry::new(value, ttl));
    }

    /// Drop every expired entry; returns how many were removed. Driven by
    /// the server's periodic housekeeping task.
    pub fn sweep(&self) -> usize {
        let mut inner = self.inner.lock();
        let dead: Vec<QuoteKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &dead {
            inner.entries.remove(key);
        }
        inner.expirations += dead.len() as u64;
        dead.len()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            entries: inner.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MeshReport;
    use printforge_core::Money;

    fn test_config(capacity: usize, ttl_secs: u64) -> CacheConfig {
        CacheConfig {
            capacity,
            ttl_secs,
            popularity_threshold: 3,
            ttl_extension_factor: 2.0,
        }
    }

    fn quote(hash: &str) -> Quote {
        Quote {
            model_hash: hash.into(),
            material: "PLA".into(),
            mesh: MeshReport {
                triangle_count: 4,
                bbox_min: [0.0; 3],
                bbox_max: [1.0; 3],
                surface_area_mm2: 2.0,
                volume_mm3: 1.0,
                watertight: true,
            },
            material_cost: Money::from_cents(100),
            machine_cost: Money::from_cents(50),
            total: Money::from_cents(150),
            computed_at: chrono::Utc::now(),
        }
    }

    fn key(hash: &str) -> QuoteKey {
        QuoteKey {
            model_hash: hash.into(),
            material: "PLA".into(),
        }
    }

    #[test]
    fn hit_and_miss_accounting() {
        let cache = QuotationCache::new(test_config(10, 60));
        assert!(cache.get(&key("a")).is_none());
        cache.insert(key("a"), quote("a"));
        assert!(cache.get(&key("a")).is_some());
        // Same hash, different material is a different entry
        assert!(cache
            .get(&QuoteKey {
                model_hash: "a".into(),
                material: "PETG".into()
            })
            .is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn expired_entries_read_as_misses() {
        let cache = QuotationCache::new(test_config(10, 0));
        cache.insert(key("a"), quote("a"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key("a")).is_none());
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let cache = QuotationCache::new(test_config(2, 60));
        cache.insert(key("a"), quote("a"));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("b"), quote("b"));
        std::thread::sleep(Duration::from_millis(2));
        // Touch "a" so "b" becomes the LRU victim
        assert!(cache.get(&key("a")).is_some());
        std::thread::sleep(Duration::from_millis(2));

        cache.insert(key("c"), quote("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn sweep_removes_expired_entries() {
        let cache = QuotationCache::new(test_config(10, 0));
        cache.insert(key("a"), quote("a"));
        cache.insert(key("b"), quote("b"));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.sweep(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn popular_entries_get_one_ttl_extension() {
        let cache = QuotationCache::new(test_config(10, 60));
        cache.insert(key("a"), quote("a"));
        for _ in 0..5 {
            assert!(cache.get(&key("a")).is_some());
        }
        let inner = cache.inner.lock();
        let entry = inner.entries.get(&key("a")).unwrap();
        assert!(entry.ttl_extended);
        assert_eq!(entry.ttl, Duration::from_secs(120));
    }
}
