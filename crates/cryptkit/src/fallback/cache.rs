//! Memoised probe outcomes, keyed by (category, candidate).
//!
//! The cache uses `arc-swap` for lock-free reads on the hot path. Inserts copy the map and
//! swap it in; two threads racing to record the same candidate write the same boolean, so
//! the race is harmless. Entries are never invalidated.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use arc_swap::ArcSwap;

use super::Category;

type ProbeKey = (Category, String);

static GLOBAL: LazyLock<ProbeCache> = LazyLock::new(ProbeCache::new);

/// Shared, lock-free cache of probe results.
///
/// Cloning shares the underlying map. [`ProbeCache::global`] is the process-wide instance
/// used with the built-in registry.
#[derive(Clone, Debug)]
pub struct ProbeCache {
    inner: Arc<ArcSwap<HashMap<ProbeKey, bool>>>,
}

impl ProbeCache {
    /// Create a new, empty [`ProbeCache`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(HashMap::new()))),
        }
    }

    /// A handle on the process-wide cache.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// Return the number of recorded probes.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// Return `true` if nothing has been probed yet.
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Look up a previous probe outcome. Candidate names compare case-insensitively.
    pub fn get(&self, category: Category, candidate: &str) -> Option<bool> {
        self.inner
            .load()
            .get(&(category, candidate.to_ascii_lowercase()))
            .copied()
    }

    /// Record a probe outcome.
    pub fn record(&self, category: Category, candidate: &str, usable: bool) {
        let key = (category, candidate.to_ascii_lowercase());
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.clone(), usable);
            next
        });
    }
}

impl Default for ProbeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initially_empty() {
        let cache = ProbeCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get(Category::Cipher, "AES"), None);
    }

    #[test]
    fn record_and_get() {
        let cache = ProbeCache::new();
        cache.record(Category::Cipher, "AES", true);
        cache.record(Category::Cipher, "Twofish", false);
        assert_eq!(cache.get(Category::Cipher, "AES"), Some(true));
        assert_eq!(cache.get(Category::Cipher, "aes"), Some(true));
        assert_eq!(cache.get(Category::Cipher, "Twofish"), Some(false));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn categories_are_independent() {
        let cache = ProbeCache::new();
        cache.record(Category::StreamMode, "CTR", true);
        assert_eq!(cache.get(Category::BlockMode, "CTR"), None);
    }

    #[test]
    fn clones_share_state() {
        let cache = ProbeCache::new();
        let other = cache.clone();
        other.record(Category::Digest, "SHA-256", true);
        assert_eq!(cache.get(Category::Digest, "SHA-256"), Some(true));
    }

    #[test]
    fn concurrent_records_converge() {
        let cache = ProbeCache::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache.record(Category::Mac, "HMAC", true);
                    cache.record(Category::Encoding, &format!("codec-{i}"), i % 2 == 0);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.get(Category::Mac, "HMAC"), Some(true));
        assert_eq!(cache.len(), 9);
    }
}
