// In-memory cache layer
//
// The LRU store plus the mutex-guarded wrapper the group coordinator
// actually reads and writes through.

pub mod lru;

use crate::byte_view::ByteView;
use lru::LruStore;
use parking_lot::Mutex;

/// Mutex-protected LRU of `ByteView`s, lazily initialized
///
/// A single exclusive lock covers both operations: a get mutates the recency
/// order, so there is no safe reader/writer split. The store itself is only
/// allocated on the first add; probing a never-populated cache is a cheap
/// miss.
pub(crate) struct ConcurrentCache {
    cache_bytes: u64,
    inner: Mutex<Option<LruStore<ByteView>>>,
}

impl ConcurrentCache {
    pub(crate) fn new(cache_bytes: u64) -> Self {
        ConcurrentCache {
            cache_bytes,
            inner: Mutex::new(None),
        }
    }

    pub(crate) fn add(&self, key: &str, value: ByteView) {
        let mut inner = self.inner.lock();
        inner
            .get_or_insert_with(|| LruStore::new(self.cache_bytes, None))
            .set(key, value);
    }

    pub(crate) fn get(&self, key: &str) -> Option<ByteView> {
        let mut inner = self.inner.lock();
        inner.as_mut()?.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_before_first_add_is_a_miss() {
        let cache = ConcurrentCache::new(1024);
        assert!(cache.get("anything").is_none());
    }

    #[test]
    fn test_add_then_get() {
        let cache = ConcurrentCache::new(1024);
        cache.add("Tom", ByteView::from("630"));
        assert_eq!(cache.get("Tom"), Some(ByteView::from("630")));
        assert!(cache.get("Jack").is_none());
    }

    #[test]
    fn test_budget_applies() {
        let cache = ConcurrentCache::new(10);
        cache.add("k1", ByteView::from("v1"));
        cache.add("k2", ByteView::from("v2"));
        cache.add("k3", ByteView::from("v3"));
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k3").is_some());
    }
}
