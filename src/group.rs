// Namespace coordinator
//
// A Group is a named cache scope: local LRU first, then the owning peer by
// consistent hash, then the user-supplied loader, with concurrent requests
// for the same key collapsed into one load.

use crate::byte_view::ByteView;
use crate::cache::ConcurrentCache;
use crate::error::{Error, Result};
use crate::peers::{PeerGetter, PeerPicker};
use crate::singleflight::SingleFlight;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces the authoritative value for a key when every cache misses
///
/// Implemented for free by any `Fn(&str) -> anyhow::Result<Vec<u8>>`
/// closure, so callers can pass a function where a full type would be noise.
pub trait Loader: Send + Sync {
    fn load(&self, key: &str) -> anyhow::Result<Vec<u8>>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    fn load(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self(key)
    }
}

static GROUPS: Lazy<RwLock<HashMap<String, Arc<Group>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Create a named group and register it process-wide
///
/// Re-registering a name replaces the previous group (last wins).
pub fn new_group<L>(name: &str, cache_bytes: u64, loader: L) -> Arc<Group>
where
    L: Loader + 'static,
{
    let group = Arc::new(Group {
        name: name.to_string(),
        loader: Box::new(loader),
        cache: ConcurrentCache::new(cache_bytes),
        peers: OnceCell::new(),
        flight: SingleFlight::new(),
    });
    GROUPS.write().insert(name.to_string(), Arc::clone(&group));
    group
}

/// Look up a previously registered group by name
pub fn get_group(name: &str) -> Option<Arc<Group>> {
    GROUPS.read().get(name).cloned()
}

/// A named, independent cache scope with its own loader and storage
pub struct Group {
    name: String,
    loader: Box<dyn Loader>,
    cache: ConcurrentCache,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    flight: SingleFlight<ByteView>,
}

impl Group {
    /// The namespace this group serves
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install the peer picker for this group
    ///
    /// # Panics
    ///
    /// Panics if called more than once; wiring peers twice is a programming
    /// error, not a runtime condition.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        if self.peers.set(picker).is_err() {
            panic!("register_peers called more than once for group {:?}", self.name);
        }
    }

    /// Fetch the value for `key`: local cache, then owning peer, then loader
    pub fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if let Some(value) = self.cache.get(key) {
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }
        self.load(key)
    }

    /// Miss path, gated so concurrent gets for one key issue one fetch
    fn load(&self, key: &str) -> Result<ByteView> {
        self.flight.run(key, || {
            if let Some(picker) = self.peers.get() {
                if let Some(peer) = picker.pick_peer(key) {
                    match self.get_from_peer(peer.as_ref(), key) {
                        Ok(value) => return Ok(value),
                        Err(err) => {
                            // A dead or partitioned peer degrades to a local
                            // load rather than a caller-visible failure.
                            warn!(group = %self.name, key, %err, "peer fetch failed, falling back to loader");
                        }
                    }
                }
            }
            self.get_locally(key)
        })
    }

    fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self
            .loader
            .load(key)
            .map_err(|err| Error::Loader(err.to_string()))?;
        let value = ByteView::from(bytes);
        self.cache.add(key, value.clone());
        Ok(value)
    }

    // The owning peer is the authoritative cache for this key; its value is
    // not duplicated into the local store.
    fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.get(&self.name, key)?;
        Ok(ByteView::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn score_db() -> HashMap<&'static str, &'static str> {
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
    }

    #[test]
    fn test_loader_runs_once_per_cached_key() {
        let loads: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let counted = Arc::clone(&loads);
        let db = score_db();
        let group = new_group("scores-loader", 2 << 10, move |key: &str| {
            *counted.lock().entry(key.to_string()).or_insert(0) += 1;
            db.get(key)
                .map(|v| v.as_bytes().to_vec())
                .ok_or_else(|| anyhow!("{key} not found"))
        });

        for (key, value) in score_db() {
            assert_eq!(group.get(key).unwrap().to_string(), value);
            // Second get is served from the local cache.
            assert_eq!(group.get(key).unwrap().to_string(), value);
            assert_eq!(loads.lock()[key], 1, "loader re-ran for {key}");
        }

        let err = group.get("unknown").unwrap_err();
        assert!(matches!(err, Error::Loader(_)), "got {err:?}");
        // Failed loads are never cached.
        group.get("unknown").unwrap_err();
        assert_eq!(loads.lock()["unknown"], 2);
    }

    #[test]
    fn test_empty_key_rejected() {
        let group = new_group("scores-empty", 2 << 10, |_: &str| Ok(b"v".to_vec()));
        assert!(matches!(group.get(""), Err(Error::EmptyKey)));
    }

    #[test]
    fn test_registry_lookup() {
        let group = new_group("scores-registry", 2 << 10, |_: &str| Ok(b"v".to_vec()));
        let found = get_group("scores-registry").expect("registered group");
        assert_eq!(found.name(), group.name());
        assert!(get_group("no-such-namespace").is_none());

        // Last registration wins.
        new_group("scores-registry", 2 << 10, |_: &str| Ok(b"w".to_vec()));
        let replaced = get_group("scores-registry").unwrap();
        assert_eq!(replaced.get("k").unwrap().to_string(), "w");
    }

    #[test]
    #[should_panic(expected = "register_peers called more than once")]
    fn test_register_peers_twice_panics() {
        struct NoPeers;
        impl PeerPicker for NoPeers {
            fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
                None
            }
        }
        let group = new_group("scores-double", 2 << 10, |_: &str| Ok(b"v".to_vec()));
        group.register_peers(Arc::new(NoPeers));
        group.register_peers(Arc::new(NoPeers));
    }

    struct CountingPicker {
        getter: Arc<dyn PeerGetter>,
        picks: AtomicUsize,
    }

    impl PeerPicker for CountingPicker {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            self.picks.fetch_add(1, Ordering::SeqCst);
            Some(Arc::clone(&self.getter))
        }
    }

    #[test]
    fn test_peer_failure_falls_back_to_loader_and_caches() {
        struct FailingGetter;
        impl PeerGetter for FailingGetter {
            fn get(&self, _group: &str, _key: &str) -> Result<Vec<u8>> {
                Err(Error::Peer("connection refused".to_string()))
            }
        }

        let loads = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&loads);
        let group = new_group("scores-fallback", 2 << 10, move |_: &str| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(b"630".to_vec())
        });
        let picker = Arc::new(CountingPicker {
            getter: Arc::new(FailingGetter),
            picks: AtomicUsize::new(0),
        });
        group.register_peers(Arc::clone(&picker) as Arc<dyn PeerPicker>);

        assert_eq!(group.get("Tom").unwrap().to_string(), "630");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(picker.picks.load(Ordering::SeqCst), 1);

        // Loader-sourced values land in the local cache, so the next get
        // never reaches the picker.
        assert_eq!(group.get("Tom").unwrap().to_string(), "630");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(picker.picks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_peer_value_not_cached_locally() {
        struct StaticGetter {
            hits: AtomicUsize,
        }
        impl PeerGetter for StaticGetter {
            fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
                assert_eq!(group, "scores-remote");
                assert_eq!(key, "Tom");
                self.hits.fetch_add(1, Ordering::SeqCst);
                Ok(b"630".to_vec())
            }
        }

        let group = new_group("scores-remote", 2 << 10, |key: &str| -> anyhow::Result<Vec<u8>> {
            Err(anyhow!("loader must not run for {key}"))
        });
        let getter = Arc::new(StaticGetter {
            hits: AtomicUsize::new(0),
        });
        let picker = Arc::new(CountingPicker {
            getter: Arc::clone(&getter) as Arc<dyn PeerGetter>,
            picks: AtomicUsize::new(0),
        });
        group.register_peers(Arc::clone(&picker) as Arc<dyn PeerPicker>);

        assert_eq!(group.get("Tom").unwrap().to_string(), "630");
        // The owning peer keeps the only cached copy: a second get consults
        // it again instead of a local entry.
        assert_eq!(group.get("Tom").unwrap().to_string(), "630");
        assert_eq!(getter.hits.load(Ordering::SeqCst), 2);
        assert_eq!(picker.picks.load(Ordering::SeqCst), 2);
    }
}
