// PeerCache
//
// A distributed read-through cache written in Rust.
//
// PeerCache keeps hot values in a byte-budgeted in-memory LRU per namespace
// and spreads the key space across a cluster with consistent hashing:
// - **Groups**: named cache scopes, each with its own loader and storage
// - **Byte-cost LRU**: eviction accounted in bytes, not entry counts
// - **Consistent-hash ring**: each key has exactly one owning peer
// - **Single-flight loads**: concurrent misses for a key fetch once
// - **HTTP peer pool**: the wire between nodes, pluggable behind traits
//
// Quick Start
//
// ```rust,no_run
// use peercache::{new_group, HttpPool};
// use std::sync::Arc;
//
// # fn main() -> anyhow::Result<()> {
// // A namespace backed by a slow data source
// let group = new_group("scores", 2 << 10, |key: &str| {
//     slow_db_lookup(key)
// });
//
// // Wire this node into the cluster
// let pool = Arc::new(HttpPool::new("http://10.0.0.1:8001"));
// pool.set_peers(["http://10.0.0.1:8001", "http://10.0.0.2:8001"]);
// group.register_peers(pool.clone());
//
// // Cached locally, fetched from the owning peer, or loaded
// let value = group.get("Tom")?;
// # Ok(())
// # }
// ```

// Re-export main types
pub use byte_view::ByteView;
pub use cache::lru::{ByteCost, EvictionHook, LruStore};
pub use error::{Error, Result};
pub use group::{Group, Loader, get_group, new_group};
pub use http::{HttpGetter, HttpPool, HttpPoolOptions};
pub use peers::{PeerGetter, PeerPicker};
pub use ring::HashRing;
pub use singleflight::SingleFlight;

// Core modules
pub mod byte_view;
pub mod error;
pub mod group;
pub mod http;
pub mod peers;
pub mod ring;
pub mod singleflight;

// Internal modules
pub(crate) mod cache;
