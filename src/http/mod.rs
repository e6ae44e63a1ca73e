// HTTP peer transport
//
// One HttpPool per process: it serves this node's share of every group over
// HTTP and, as a PeerPicker, routes keys to the other nodes of the cluster.

pub mod client;

pub use client::HttpGetter;

use crate::group;
use crate::peers::{PeerGetter, PeerPicker};
use crate::ring::HashRing;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Default URL prefix for cache traffic between peers
pub const DEFAULT_BASE_PATH: &str = "/peercache/";

/// Default virtual-node multiplier for the peer ring
pub const DEFAULT_REPLICAS: usize = 50;

/// Tuning knobs for an [`HttpPool`]
#[derive(Debug, Clone)]
pub struct HttpPoolOptions {
    /// URL prefix the pool serves and clients request under
    pub base_path: String,
    /// Virtual nodes per peer on the consistent-hash ring
    pub replicas: usize,
}

impl Default for HttpPoolOptions {
    fn default() -> Self {
        HttpPoolOptions {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
        }
    }
}

struct PoolState {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// HTTP peer pool: serves `GET {base_path}{group}/{key}` and picks owning
/// peers for outbound requests
///
/// Peers are identified by their base address (`scheme://host:port`). The
/// pool refuses to route a key to its own address; such keys belong to the
/// local node and fall through to the group's loader.
pub struct HttpPool {
    self_addr: String,
    base_path: String,
    state: RwLock<PoolState>,
}

impl HttpPool {
    /// Create a pool for the node reachable at `self_addr`
    pub fn new(self_addr: &str) -> Self {
        HttpPool::with_options(self_addr, HttpPoolOptions::default())
    }

    /// Create a pool with custom options
    pub fn with_options(self_addr: &str, options: HttpPoolOptions) -> Self {
        HttpPool {
            self_addr: self_addr.to_string(),
            base_path: options.base_path,
            state: RwLock::new(PoolState {
                ring: HashRing::new(options.replicas),
                getters: HashMap::new(),
            }),
        }
    }

    /// Register cluster members (the local address included)
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write();
        for peer in peers {
            let peer = peer.as_ref();
            state.ring.add([peer]);
            state.getters.insert(
                peer.to_string(),
                Arc::new(HttpGetter::new(format!("{}{}", peer, self.base_path))),
            );
        }
    }

    /// Build the router serving this pool's share of every registered group
    pub fn router(self: Arc<Self>) -> Router {
        let route = format!("{}{{group}}/{{key}}", self.base_path);
        Router::new()
            .route(&route, get(serve_entry))
            .fallback(bad_request)
            .with_state(self)
    }

    /// Serve cache traffic on `listener` until the task is dropped
    pub async fn serve(self: Arc<Self>, listener: tokio::net::TcpListener) -> std::io::Result<()> {
        info!(addr = %self.self_addr, base_path = %self.base_path, "cache pool listening");
        let router = Arc::clone(&self).router();
        axum::serve(listener, router).await
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let peer = state.ring.get(key)?;
        if peer == self.self_addr {
            return None;
        }
        debug!(server = %self.self_addr, peer, key, "picked remote peer");
        let getter = state.getters.get(peer).cloned()?;
        Some(getter as Arc<dyn PeerGetter>)
    }
}

async fn serve_entry(
    State(pool): State<Arc<HttpPool>>,
    Path((group_name, key)): Path<(String, String)>,
) -> Response {
    debug!(server = %pool.self_addr, group = %group_name, key = %key, "serving cache request");

    let Some(group) = group::get_group(&group_name) else {
        return (
            StatusCode::NOT_FOUND,
            format!("no such group: {group_name}"),
        )
            .into_response();
    };

    // Group::get blocks (loader I/O, in-flight latches), so it runs off the
    // async workers.
    let outcome = tokio::task::spawn_blocking(move || group.get(&key)).await;
    match outcome {
        Ok(Ok(view)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            view.to_vec(),
        )
            .into_response(),
        Ok(Err(err)) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("cache task failed: {err}"),
        )
            .into_response(),
    }
}

async fn bad_request() -> Response {
    (StatusCode::BAD_REQUEST, "bad request").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_refuses_self() {
        let addr = "http://10.0.0.1:8001";
        let pool = Arc::new(HttpPool::new(addr));
        pool.set_peers([addr]);
        // Every key maps to the only peer, which is the local node.
        for i in 0..50 {
            assert!(pool.pick_peer(&format!("key-{i}")).is_none());
        }
    }

    #[test]
    fn test_pool_with_no_peers_picks_nothing() {
        let pool = Arc::new(HttpPool::new("http://10.0.0.1:8001"));
        assert!(pool.pick_peer("Tom").is_none());
    }

    #[test]
    fn test_pool_routes_remote_keys_only() {
        let this = "http://10.0.0.1:8001";
        let pool = Arc::new(HttpPool::new(this));
        pool.set_peers([this, "http://10.0.0.2:8001", "http://10.0.0.3:8001"]);

        let mut local = 0;
        let mut remote = 0;
        for i in 0..300 {
            match pool.pick_peer(&format!("key-{i}")) {
                Some(_) => remote += 1,
                None => local += 1,
            }
        }
        // With three evenly weighted peers both outcomes must occur.
        assert!(local > 0, "no key hashed to the local node");
        assert!(remote > 0, "no key hashed to a remote node");
    }
}
