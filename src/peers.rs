// Peer abstraction layer
//
// The contracts the group coordinator uses to reach remote peers, kept
// separate from any transport so pickers and getters are pluggable.

use crate::error::Result;
use std::sync::Arc;

/// Fetches a value for a key from a remote peer's namespace
pub trait PeerGetter: Send + Sync {
    fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;
}

/// Routes a key to the remote peer that owns it
///
/// Returns `None` when the local node owns the key or no peers are
/// configured. Implementations must never hand back the local node itself:
/// loopback routing would stall the in-flight call for that key forever.
pub trait PeerPicker: Send + Sync {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}
