// Consistent-hash ring with virtual nodes
//
// Maps keys to owning peers. Each real peer is planted on the ring
// `replicas` times so that membership changes only remap O(1/N) of the key
// space. Not internally synchronized: callers either freeze the ring after
// construction or guard it externally (the HTTP pool does the latter).

use std::collections::HashMap;

/// Hash over byte strings, injectable for tests
pub type RingHash = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Virtual-node consistent hash: key -> peer address
pub struct HashRing {
    hash: RingHash,
    replicas: usize,
    positions: Vec<u32>,
    owners: HashMap<u32, String>,
}

impl HashRing {
    /// Create a ring with the given virtual-node multiplier and the default
    /// CRC32 (IEEE) hash
    pub fn new(replicas: usize) -> Self {
        HashRing::with_hash(replicas, Box::new(|data| crc32fast::hash(data)))
    }

    /// Create a ring with a caller-supplied hash function
    pub fn with_hash(replicas: usize, hash: RingHash) -> Self {
        assert!(replicas >= 1, "ring needs at least one virtual node per peer");
        HashRing {
            hash,
            replicas,
            positions: Vec::new(),
            owners: HashMap::new(),
        }
    }

    /// Plant each peer on the ring at `replicas` positions
    ///
    /// Position collisions resolve last-wins; the duplicate position stays in
    /// the sorted list, which is harmless since lookups land on the first.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let position = (self.hash)(format!("{i}{peer}").as_bytes());
                self.positions.push(position);
                self.owners.insert(position, peer.to_string());
            }
        }
        self.positions.sort_unstable();
    }

    /// Owning peer for `key`, or `None` if the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.positions.partition_point(|&p| p < hash);
        let position = self.positions[idx % self.positions.len()];
        self.owners.get(&position).map(String::as_str)
    }

    /// Whether any peer has been added
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
