// Byte-cost-accounted LRU store
//
// A mapping from string keys to values ordered by recency of last access.
// Capacity is accounted in bytes (`key.len() + value.byte_cost()`), not in
// entry counts. Not internally synchronized; see `ConcurrentCache` for the
// locked wrapper.

use std::collections::HashMap;

/// Capability to report the accounting weight of a cached value, in bytes
pub trait ByteCost {
    fn byte_cost(&self) -> u64;
}

impl ByteCost for String {
    fn byte_cost(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteCost for Vec<u8> {
    fn byte_cost(&self) -> u64 {
        self.len() as u64
    }
}

/// Callback invoked after an entry is removed by capacity pressure
pub type EvictionHook<V> = Box<dyn FnMut(String, V) + Send>;

struct Slot<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// An LRU store bounded by total byte cost
///
/// `max_bytes == 0` disables capacity-based eviction. Both `set` and `get`
/// promote the touched entry to the front of the recency order; evictions
/// always remove the back entry.
pub struct LruStore<V: ByteCost> {
    max_bytes: u64,
    used_bytes: u64,
    slots: Vec<Option<Slot<V>>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evicted: Option<EvictionHook<V>>,
}

impl<V: ByteCost> LruStore<V> {
    /// Create a store bounded to `max_bytes` (0 = unbounded), with an
    /// optional eviction callback
    pub fn new(max_bytes: u64, on_evicted: Option<EvictionHook<V>>) -> Self {
        LruStore {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            on_evicted,
        }
    }

    /// Insert or update a key, then evict from the back until the store fits
    ///
    /// An oversized value may evict everything, including itself.
    pub fn set(&mut self, key: &str, value: V) {
        if let Some(&i) = self.index.get(key) {
            self.detach(i);
            self.attach_front(i);
            let slot = self.slot_mut(i);
            let old_cost = slot.value.byte_cost();
            let new_cost = value.byte_cost();
            slot.value = value;
            self.used_bytes = self.used_bytes - old_cost + new_cost;
        } else {
            let cost = key.len() as u64 + value.byte_cost();
            let slot = Slot {
                key: key.to_string(),
                value,
                prev: None,
                next: None,
            };
            let i = match self.free.pop() {
                Some(i) => {
                    self.slots[i] = Some(slot);
                    i
                }
                None => {
                    self.slots.push(Some(slot));
                    self.slots.len() - 1
                }
            };
            self.attach_front(i);
            self.index.insert(key.to_string(), i);
            self.used_bytes += cost;
        }

        while self.max_bytes > 0 && self.used_bytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    /// Look up a key, promoting it to most-recently-used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let &i = self.index.get(key)?;
        self.detach(i);
        self.attach_front(i);
        Some(&self.slot(i).value)
    }

    /// Remove the least-recently-used entry and fire the eviction callback
    pub fn remove_oldest(&mut self) {
        let Some(i) = self.tail else { return };
        self.detach(i);
        let slot = self.slots[i].take().expect("tail slot occupied");
        self.free.push(i);
        self.index.remove(&slot.key);
        self.used_bytes -= slot.key.len() as u64 + slot.value.byte_cost();
        if let Some(hook) = self.on_evicted.as_mut() {
            hook(slot.key, slot.value);
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total byte cost currently charged to live entries
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    fn slot(&self, i: usize) -> &Slot<V> {
        self.slots[i].as_ref().expect("indexed slot occupied")
    }

    fn slot_mut(&mut self, i: usize) -> &mut Slot<V> {
        self.slots[i].as_mut().expect("indexed slot occupied")
    }

    fn detach(&mut self, i: usize) {
        let (prev, next) = {
            let slot = self.slot_mut(i);
            let links = (slot.prev, slot.next);
            slot.prev = None;
            slot.next = None;
            links
        };
        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slot_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    fn attach_front(&mut self, i: usize) {
        let old_head = self.head;
        {
            let slot = self.slot_mut(i);
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head {
            self.slot_mut(h).prev = Some(i);
        }
        self.head = Some(i);
        if self.tail.is_none() {
            self.tail = Some(i);
        }
    }
}
