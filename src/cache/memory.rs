use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::core::Artifact;

struct Slot {
    artifact: Arc<Artifact>,
    cost: usize,
    last_used: u64,
}

/// Least-recently-used store bounded by item count and total cost.
///
/// `order` maps a monotonically increasing access tick to its key, so the
/// first entry is always the eviction candidate.
pub(crate) struct MemoryTier {
    slots: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    tick: u64,
    total_cost: usize,
    max_items: usize,
    max_cost: usize,
}

impl MemoryTier {
    pub fn new(max_items: usize, max_cost: usize) -> Self {
        Self {
            slots: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
            total_cost: 0,
            max_items,
            max_cost,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Returns the artifact and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<Arc<Artifact>> {
        let tick = self.next_tick();
        let slot = self.slots.get_mut(key)?;
        self.order.remove(&slot.last_used);
        slot.last_used = tick;
        self.order.insert(tick, key.to_string());
        Some(slot.artifact.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Inserts or overwrites `key`, then evicts until under both ceilings.
    ///
    /// Returns the evicted keys. An artifact costlier than the whole tier is
    /// not stored and any previous value under `key` is dropped.
    pub fn insert(&mut self, key: &str, artifact: Arc<Artifact>, cost: usize) -> Vec<String> {
        self.remove(key);
        if cost > self.max_cost {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        while !self.slots.is_empty()
            && (self.slots.len() + 1 > self.max_items || self.total_cost + cost > self.max_cost)
        {
            match self.pop_oldest() {
                Some(key) => evicted.push(key),
                None => break,
            }
        }

        let tick = self.next_tick();
        self.order.insert(tick, key.to_string());
        self.slots.insert(key.to_string(), Slot { artifact, cost, last_used: tick });
        self.total_cost += cost;
        evicted
    }

    fn pop_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        if let Some(slot) = self.slots.remove(&key) {
            self.total_cost -= slot.cost;
        }
        Some(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.order.remove(&slot.last_used);
                self.total_cost -= slot.cost;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        self.total_cost = 0;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }
}
