//! Identity registry
//!
//! Guarantees at most one in-memory [`Document`] per id within a database,
//! so every handle for an id observes the same state and body.
//!
//! Two pools hold strong handles:
//!
//! - **active**: documents in normal use
//! - **cached**: detached documents that may be promoted back to active.
//!   Bounded; when full the oldest entry is dropped (first in, first out).
//!
//! An id is in at most one pool at a time.
//!
//! ## Locking
//!
//! The pools sit behind one `parking_lot::Mutex` (no poisoning). The registry
//! never locks a document while holding its own lock, so callers holding a
//! document lock may call into the registry (lock order: document, then
//! registry).

use crate::document::Document;
use crate::lifecycle::Prior;
use parking_lot::Mutex;
use settee_core::DocId;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct Pools {
    active: HashMap<DocId, Document>,
    cached: HashMap<DocId, Document>,
    /// Insertion order of `cached`, oldest first
    order: VecDeque<DocId>,
}

impl Pools {
    fn take_cached(&mut self, id: &DocId) -> Option<Document> {
        let document = self.cached.remove(id)?;
        self.order.retain(|queued| queued != id);
        Some(document)
    }
}

/// Pool sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Documents in the active pool
    pub active: usize,
    /// Documents in the cached pool
    pub cached: usize,
    /// Bound of the cached pool
    pub capacity: usize,
}

/// Per-database map from id to the one live instance
pub struct IdentityRegistry {
    pools: Mutex<Pools>,
    capacity: usize,
}

impl IdentityRegistry {
    /// Create an empty registry whose cached pool holds at most `capacity`
    pub fn new(capacity: usize) -> Self {
        IdentityRegistry {
            pools: Mutex::new(Pools::default()),
            capacity,
        }
    }

    /// Find the instance for `id` and which pool holds it
    pub fn lookup(&self, id: &DocId) -> (Option<Document>, Prior) {
        let pools = self.pools.lock();
        if let Some(document) = pools.active.get(id) {
            return (Some(document.clone()), Prior::Active);
        }
        if let Some(document) = pools.cached.get(id) {
            return (Some(document.clone()), Prior::Cached);
        }
        (None, Prior::None)
    }

    /// Instance for `id` in either pool
    pub fn resolve(&self, id: &DocId) -> Option<Document> {
        self.lookup(id).0
    }

    /// Put `document` in the active pool under `id`
    ///
    /// Any instance previously tracked for `id` is dropped from the registry.
    pub fn register(&self, id: DocId, document: Document) {
        let mut pools = self.pools.lock();
        pools.take_cached(&id);
        tracing::trace!(target: "settee::registry", id = %id, "registered");
        pools.active.insert(id, document);
    }

    /// Put `document` in the active pool unless `id` is already tracked
    ///
    /// Returns the instance that ends up tracked: `document` itself, or the
    /// one that got there first.
    pub fn register_if_absent(&self, id: DocId, document: Document) -> Document {
        let mut pools = self.pools.lock();
        if let Some(existing) = pools.active.get(&id) {
            return existing.clone();
        }
        if let Some(existing) = pools.cached.get(&id) {
            return existing.clone();
        }
        tracing::trace!(target: "settee::registry", id = %id, "registered");
        pools.active.insert(id, document.clone());
        document
    }

    /// Move `id` from active to cached
    ///
    /// When the cached pool is full the oldest cached entry is dropped.
    pub fn demote(&self, id: &DocId) -> Option<Document> {
        let mut pools = self.pools.lock();
        let document = pools.active.remove(id)?;
        if self.capacity == 0 {
            tracing::debug!(target: "settee::registry", id = %id, "demoted past zero-capacity cache");
            return Some(document);
        }
        while pools.cached.len() >= self.capacity {
            let Some(oldest) = pools.order.pop_front() else {
                break;
            };
            pools.cached.remove(&oldest);
            tracing::debug!(target: "settee::registry", id = %oldest, "dropped from cache");
        }
        pools.cached.insert(id.clone(), document.clone());
        pools.order.push_back(id.clone());
        tracing::debug!(target: "settee::registry", id = %id, "demoted");
        Some(document)
    }

    /// Move `id` from cached back to active
    pub fn promote(&self, id: &DocId) -> Option<Document> {
        let mut pools = self.pools.lock();
        let document = pools.take_cached(id)?;
        pools.active.insert(id.clone(), document.clone());
        tracing::debug!(target: "settee::registry", id = %id, "promoted");
        Some(document)
    }

    /// Promote `id` only while `document` is the instance cached for it
    pub fn promote_instance(&self, id: &DocId, document: &Document) -> bool {
        let mut pools = self.pools.lock();
        match pools.cached.get(id) {
            Some(cached) if cached.ptr_eq(document) => {}
            _ => return false,
        }
        if let Some(document) = pools.take_cached(id) {
            pools.active.insert(id.clone(), document);
        }
        tracing::debug!(target: "settee::registry", id = %id, "promoted");
        true
    }

    /// Remove `id` from both pools
    pub fn evict(&self, id: &DocId) -> Option<Document> {
        let mut pools = self.pools.lock();
        let document = pools
            .active
            .remove(id)
            .or_else(|| pools.take_cached(id));
        if document.is_some() {
            tracing::debug!(target: "settee::registry", id = %id, "evicted");
        }
        document
    }

    /// Check if `id` is in the active pool
    pub fn is_active(&self, id: &DocId) -> bool {
        self.pools.lock().active.contains_key(id)
    }

    /// Check if `id` is in the cached pool
    pub fn is_cached(&self, id: &DocId) -> bool {
        self.pools.lock().cached.contains_key(id)
    }

    /// Current pool sizes
    pub fn stats(&self) -> RegistryStats {
        let pools = self.pools.lock();
        RegistryStats {
            active: pools.active.len(),
            cached: pools.cached.len(),
            capacity: self.capacity,
        }
    }

    /// Bound of the cached pool
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("IdentityRegistry")
            .field("active", &stats.active)
            .field("cached", &stats.cached)
            .field("capacity", &stats.capacity)
            .finish()
    }
}
