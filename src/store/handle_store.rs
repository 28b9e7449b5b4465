//! Generic handle → entity slot table

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use slab::Slab;

use crate::error::{DynvarError, Result};
use crate::value::HANDLE_MASK;

/// Live contents of a store. Swapped out wholesale during loads.
#[derive(Debug)]
struct Slots<T> {
    /// Owned entities
    entities: Slab<T>,
    /// Handle → slab key
    index: BTreeMap<u32, usize>,
    /// Reusable handles below `next_id`, as disjoint `start → end` spans
    free: BTreeMap<u32, u32>,
    /// Lowest handle never handed out
    next_id: u32,
    /// Handles collected by the next cleanup sweep once unreferenced
    temporaries: BTreeSet<u32>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entities: Slab::new(),
            index: BTreeMap::new(),
            free: BTreeMap::new(),
            next_id: 1,
            temporaries: BTreeSet::new(),
        }
    }
}

/// Maps opaque handles to heap-owned entities
#[derive(Debug)]
pub struct HandleStore<T> {
    live: Slots<T>,
    /// State set aside by `snapshot_for_load`
    saved: Option<Slots<T>>,
    /// Most recent successful lookup: (handle, slab key)
    cache: Cell<Option<(u32, usize)>>,
}

impl<T> Default for HandleStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleStore<T> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            live: Slots::default(),
            saved: None,
            cache: Cell::new(None),
        }
    }

    /// Reserve the smallest handle not currently in use
    pub fn allocate(&mut self) -> Result<u32> {
        if let Some((start, end)) = self.live.free.pop_first() {
            if start + 1 < end {
                self.live.free.insert(start + 1, end);
            }
            return Ok(start);
        }
        let id = self.live.next_id;
        if id > HANDLE_MASK {
            return Err(DynvarError::Exhausted);
        }
        self.live.next_id += 1;
        Ok(id)
    }

    /// Bind `entity` to `handle`, replacing whatever was there. Handle 0,
    /// after masking the reserved bits, is rejected.
    pub fn insert(&mut self, handle: u32, entity: T) -> Result<()> {
        let masked = handle & HANDLE_MASK;
        if masked == 0 {
            return Err(DynvarError::InvalidHandle(handle));
        }
        let handle = masked;

        let key = match self.live.index.get(&handle) {
            Some(&key) => {
                self.live.entities[key] = entity;
                key
            }
            None => {
                let key = self.live.entities.insert(entity);
                self.live.index.insert(handle, key);
                key
            }
        };

        self.claim(handle);
        if handle >= self.live.next_id {
            // ids skipped over become reusable
            if self.live.next_id < handle {
                self.live.free.insert(self.live.next_id, handle);
            }
            self.live.next_id = handle + 1;
        }
        self.cache.set(Some((handle, key)));
        Ok(())
    }

    /// Take `handle` out of the free spans
    fn claim(&mut self, handle: u32) {
        let Some((&start, &end)) = self.live.free.range(..=handle).next_back() else {
            return;
        };
        if handle >= end {
            return;
        }
        self.live.free.remove(&start);
        if start < handle {
            self.live.free.insert(start, handle);
        }
        if handle + 1 < end {
            self.live.free.insert(handle + 1, end);
        }
    }

    fn key_of(&self, handle: u32) -> Option<usize> {
        let handle = handle & HANDLE_MASK;
        if handle == 0 {
            return None;
        }
        if let Some((cached, key)) = self.cache.get() {
            if cached == handle {
                return Some(key);
            }
        }
        let key = *self.live.index.get(&handle)?;
        self.cache.set(Some((handle, key)));
        Some(key)
    }

    /// Look up an entity
    pub fn get(&self, handle: u32) -> Option<&T> {
        let key = self.key_of(handle)?;
        self.live.entities.get(key)
    }

    /// Look up an entity for mutation
    pub fn get_mut(&mut self, handle: u32) -> Option<&mut T> {
        let key = self.key_of(handle)?;
        self.live.entities.get_mut(key)
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.key_of(handle).is_some()
    }

    /// Drop the entity behind `handle` and recycle the handle
    pub fn erase(&mut self, handle: u32) -> Option<T> {
        let handle = handle & HANDLE_MASK;
        let key = self.live.index.remove(&handle)?;
        let entity = self.live.entities.remove(key);

        self.live.temporaries.remove(&handle);
        if matches!(self.cache.get(), Some((cached, _)) if cached == handle) {
            self.cache.set(None);
        }
        self.live.free.insert(handle, handle + 1);
        Some(entity)
    }

    /// Flag or unflag an entity for automatic collection
    pub fn mark_temporary(&mut self, handle: u32, temporary: bool) {
        let handle = handle & HANDLE_MASK;
        if !self.live.index.contains_key(&handle) {
            return;
        }
        if temporary {
            self.live.temporaries.insert(handle);
        } else {
            self.live.temporaries.remove(&handle);
        }
    }

    pub fn is_temporary(&self, handle: u32) -> bool {
        self.live.temporaries.contains(&(handle & HANDLE_MASK))
    }

    /// Handles currently flagged temporary, ascending
    pub fn temporaries(&self) -> Vec<u32> {
        self.live.temporaries.iter().copied().collect()
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.live.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.index.is_empty()
    }

    /// Live handles in ascending order
    pub fn handles(&self) -> Vec<u32> {
        self.live.index.keys().copied().collect()
    }

    /// Iterate over `(handle, entity)` pairs in handle order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.live
            .index
            .iter()
            .map(move |(&handle, &key)| (handle, &self.live.entities[key]))
    }

    /// Drop every entity and forget any pending load snapshot
    pub fn reset(&mut self) {
        self.live = Slots::default();
        self.saved = None;
        self.cache.set(None);
    }

    /// Set the live state aside before a load attempt. The store is empty
    /// afterwards and is filled by the loader.
    pub fn snapshot_for_load(&mut self) {
        let live = mem::take(&mut self.live);
        if self.saved.is_none() {
            self.saved = Some(live);
        }
        self.cache.set(None);
    }

    /// Finish a load attempt. On failure everything created since the
    /// snapshot is discarded and the set-aside state comes back verbatim.
    pub fn commit_load(&mut self, success: bool) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        if !success {
            self.live = saved;
            self.cache.set(None);
        }
    }

    /// Whether a load snapshot is pending
    pub fn is_loading(&self) -> bool {
        self.saved.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(values: &[&str]) -> HandleStore<String> {
        let mut store = HandleStore::new();
        for v in values {
            let id = store.allocate().unwrap();
            store.insert(id, v.to_string()).unwrap();
        }
        store
    }

    #[test]
    fn test_allocate_never_returns_zero() {
        let mut store: HandleStore<u8> = HandleStore::new();
        assert_eq!(store.allocate().unwrap(), 1);
        assert_eq!(store.allocate().unwrap(), 2);
    }

    #[test]
    fn test_handle_zero_not_found() {
        let store = store_with(&["a"]);
        assert!(store.get(0).is_none());
        assert!(!store.contains(0));
    }

    #[test]
    fn test_reuses_smallest_free_handle() {
        let mut store = store_with(&["a", "b", "c", "d"]);
        store.erase(3);
        store.erase(2);
        assert_eq!(store.allocate().unwrap(), 2);
        assert_eq!(store.allocate().unwrap(), 3);
        assert_eq!(store.allocate().unwrap(), 5);
    }

    #[test]
    fn test_reserved_bits_are_masked() {
        let store = store_with(&["a"]);
        assert_eq!(store.get(0x1000_0001).map(String::as_str), Some("a"));
    }

    #[test]
    fn test_insert_beyond_high_water_frees_gap() {
        let mut store: HandleStore<u8> = HandleStore::new();
        store.insert(4, 40).unwrap();
        assert_eq!(store.allocate().unwrap(), 1);
        assert_eq!(store.allocate().unwrap(), 2);
        assert_eq!(store.allocate().unwrap(), 3);
        assert_eq!(store.allocate().unwrap(), 5);
    }

    #[test]
    fn test_insert_inside_gap() {
        let mut store: HandleStore<u8> = HandleStore::new();
        store.insert(HANDLE_MASK, 1).unwrap();
        store.insert(2, 2).unwrap();
        assert_eq!(store.allocate().unwrap(), 1);
        assert_eq!(store.allocate().unwrap(), 3);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_cache_invalidated_on_erase() {
        let mut store = store_with(&["a", "b"]);
        assert_eq!(store.get(2).map(String::as_str), Some("b"));
        store.erase(2);
        assert!(store.get(2).is_none());
        // slab slot of "b" is reused by a different handle
        store.insert(7, "z".to_string()).unwrap();
        assert!(store.get(2).is_none());
        assert_eq!(store.get(7).map(String::as_str), Some("z"));
    }

    #[test]
    fn test_erase_clears_temporary_flag() {
        let mut store = store_with(&["a"]);
        store.mark_temporary(1, true);
        assert!(store.is_temporary(1));
        store.erase(1);
        assert!(!store.is_temporary(1));
        assert!(store.temporaries().is_empty());
    }

    #[test]
    fn test_failed_load_restores_state() {
        let mut store = store_with(&["a", "b"]);
        store.mark_temporary(2, true);

        store.snapshot_for_load();
        assert!(store.is_empty());
        store.insert(1, "loaded".to_string()).unwrap();
        store.insert(9, "partial".to_string()).unwrap();
        store.commit_load(false);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).map(String::as_str), Some("a"));
        assert!(store.get(9).is_none());
        assert!(store.is_temporary(2));
        assert!(!store.is_loading());
    }

    #[test]
    fn test_successful_load_discards_snapshot() {
        let mut store = store_with(&["a", "b"]);
        store.snapshot_for_load();
        store.insert(5, "loaded".to_string()).unwrap();
        store.commit_load(true);

        assert_eq!(store.handles(), vec![5]);
        assert_eq!(store.allocate().unwrap(), 1);
    }

    #[test]
    fn test_handle_zero_cannot_be_bound() {
        let mut store: HandleStore<u8> = HandleStore::new();
        assert!(matches!(store.insert(0, 1), Err(DynvarError::InvalidHandle(0))));
        assert!(matches!(
            store.insert(0x1000_0000, 1),
            Err(DynvarError::InvalidHandle(0x1000_0000))
        ));
        assert!(store.is_empty());
        assert_eq!(store.allocate().unwrap(), 1);
    }

    #[test]
    fn test_allocate_fails_when_handles_run_out() {
        let mut store: HandleStore<u8> = HandleStore::new();
        store.insert(HANDLE_MASK, 1).unwrap();
        // fill the gap below the top handle
        store.live.free.clear();
        assert!(matches!(store.allocate(), Err(DynvarError::Exhausted)));

        store.erase(HANDLE_MASK);
        assert_eq!(store.allocate().unwrap(), HANDLE_MASK);
    }

    #[test]
    fn test_iter_in_handle_order() {
        let mut store: HandleStore<u8> = HandleStore::new();
        store.insert(3, 30).unwrap();
        store.insert(1, 10).unwrap();
        let pairs: Vec<_> = store.iter().map(|(h, v)| (h, *v)).collect();
        assert_eq!(pairs, vec![(1, 10), (3, 30)]);
    }
}
