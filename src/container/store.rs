//! The array variable store
//!
//! [`ArrayStore`] is the surface scripts and plugins use: every operation
//! takes array ids and keys, locks the store once, and leaves the table in a
//! consistent state whether it succeeds or fails.
//!
//! Lifetime is tracked by explicit references. Storing an array id in
//! another array's element, or assigning it to a script variable through
//! [`ArrayStore::assign_reference`], records the referencing module on the
//! target. Arrays flagged temporary are collected by [`ArrayStore::clean`]
//! once nothing refers to them.

use std::cmp::Ordering;
use std::fmt::Write as _;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::array::{ArrayKind, ArrayVar};
use crate::error::{DynvarError, Result};
use crate::store::HandleStore;
use crate::value::{ArrayId, Element, Key, KeyType};

pub(crate) type ArrayTable = HandleStore<ArrayVar>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Built-in element comparisons for sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Natural value ordering
    #[default]
    Default,
    /// Case-insensitive ordering of the string renderings
    Alpha,
}

/// Collection state of a stored array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayState {
    /// Referenced, or not flagged for collection
    Live,
    /// Temporary with no references; the next `clean` erases it
    PendingCollection,
}

fn retain(table: &mut ArrayTable, target: ArrayId, module: u8) {
    if let Some(arr) = table.get_mut(target) {
        arr.add_ref(module);
    }
}

fn release(table: &mut ArrayTable, target: ArrayId, module: u8) {
    if let Some(arr) = table.get_mut(target) {
        arr.remove_ref(module);
    }
}

fn release_all(table: &mut ArrayTable, elements: Vec<Element>, module: u8) {
    for element in elements {
        if let Element::Array(target) = element {
            release(table, target, module);
        }
    }
}

fn require_target(table: &ArrayTable, value: &Element) -> Result<()> {
    match value {
        Element::Array(target) if *target != 0 && !table.contains(*target) => {
            Err(DynvarError::NotFound(*target))
        }
        _ => Ok(()),
    }
}

/// Erase an array and drop the references its elements held
fn destroy(table: &mut ArrayTable, id: ArrayId) -> bool {
    let Some(mut arr) = table.erase(id) else {
        return false;
    };
    let owner = arr.owner();
    let held = arr.backend_mut().clear();
    release_all(table, held, owner);
    true
}

/// Insert a fully built array and register references from its elements
fn install(table: &mut ArrayTable, arr: ArrayVar) -> Result<ArrayId> {
    let owner = arr.owner();
    let children = arr.child_arrays();
    let id = table.allocate()?;
    table.insert(id, arr)?;
    for child in children {
        retain(table, child, owner);
    }
    Ok(id)
}

fn copy_array(table: &mut ArrayTable, source: ArrayId, owner: u8, deep: bool) -> Result<ArrayId> {
    let src = table.get(source).ok_or(DynvarError::NotFound(source))?;
    let mut copy = ArrayVar::new(src.key_type(), src.is_packed(), owner)?;

    for (key, value) in src.entries() {
        let value = match value {
            Element::Array(child) if deep && table.contains(child) => {
                // no cycle detection: self-referencing graphs recurse forever
                let nested = copy_array(table, child, owner, true)?;
                table.mark_temporary(nested, true);
                Element::Array(nested)
            }
            other => other,
        };
        copy.set(key, value)?;
    }

    install(table, copy)
}

fn sort_entries<F>(entries: &mut [(Key, Element)], order: SortOrder, mut compare: F)
where
    F: FnMut(&Element, &Element) -> Ordering,
{
    // `sort_by` is stable, so ties keep source order in both directions
    match order {
        SortOrder::Ascending => entries.sort_by(|a, b| compare(&a.1, &b.1)),
        SortOrder::Descending => entries.sort_by(|a, b| compare(&a.1, &b.1).reverse()),
    }
}

/// Store of every array variable in a session
#[derive(Debug, Default)]
pub struct ArrayStore {
    table: Mutex<ArrayTable>,
}

impl ArrayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ArrayTable> {
        self.table.lock()
    }

    /// Create an empty array
    pub fn create(&self, key_type: KeyType, packed: bool, owner: u8) -> Result<ArrayId> {
        let arr = ArrayVar::new(key_type, packed, owner)?;
        let mut table = self.lock();
        let id = table.allocate()?;
        table.insert(id, arr)?;
        debug!(id, %key_type, packed, owner, "created array");
        Ok(id)
    }

    /// Create a packed array holding `values` in order
    pub fn create_list(&self, values: Vec<Element>, owner: u8) -> Result<ArrayId> {
        let mut arr = ArrayVar::new(KeyType::Number, true, owner)?;
        for (i, value) in values.into_iter().enumerate() {
            arr.set(Key::from(i), value)?;
        }
        let mut table = self.lock();
        install(&mut table, arr)
    }

    /// Create a map from `(key, value)` pairs. The first key decides whether
    /// the map is number- or string-keyed; an empty map is number-keyed.
    pub fn create_map(&self, pairs: Vec<(Key, Element)>, owner: u8) -> Result<ArrayId> {
        let key_type = pairs
            .first()
            .map(|(k, _)| k.key_type())
            .unwrap_or(KeyType::Number);
        let mut arr = ArrayVar::new(key_type, false, owner)?;
        for (key, value) in pairs {
            arr.set(key, value)?;
        }
        let mut table = self.lock();
        install(&mut table, arr)
    }

    /// Duplicate an array. A shallow copy shares nested arrays; a deep copy
    /// duplicates them too, flagging each nested copy temporary so it dies
    /// with its parent.
    pub fn copy(&self, source: ArrayId, owner: u8, deep: bool) -> Result<ArrayId> {
        let mut table = self.lock();
        let id = copy_array(&mut table, source, owner, deep)?;
        debug!(source, id, deep, "copied array");
        Ok(id)
    }

    /// Copy the elements with keys in `[lo, hi)` into a new array. Packed
    /// slices are re-indexed from zero.
    pub fn slice(&self, source: ArrayId, lo: &Key, hi: &Key) -> Result<ArrayId> {
        let mut table = self.lock();
        let src = table.get(source).ok_or(DynvarError::NotFound(source))?;
        src.check_key(lo)?;
        src.check_key(hi)?;

        let entries = src.backend().range(lo, hi)?;
        let mut slice = ArrayVar::new(src.key_type(), src.is_packed(), src.owner())?;
        let packed = slice.is_packed();
        for (i, (key, value)) in entries.into_iter().enumerate() {
            let key = if packed { Key::from(i) } else { key };
            slice.set(key, value)?;
        }
        install(&mut table, slice)
    }

    /// Elements of `id` ordered by value with a built-in comparison
    pub fn sorted_entries(&self, id: ArrayId, order: SortOrder, mode: SortMode) -> Result<Vec<(Key, Element)>> {
        match mode {
            SortMode::Default => self.sorted_entries_by(id, order, Element::compare),
            SortMode::Alpha => self.sorted_entries_by(id, order, Element::compare_alpha),
        }
    }

    /// Elements of `id` ordered by a caller-supplied comparison. The store
    /// is not locked while `compare` runs.
    pub fn sorted_entries_by<F>(&self, id: ArrayId, order: SortOrder, compare: F) -> Result<Vec<(Key, Element)>>
    where
        F: FnMut(&Element, &Element) -> Ordering,
    {
        let mut entries = {
            let table = self.lock();
            table.get(id).ok_or(DynvarError::NotFound(id))?.entries()
        };
        sort_entries(&mut entries, order, compare);
        Ok(entries)
    }

    /// New packed array with the values of `id` in sorted order
    pub fn sort(&self, id: ArrayId, order: SortOrder, mode: SortMode) -> Result<ArrayId> {
        match mode {
            SortMode::Default => self.sort_by(id, order, Element::compare),
            SortMode::Alpha => self.sort_by(id, order, Element::compare_alpha),
        }
    }

    /// Like [`ArrayStore::sort`] with a caller-supplied comparison
    pub fn sort_by<F>(&self, id: ArrayId, order: SortOrder, compare: F) -> Result<ArrayId>
    where
        F: FnMut(&Element, &Element) -> Ordering,
    {
        let owner = self.owner(id).ok_or(DynvarError::NotFound(id))?;
        let sorted = self.sorted_entries_by(id, order, compare)?;
        self.create_list(sorted.into_iter().map(|(_, e)| e).collect(), owner)
    }

    /// First key, in traversal order, whose element equals `target`.
    /// `range` limits the scan to keys in `[lo, hi)`.
    pub fn find(&self, id: ArrayId, target: &Element, range: Option<(&Key, &Key)>) -> Result<Option<Key>> {
        let table = self.lock();
        let arr = table.get(id).ok_or(DynvarError::NotFound(id))?;
        let found = match range {
            Some((lo, hi)) => {
                arr.check_key(lo)?;
                arr.check_key(hi)?;
                arr.backend()
                    .range(lo, hi)?
                    .into_iter()
                    .find(|(_, e)| e == target)
                    .map(|(k, _)| k)
            }
            None => arr.backend().iter().find(|(_, e)| *e == target).map(|(k, _)| k),
        };
        Ok(found)
    }

    pub fn get_element(&self, id: ArrayId, key: &Key) -> Option<Element> {
        self.lock().get(id)?.get(key).cloned()
    }

    pub fn get_number(&self, id: ArrayId, key: &Key) -> Option<f64> {
        self.get_element(id, key)?.as_number()
    }

    pub fn get_string(&self, id: ArrayId, key: &Key) -> Option<String> {
        match self.get_element(id, key)? {
            Element::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_form(&self, id: ArrayId, key: &Key) -> Option<u32> {
        self.get_element(id, key)?.as_form()
    }

    pub fn get_array(&self, id: ArrayId, key: &Key) -> Option<ArrayId> {
        self.get_element(id, key)?.as_array()
    }

    pub fn get_bool(&self, id: ArrayId, key: &Key) -> Option<bool> {
        Some(self.get_element(id, key)?.is_truthy())
    }

    /// Store `value` under `key`. Array values gain a reference from the
    /// holding array's owner; the replaced value loses one.
    pub fn set_element(&self, id: ArrayId, key: Key, value: Element) -> Result<()> {
        let mut table = self.lock();
        require_target(&table, &value)?;

        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        let owner = arr.owner();
        let added = value.as_array();
        let replaced = arr.set(key, value)?;

        if let Some(target) = added {
            retain(&mut table, target, owner);
        }
        if let Some(old) = replaced {
            release_all(&mut table, vec![old], owner);
        }
        Ok(())
    }

    pub fn set_number(&self, id: ArrayId, key: Key, value: f64) -> Result<()> {
        self.set_element(id, key, Element::Number(value))
    }

    pub fn set_string(&self, id: ArrayId, key: Key, value: &str) -> Result<()> {
        self.set_element(id, key, Element::from(value))
    }

    pub fn set_form(&self, id: ArrayId, key: Key, value: u32) -> Result<()> {
        self.set_element(id, key, Element::Form(value))
    }

    pub fn set_array(&self, id: ArrayId, key: Key, value: ArrayId) -> Result<()> {
        self.set_element(id, key, Element::Array(value))
    }

    /// Append to a packed array
    pub fn append(&self, id: ArrayId, value: Element) -> Result<()> {
        let mut table = self.lock();
        require_target(&table, &value)?;
        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        if !arr.is_packed() {
            return Err(DynvarError::TypeMismatch("append requires a packed array".to_string()));
        }
        let owner = arr.owner();
        let added = value.as_array();
        let len = arr.len();
        arr.backend_mut().insert(len, vec![value])?;
        if let Some(target) = added {
            retain(&mut table, target, owner);
        }
        Ok(())
    }

    /// Insert `value` before `index` in a packed array
    pub fn insert(&self, id: ArrayId, index: usize, value: Element) -> Result<()> {
        let mut table = self.lock();
        require_target(&table, &value)?;
        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        let owner = arr.owner();
        let added = value.as_array();
        arr.backend_mut().insert(index, vec![value])?;
        if let Some(target) = added {
            retain(&mut table, target, owner);
        }
        Ok(())
    }

    /// Insert every value of `source` before `index` in a packed array
    pub fn insert_range(&self, id: ArrayId, index: usize, source: ArrayId) -> Result<()> {
        let mut table = self.lock();
        let values: Vec<Element> = table
            .get(source)
            .ok_or(DynvarError::NotFound(source))?
            .entries()
            .into_iter()
            .map(|(_, e)| e)
            .collect();

        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        let owner = arr.owner();
        let added: Vec<ArrayId> = values.iter().filter_map(Element::as_array).collect();
        arr.backend_mut().insert(index, values)?;
        for target in added {
            retain(&mut table, target, owner);
        }
        Ok(())
    }

    /// Truncate or pad a packed array to `len` elements
    pub fn resize(&self, id: ArrayId, len: usize, pad: Element) -> Result<()> {
        let mut table = self.lock();
        require_target(&table, &pad)?;
        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        let owner = arr.owner();
        let grown = len.saturating_sub(arr.len());
        let added = pad.as_array();
        let removed = arr.backend_mut().resize(len, pad)?;

        release_all(&mut table, removed, owner);
        if let Some(target) = added {
            for _ in 0..grown {
                retain(&mut table, target, owner);
            }
        }
        Ok(())
    }

    /// Remove one element. Returns whether anything was removed; erasing
    /// past the end of a packed array is a range error.
    pub fn erase_element(&self, id: ArrayId, key: &Key) -> Result<bool> {
        let mut table = self.lock();
        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        let owner = arr.owner();
        let removed = arr.erase(key)?;
        let erased = removed.is_some();
        release_all(&mut table, removed.into_iter().collect(), owner);
        Ok(erased)
    }

    /// Remove the elements with keys in `[lo, hi]`, returning how many
    pub fn erase_elements(&self, id: ArrayId, lo: &Key, hi: &Key) -> Result<usize> {
        let mut table = self.lock();
        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        arr.check_key(lo)?;
        arr.check_key(hi)?;
        let owner = arr.owner();

        let removed = if arr.is_packed() {
            arr.backend_mut().erase_range(lo, hi)?
        } else if lo > hi {
            Vec::new()
        } else {
            let keys: Vec<Key> = arr
                .backend()
                .iter()
                .map(|(k, _)| k)
                .filter(|k| k >= lo && k <= hi)
                .collect();
            let mut removed = Vec::with_capacity(keys.len());
            for key in &keys {
                removed.extend(arr.backend_mut().erase(key)?);
            }
            removed
        };

        let count = removed.len();
        release_all(&mut table, removed, owner);
        Ok(count)
    }

    /// Remove every element, returning how many
    pub fn erase_all(&self, id: ArrayId) -> Result<usize> {
        let mut table = self.lock();
        let arr = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        let owner = arr.owner();
        let removed = arr.backend_mut().clear();
        let count = removed.len();
        release_all(&mut table, removed, owner);
        Ok(count)
    }

    /// Erase an array outright, whatever its references
    pub fn erase(&self, id: ArrayId) -> bool {
        let erased = destroy(&mut self.lock(), id);
        if erased {
            debug!(id, "erased array");
        }
        erased
    }

    /// Record a reference to `target` held by `module`
    pub fn add_reference(&self, target: ArrayId, module: u8) -> Result<()> {
        let mut table = self.lock();
        let arr = table.get_mut(target).ok_or(DynvarError::NotFound(target))?;
        arr.add_ref(module);
        Ok(())
    }

    /// Drop one reference to `target` held by `module`
    pub fn remove_reference(&self, target: ArrayId, module: u8) -> Result<bool> {
        let mut table = self.lock();
        let arr = table.get_mut(target).ok_or(DynvarError::NotFound(target))?;
        Ok(arr.remove_ref(module))
    }

    /// Point a script variable at `target`, moving the reference `slot`
    /// held on its previous array. A `target` of 0 clears the slot.
    pub fn assign_reference(&self, slot: &mut ArrayId, target: ArrayId, module: u8) -> Result<()> {
        let mut table = self.lock();
        if target != 0 && !table.contains(target) {
            return Err(DynvarError::NotFound(target));
        }
        if *slot == target {
            return Ok(());
        }
        if *slot != 0 {
            release(&mut table, *slot, module);
        }
        *slot = target;
        if target != 0 {
            retain(&mut table, target, module);
        }
        Ok(())
    }

    pub fn mark_temporary(&self, id: ArrayId, temporary: bool) {
        self.lock().mark_temporary(id, temporary);
    }

    pub fn is_temporary(&self, id: ArrayId) -> bool {
        self.lock().is_temporary(id)
    }

    pub fn state(&self, id: ArrayId) -> Option<ArrayState> {
        let table = self.lock();
        let arr = table.get(id)?;
        if table.is_temporary(id) && arr.ref_count() == 0 {
            Some(ArrayState::PendingCollection)
        } else {
            Some(ArrayState::Live)
        }
    }

    /// Erase every temporary array nothing refers to. Runs once per tick;
    /// arrays orphaned by this sweep are collected by the next one.
    pub fn clean(&self) -> usize {
        let mut table = self.lock();
        let pending: Vec<ArrayId> = table
            .temporaries()
            .into_iter()
            .filter(|&id| table.get(id).is_some_and(|arr| arr.ref_count() == 0))
            .collect();
        for &id in &pending {
            destroy(&mut table, id);
        }
        if !pending.is_empty() {
            debug!(collected = pending.len(), "cleaned temporary arrays");
        }
        pending.len()
    }

    pub fn exists(&self, id: ArrayId) -> bool {
        self.lock().contains(id)
    }

    /// Number of live arrays
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Live array ids, ascending
    pub fn ids(&self) -> Vec<ArrayId> {
        self.lock().handles()
    }

    pub fn size(&self, id: ArrayId) -> Option<usize> {
        Some(self.lock().get(id)?.len())
    }

    pub fn kind(&self, id: ArrayId) -> Option<ArrayKind> {
        Some(self.lock().get(id)?.kind())
    }

    pub fn key_type(&self, id: ArrayId) -> Option<KeyType> {
        Some(self.lock().get(id)?.key_type())
    }

    pub fn is_packed(&self, id: ArrayId) -> Option<bool> {
        Some(self.lock().get(id)?.is_packed())
    }

    pub fn owner(&self, id: ArrayId) -> Option<u8> {
        Some(self.lock().get(id)?.owner())
    }

    pub fn references(&self, id: ArrayId) -> Option<Vec<u8>> {
        Some(self.lock().get(id)?.references().to_vec())
    }

    pub fn has_key(&self, id: ArrayId, key: &Key) -> bool {
        self.lock().get(id).is_some_and(|arr| arr.get(key).is_some())
    }

    /// Ordered `(key, element)` snapshot of an array
    pub fn entries(&self, id: ArrayId) -> Option<Vec<(Key, Element)>> {
        Some(self.lock().get(id)?.entries())
    }

    /// New packed array holding the keys of `id`
    pub fn keys(&self, id: ArrayId) -> Result<ArrayId> {
        let (owner, keys) = {
            let table = self.lock();
            let arr = table.get(id).ok_or(DynvarError::NotFound(id))?;
            let keys: Vec<Element> = arr
                .backend()
                .iter()
                .map(|(k, _)| match k {
                    Key::Number(n) => Element::Number(n),
                    Key::Text(s) => Element::String(s),
                })
                .collect();
            (arr.owner(), keys)
        };
        self.create_list(keys, owner)
    }

    /// New packed array holding the values of `id` in key order
    pub fn values(&self, id: ArrayId) -> Result<ArrayId> {
        let (owner, values) = {
            let table = self.lock();
            let arr = table.get(id).ok_or(DynvarError::NotFound(id))?;
            (arr.owner(), arr.entries().into_iter().map(|(_, e)| e).collect())
        };
        self.create_list(values, owner)
    }

    pub fn first_key(&self, id: ArrayId) -> Option<Key> {
        self.lock().get(id)?.backend().first_key()
    }

    pub fn last_key(&self, id: ArrayId) -> Option<Key> {
        self.lock().get(id)?.backend().last_key()
    }

    pub fn next_key(&self, id: ArrayId, key: &Key) -> Option<Key> {
        let table = self.lock();
        let arr = table.get(id)?;
        arr.check_key(key).ok()?;
        arr.backend().next_key(key)
    }

    pub fn prev_key(&self, id: ArrayId, key: &Key) -> Option<Key> {
        let table = self.lock();
        let arr = table.get(id)?;
        arr.check_key(key).ok()?;
        arr.backend().prev_key(key)
    }

    /// Multi-line rendering of an array for debugging
    pub fn dump(&self, id: ArrayId) -> Option<String> {
        let table = self.lock();
        let arr = table.get(id)?;
        let refs: Vec<String> = arr.references().iter().map(|m| format!("{:02X}", m)).collect();

        let mut out = format!(
            "Array #{} ({}, owner {:02X}, refs [{}])\n",
            id,
            arr.kind(),
            arr.owner(),
            refs.join(", ")
        );
        for (key, element) in arr.backend().iter() {
            let _ = writeln!(out, "  [{}] : {}", key, element);
        }
        Some(out)
    }

    /// Drop every array (new game)
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Set the live arrays aside before loading a save
    pub fn preload(&self) {
        self.lock().snapshot_for_load();
    }

    /// Keep the loaded arrays, or bring back the set-aside ones on failure
    pub fn postload(&self, success: bool) {
        self.lock().commit_load(success);
    }
}
