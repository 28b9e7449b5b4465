//! String variables
//!
//! Scripts keep strings in a store parallel to the array store: same
//! handles, same temporary tracking, same load snapshot. String variables
//! carry no reference list; a temporary string lives until the next sweep
//! unless a script variable claims it first.

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{DynvarError, Result};
use crate::store::HandleStore;
use crate::value::{check_text_len, StringId};

/// A string variable and the module that created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringVar {
    pub data: String,
    pub owner: u8,
}

impl StringVar {
    pub fn new(data: impl Into<String>, owner: u8) -> Self {
        Self {
            data: data.into(),
            owner,
        }
    }
}

pub(crate) type StringTable = HandleStore<StringVar>;

/// Store of every string variable in a session
#[derive(Debug, Default)]
pub struct StringStore {
    table: Mutex<StringTable>,
}

impl StringStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StringTable> {
        self.table.lock()
    }

    pub fn create(&self, data: &str, owner: u8) -> Result<StringId> {
        check_text_len(data)?;
        let mut table = self.lock();
        let id = table.allocate()?;
        table.insert(id, StringVar::new(data, owner))?;
        Ok(id)
    }

    /// Create a string that the next sweep collects unless claimed
    pub fn create_temporary(&self, data: &str, owner: u8) -> Result<StringId> {
        check_text_len(data)?;
        let mut table = self.lock();
        let id = table.allocate()?;
        table.insert(id, StringVar::new(data, owner))?;
        table.mark_temporary(id, true);
        Ok(id)
    }

    pub fn get(&self, id: StringId) -> Option<String> {
        self.lock().get(id).map(|var| var.data.clone())
    }

    pub fn owner(&self, id: StringId) -> Option<u8> {
        self.lock().get(id).map(|var| var.owner)
    }

    pub fn set(&self, id: StringId, data: &str) -> Result<()> {
        check_text_len(data)?;
        let mut table = self.lock();
        let var = table.get_mut(id).ok_or(DynvarError::NotFound(id))?;
        var.data.clear();
        var.data.push_str(data);
        Ok(())
    }

    pub fn erase(&self, id: StringId) -> bool {
        self.lock().erase(id).is_some()
    }

    pub fn mark_temporary(&self, id: StringId, temporary: bool) {
        self.lock().mark_temporary(id, temporary);
    }

    pub fn is_temporary(&self, id: StringId) -> bool {
        self.lock().is_temporary(id)
    }

    /// Erase every temporary string
    pub fn clean(&self) -> usize {
        let mut table = self.lock();
        let pending = table.temporaries();
        for &id in &pending {
            table.erase(id);
        }
        if !pending.is_empty() {
            debug!(collected = pending.len(), "cleaned temporary strings");
        }
        pending.len()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn ids(&self) -> Vec<StringId> {
        self.lock().handles()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    pub fn preload(&self) {
        self.lock().snapshot_for_load();
    }

    pub fn postload(&self, success: bool) {
        self.lock().commit_load(success);
    }
}
