//! Content module remapping
//!
//! A save records module indices as they were when it was written. Between
//! sessions modules may be added, removed or reordered; the host describes
//! the change as old index → new index (or nothing, for removed modules).

use crate::error::{DynvarError, Result};

/// Module index reserved for content created at runtime. Always loaded.
pub const DYNAMIC_MODULE: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct ModuleMap {
    table: [Option<u8>; 256],
}

impl Default for ModuleMap {
    fn default() -> Self {
        Self::identity()
    }
}

impl ModuleMap {
    /// Every module loaded at its old index
    pub fn identity() -> Self {
        let mut table = [None; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = Some(i as u8);
        }
        Self { table }
    }

    /// Only the dynamic module loaded
    pub fn empty() -> Self {
        let mut table = [None; 256];
        table[DYNAMIC_MODULE as usize] = Some(DYNAMIC_MODULE);
        Self { table }
    }

    /// The given modules loaded at unchanged indices
    pub fn from_loaded(indices: &[u8]) -> Self {
        let mut map = Self::empty();
        for &i in indices {
            map.insert(i, i);
        }
        map
    }

    /// Parse a comma list of `old` or `old=new` entries, e.g. `0,1,4=2`.
    /// Indices may be decimal or `0x` hex.
    pub fn parse(list: &str) -> Result<Self> {
        let mut map = Self::empty();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (old, new) = match entry.split_once('=') {
                Some((old, new)) => (parse_index(old)?, parse_index(new)?),
                None => {
                    let i = parse_index(entry)?;
                    (i, i)
                }
            };
            map.insert(old, new);
        }
        Ok(map)
    }

    pub fn insert(&mut self, old: u8, new: u8) {
        self.table[old as usize] = Some(new);
    }

    pub fn remove(&mut self, old: u8) {
        self.table[old as usize] = None;
    }

    /// Keep `index` loaded at its own position
    pub fn with_dynamic(mut self, index: u8) -> Self {
        self.insert(index, index);
        self
    }

    /// New index of a saved module, `None` if it is gone
    pub fn resolve(&self, old: u8) -> Option<u8> {
        self.table[old as usize]
    }

    pub fn is_loaded(&self, old: u8) -> bool {
        self.resolve(old).is_some()
    }

    /// Rewrite the module byte of a content reference. The null reference
    /// stays null.
    pub fn resolve_form(&self, form: u32) -> Option<u32> {
        if form == 0 {
            return Some(0);
        }
        let module = self.resolve((form >> 24) as u8)?;
        Some((u32::from(module) << 24) | (form & 0x00FF_FFFF))
    }
}

fn parse_index(text: &str) -> Result<u8> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    };
    parsed.map_err(|_| DynvarError::Config(format!("invalid module index '{}'", text)))
}
