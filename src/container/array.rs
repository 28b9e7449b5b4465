//! Array variable definition
//!
//! An [`ArrayVar`] is one script-visible array or map: its element storage
//! plus the bookkeeping the store needs for lifetime tracking and saves.

use serde::{Deserialize, Serialize};

use super::backend::Backend;
use crate::error::{DynvarError, Result};
use crate::value::{Element, Key, KeyType};

/// Script-facing flavour of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayKind {
    /// Packed, number-indexed
    Array,
    /// Sparse, number-keyed
    Map,
    /// Sparse, string-keyed
    StringMap,
}

impl std::fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayKind::Array => write!(f, "Array"),
            ArrayKind::Map => write!(f, "Map"),
            ArrayKind::StringMap => write!(f, "StringMap"),
        }
    }
}

/// A dynamically typed array or map
#[derive(Debug, Clone)]
pub struct ArrayVar {
    /// Key type every element must use
    key_type: KeyType,
    /// Dense storage when set, sorted map otherwise
    packed: bool,
    /// Content module that created the array
    owner: u8,
    /// One entry per live reference, tagged with the referencing module
    refs: Vec<u8>,
    backend: Backend,
}

impl ArrayVar {
    /// Create an empty array. String keys always use sorted storage.
    pub fn new(key_type: KeyType, packed: bool, owner: u8) -> Result<Self> {
        if key_type == KeyType::Invalid {
            return Err(DynvarError::TypeMismatch(
                "arrays need number or string keys".to_string(),
            ));
        }
        let packed = packed && key_type == KeyType::Number;
        Ok(Self {
            key_type,
            packed,
            owner,
            refs: Vec::new(),
            backend: if packed { Backend::dense() } else { Backend::sorted() },
        })
    }

    /// Rebuild an array from saved parts
    pub(crate) fn restore(key_type: KeyType, packed: bool, owner: u8, refs: Vec<u8>) -> Result<Self> {
        let mut arr = Self::new(key_type, packed, owner)?;
        arr.refs = refs;
        Ok(arr)
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn owner(&self) -> u8 {
        self.owner
    }

    pub fn kind(&self) -> ArrayKind {
        match (self.key_type, self.packed) {
            (KeyType::Text, _) => ArrayKind::StringMap,
            (_, true) => ArrayKind::Array,
            _ => ArrayKind::Map,
        }
    }

    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut Backend {
        &mut self.backend
    }

    /// Reject keys of the wrong type
    pub fn check_key(&self, key: &Key) -> Result<()> {
        if key.key_type() != self.key_type {
            return Err(DynvarError::KeyMismatch {
                expected: self.key_type,
                found: key.key_type(),
            });
        }
        Ok(())
    }

    pub fn get(&self, key: &Key) -> Option<&Element> {
        if key.key_type() != self.key_type {
            return None;
        }
        self.backend.read(key)
    }

    /// Store an element, returning the one it replaced
    pub fn set(&mut self, key: Key, value: Element) -> Result<Option<Element>> {
        self.check_key(&key)?;
        self.backend.write(key, value)
    }

    /// Remove an element. A mismatched key on an empty array is simply absent.
    pub fn erase(&mut self, key: &Key) -> Result<Option<Element>> {
        if self.is_empty() && key.key_type() != self.key_type {
            return Ok(None);
        }
        self.check_key(key)?;
        self.backend.erase(key)
    }

    /// Snapshot of every `(key, element)` pair in key order
    pub fn entries(&self) -> Vec<(Key, Element)> {
        self.backend.iter().map(|(k, e)| (k, e.clone())).collect()
    }

    /// Ids of arrays referenced by this array's elements
    pub fn child_arrays(&self) -> Vec<u32> {
        self.backend
            .iter()
            .filter_map(|(_, e)| e.as_array())
            .filter(|&id| id != 0)
            .collect()
    }

    pub fn references(&self) -> &[u8] {
        &self.refs
    }

    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    pub fn add_ref(&mut self, module: u8) {
        self.refs.push(module);
    }

    /// Drop one reference held by `module`
    pub fn remove_ref(&mut self, module: u8) -> bool {
        match self.refs.iter().position(|&m| m == module) {
            Some(pos) => {
                self.refs.remove(pos);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_kinds() {
        assert_eq!(ArrayVar::new(KeyType::Number, true, 0).unwrap().kind(), ArrayKind::Array);
        assert_eq!(ArrayVar::new(KeyType::Number, false, 0).unwrap().kind(), ArrayKind::Map);
        let sm = ArrayVar::new(KeyType::Text, true, 0).unwrap();
        assert_eq!(sm.kind(), ArrayKind::StringMap);
        assert!(!sm.is_packed());
        assert!(ArrayVar::new(KeyType::Invalid, false, 0).is_err());
    }

    #[test]
    fn test_key_type_fixed_at_creation() {
        let mut arr = ArrayVar::new(KeyType::Text, false, 1).unwrap();
        let err = arr.set(Key::from(1.0), Element::Number(1.0)).unwrap_err();
        assert!(matches!(err, DynvarError::KeyMismatch { .. }));
        assert!(arr.is_empty());
    }

    #[test]
    fn test_mismatched_erase_on_empty_is_absent() {
        let mut arr = ArrayVar::new(KeyType::Text, false, 1).unwrap();
        assert_eq!(arr.erase(&Key::from(0.0)).unwrap(), None);

        arr.set(Key::from("k"), Element::Number(1.0)).unwrap();
        assert!(arr.erase(&Key::from(0.0)).is_err());
        assert!(arr.get(&Key::from(0.0)).is_none());
    }

    #[test]
    fn test_refs_partitioned_by_module() {
        let mut arr = ArrayVar::new(KeyType::Number, true, 1).unwrap();
        arr.add_ref(1);
        arr.add_ref(2);
        arr.add_ref(1);
        assert!(arr.remove_ref(1));
        assert_eq!(arr.references(), &[2, 1]);
        assert!(!arr.remove_ref(7));
        assert_eq!(arr.ref_count(), 2);
    }
}
