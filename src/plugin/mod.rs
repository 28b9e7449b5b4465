//! Versioned array access for plugins
//!
//! Plugins are built against a specific interface version and only see the
//! calls that version shipped with. Arrays a plugin creates start out
//! temporary; they survive the next sweep only if the plugin hands them back
//! through [`ArrayInterface::assign_result`] or stores them somewhere.

use crate::container::{ArrayKind, ArrayStore};
use crate::error::{DynvarError, Result};
use crate::value::{ArrayId, Element, Key, KeyType};

/// A call a plugin may make, tagged with the interface version that added it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateArray,
    CreateMap,
    CreateStringMap,
    AssignResult,
    Lookup,
    Size,
    GetElement,
    SetElement,
    AppendElement,
    GetElements,
    HasKey,
    ContainerKind,
}

impl Capability {
    pub fn since(self) -> u32 {
        match self {
            Capability::HasKey | Capability::ContainerKind => 2,
            _ => 1,
        }
    }
}

pub struct ArrayInterface<'a> {
    store: &'a ArrayStore,
    version: u32,
}

impl<'a> ArrayInterface<'a> {
    pub const VERSION: u32 = 2;

    pub fn new(store: &'a ArrayStore) -> Self {
        Self {
            store,
            version: Self::VERSION,
        }
    }

    /// Interface for a plugin built against `version`
    pub fn with_version(store: &'a ArrayStore, version: u32) -> Result<Self> {
        if version == 0 || version > Self::VERSION {
            return Err(DynvarError::Unsupported(format!(
                "array interface version {} (latest is {})",
                version,
                Self::VERSION
            )));
        }
        Ok(Self { store, version })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        capability.since() <= self.version
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.has_capability(capability) {
            Ok(())
        } else {
            Err(DynvarError::Unsupported(format!(
                "{:?} needs interface version {}, plugin uses {}",
                capability,
                capability.since(),
                self.version
            )))
        }
    }

    fn temporary(&self, id: ArrayId) -> ArrayId {
        self.store.mark_temporary(id, true);
        id
    }

    pub fn create_array(&self, values: Vec<Element>, owner: u8) -> Result<ArrayId> {
        self.require(Capability::CreateArray)?;
        let id = self.store.create_list(values, owner)?;
        Ok(self.temporary(id))
    }

    pub fn create_map(&self, pairs: Vec<(f64, Element)>, owner: u8) -> Result<ArrayId> {
        self.require(Capability::CreateMap)?;
        let id = self.store.create(KeyType::Number, false, owner)?;
        self.temporary(id);
        for (key, value) in pairs {
            self.store.set_element(id, Key::from(key), value)?;
        }
        Ok(id)
    }

    pub fn create_string_map(&self, pairs: Vec<(String, Element)>, owner: u8) -> Result<ArrayId> {
        self.require(Capability::CreateStringMap)?;
        let id = self.store.create(KeyType::Text, false, owner)?;
        self.temporary(id);
        for (key, value) in pairs {
            self.store.set_element(id, Key::Text(key), value)?;
        }
        Ok(id)
    }

    /// Hand an array back to the calling script as a command result
    pub fn assign_result(&self, slot: &mut ArrayId, id: ArrayId, module: u8) -> Result<()> {
        self.require(Capability::AssignResult)?;
        self.store.assign_reference(slot, id, module)
    }

    pub fn lookup(&self, id: ArrayId) -> Option<ArrayId> {
        self.store.exists(id).then_some(id)
    }

    pub fn size(&self, id: ArrayId) -> Option<usize> {
        self.store.size(id)
    }

    pub fn container_kind(&self, id: ArrayId) -> Result<Option<ArrayKind>> {
        self.require(Capability::ContainerKind)?;
        Ok(self.store.kind(id))
    }

    pub fn get_element(&self, id: ArrayId, key: &Key) -> Option<Element> {
        self.store.get_element(id, key)
    }

    pub fn set_element(&self, id: ArrayId, key: Key, value: Element) -> Result<()> {
        self.require(Capability::SetElement)?;
        self.store.set_element(id, key, value)
    }

    pub fn append_element(&self, id: ArrayId, value: Element) -> Result<()> {
        self.require(Capability::AppendElement)?;
        self.store.append(id, value)
    }

    /// Every key and element, in traversal order
    pub fn get_elements(&self, id: ArrayId) -> Option<(Vec<Key>, Vec<Element>)> {
        Some(self.store.entries(id)?.into_iter().unzip())
    }

    pub fn has_key(&self, id: ArrayId, key: &Key) -> Result<bool> {
        self.require(Capability::HasKey)?;
        Ok(self.store.has_key(id, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_arrays_are_temporary() {
        let store = ArrayStore::new();
        let api = ArrayInterface::new(&store);
        let id = api.create_array(vec![Element::Number(1.0)], 0x20).unwrap();
        assert!(store.is_temporary(id));
        assert_eq!(store.clean(), 1);
        assert_eq!(api.lookup(id), None);
    }

    #[test]
    fn test_assigned_result_survives_clean() {
        let store = ArrayStore::new();
        let api = ArrayInterface::new(&store);
        let id = api
            .create_string_map(vec![("hp".to_string(), Element::Number(30.0))], 0x20)
            .unwrap();

        let mut slot = 0;
        api.assign_result(&mut slot, id, 0x05).unwrap();
        assert_eq!(store.clean(), 0);
        assert_eq!(slot, id);
        assert_eq!(api.container_kind(id).unwrap(), Some(ArrayKind::StringMap));
        assert_eq!(api.get_element(id, &Key::from("hp")), Some(Element::Number(30.0)));
    }

    #[test]
    fn test_version_one_lacks_newer_calls() {
        let store = ArrayStore::new();
        let api = ArrayInterface::with_version(&store, 1).unwrap();
        let id = api.create_map(vec![(5.0, Element::from("five"))], 0).unwrap();

        assert!(!api.has_capability(Capability::HasKey));
        assert!(api.has_capability(Capability::GetElements));
        assert!(matches!(api.has_key(id, &Key::from(5.0)), Err(DynvarError::Unsupported(_))));
        assert!(matches!(api.container_kind(id), Err(DynvarError::Unsupported(_))));

        let (keys, values) = api.get_elements(id).unwrap();
        assert_eq!(keys, vec![Key::from(5.0)]);
        assert_eq!(values, vec![Element::from("five")]);
    }

    #[test]
    fn test_rejects_unknown_versions() {
        let store = ArrayStore::new();
        assert!(ArrayInterface::with_version(&store, 0).is_err());
        assert!(ArrayInterface::with_version(&store, 3).is_err());
    }

    #[test]
    fn test_append_and_size() {
        let store = ArrayStore::new();
        let api = ArrayInterface::new(&store);
        let id = api.create_array(vec![], 0).unwrap();
        api.append_element(id, Element::Number(1.0)).unwrap();
        api.append_element(id, Element::Number(2.0)).unwrap();
        assert_eq!(api.size(id), Some(2));
        assert!(api.has_key(id, &Key::from(1usize)).unwrap());
    }
}
