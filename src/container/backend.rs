//! Element storage behind an array variable
//!
//! An array commits to one of two layouts when it is created:
//!
//! - `Dense`: elements addressed by index `0..len`. Writing past the end
//!   appends exactly one slot and erasing shifts later elements down.
//! - `Sorted`: an ordered key → element map. Nothing ever shifts.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::{DynvarError, Result};
use crate::value::{check_text_len, Element, Key};

#[derive(Debug, Clone)]
pub enum Backend {
    Dense(Vec<Element>),
    Sorted(BTreeMap<Key, Element>),
}

fn check_element(value: &Element) -> Result<()> {
    match value {
        Element::String(s) => check_text_len(s),
        _ => Ok(()),
    }
}

/// Coerce a key to a dense index
fn dense_index(key: &Key) -> Result<usize> {
    key.index().ok_or_else(|| {
        DynvarError::TypeMismatch(format!("{} is not a valid array index", key))
    })
}

impl Backend {
    pub fn dense() -> Self {
        Backend::Dense(Vec::new())
    }

    pub fn sorted() -> Self {
        Backend::Sorted(BTreeMap::new())
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, Backend::Dense(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Backend::Dense(v) => v.len(),
            Backend::Sorted(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self, key: &Key) -> Option<&Element> {
        match self {
            Backend::Dense(v) => v.get(key.index()?),
            Backend::Sorted(m) => m.get(key),
        }
    }

    /// Store `value` under `key`, returning the element it replaced
    pub fn write(&mut self, key: Key, value: Element) -> Result<Option<Element>> {
        if let Key::Text(text) = &key {
            check_text_len(text)?;
        }
        check_element(&value)?;
        match self {
            Backend::Dense(v) => {
                let idx = dense_index(&key)?;
                if idx < v.len() {
                    Ok(Some(std::mem::replace(&mut v[idx], value)))
                } else {
                    v.push(value);
                    Ok(None)
                }
            }
            Backend::Sorted(m) => Ok(m.insert(key, value)),
        }
    }

    /// Remove one element. Dense arrays shift the tail down and fail with a
    /// range error past the end; sorted maps return `None` for absent keys.
    pub fn erase(&mut self, key: &Key) -> Result<Option<Element>> {
        match self {
            Backend::Dense(v) => {
                let idx = dense_index(key)?;
                if idx >= v.len() {
                    return Err(DynvarError::Range { index: idx, len: v.len() });
                }
                Ok(Some(v.remove(idx)))
            }
            Backend::Sorted(m) => Ok(m.remove(key)),
        }
    }

    /// Remove the inclusive index span `lo..=hi` from a dense array. `hi`
    /// is clamped to the last index.
    pub fn erase_range(&mut self, lo: &Key, hi: &Key) -> Result<Vec<Element>> {
        match self {
            Backend::Dense(v) => {
                let lo = dense_index(lo)?;
                let hi = dense_index(hi)?;
                if lo >= v.len() {
                    return Err(DynvarError::Range { index: lo, len: v.len() });
                }
                if hi < lo {
                    return Err(DynvarError::Range { index: hi, len: v.len() });
                }
                let hi = hi.min(v.len() - 1);
                Ok(v.drain(lo..=hi).collect())
            }
            Backend::Sorted(_) => Err(DynvarError::TypeMismatch(
                "range erase requires a packed array".to_string(),
            )),
        }
    }

    /// Drop every element, returning them in key order
    pub fn clear(&mut self) -> Vec<Element> {
        match self {
            Backend::Dense(v) => std::mem::take(v),
            Backend::Sorted(m) => std::mem::take(m).into_values().collect(),
        }
    }

    /// Mutable access to every element, in key order
    pub(crate) fn values_mut(&mut self) -> Box<dyn Iterator<Item = &mut Element> + '_> {
        match self {
            Backend::Dense(v) => Box::new(v.iter_mut()),
            Backend::Sorted(m) => Box::new(m.values_mut()),
        }
    }

    /// Ordered traversal from first to last key
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Key, &Element)> + '_> {
        match self {
            Backend::Dense(v) => Box::new(v.iter().enumerate().map(|(i, e)| (Key::from(i), e))),
            Backend::Sorted(m) => Box::new(m.iter().map(|(k, e)| (k.clone(), e))),
        }
    }

    /// Elements whose keys fall in the half-open range `[lo, hi)`
    pub fn range(&self, lo: &Key, hi: &Key) -> Result<Vec<(Key, Element)>> {
        match self {
            Backend::Dense(v) => {
                let lo = dense_index(lo)?;
                let hi = dense_index(hi)?;
                if lo > hi || hi > v.len() {
                    return Err(DynvarError::Range { index: lo.max(hi), len: v.len() });
                }
                Ok(v[lo..hi]
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (Key::from(lo + i), e.clone()))
                    .collect())
            }
            Backend::Sorted(m) => {
                if lo >= hi {
                    return Ok(Vec::new());
                }
                Ok(m.range(lo.clone()..hi.clone())
                    .map(|(k, e)| (k.clone(), e.clone()))
                    .collect())
            }
        }
    }

    pub fn first_key(&self) -> Option<Key> {
        match self {
            Backend::Dense(v) => (!v.is_empty()).then(|| Key::from(0usize)),
            Backend::Sorted(m) => m.keys().next().cloned(),
        }
    }

    pub fn last_key(&self) -> Option<Key> {
        match self {
            Backend::Dense(v) => v.len().checked_sub(1).map(Key::from),
            Backend::Sorted(m) => m.keys().next_back().cloned(),
        }
    }

    /// Key following `key` in traversal order
    pub fn next_key(&self, key: &Key) -> Option<Key> {
        match self {
            Backend::Dense(v) => {
                let next = key.index()? + 1;
                (next < v.len()).then(|| Key::from(next))
            }
            Backend::Sorted(m) => m
                .range((Bound::Excluded(key.clone()), Bound::Unbounded))
                .next()
                .map(|(k, _)| k.clone()),
        }
    }

    /// Key preceding `key` in traversal order
    pub fn prev_key(&self, key: &Key) -> Option<Key> {
        match self {
            Backend::Dense(v) => {
                let idx = key.index()?;
                if idx == 0 || v.is_empty() {
                    return None;
                }
                Some(Key::from(idx.min(v.len()) - 1))
            }
            Backend::Sorted(m) => m.range(..key.clone()).next_back().map(|(k, _)| k.clone()),
        }
    }

    /// Insert before `index`, shifting later elements up
    pub fn insert(&mut self, index: usize, values: Vec<Element>) -> Result<()> {
        match self {
            Backend::Dense(v) => {
                if index > v.len() {
                    return Err(DynvarError::Range { index, len: v.len() });
                }
                values.iter().try_for_each(check_element)?;
                v.splice(index..index, values);
                Ok(())
            }
            Backend::Sorted(_) => Err(DynvarError::TypeMismatch(
                "insert requires a packed array".to_string(),
            )),
        }
    }

    /// Truncate or pad a dense array to `len`, returning removed elements
    pub fn resize(&mut self, len: usize, pad: Element) -> Result<Vec<Element>> {
        match self {
            Backend::Dense(v) => {
                if len < v.len() {
                    Ok(v.drain(len..).collect())
                } else {
                    check_element(&pad)?;
                    v.resize(len, pad);
                    Ok(Vec::new())
                }
            }
            Backend::Sorted(_) => Err(DynvarError::TypeMismatch(
                "resize requires a packed array".to_string(),
            )),
        }
    }
}
