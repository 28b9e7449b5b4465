//! Array keys and their ordering

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant of the keys an array accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Invalid,
    Number,
    Text,
}

impl KeyType {
    /// Byte written to save records
    pub fn code(self) -> u8 {
        match self {
            KeyType::Invalid => 0,
            KeyType::Number => 1,
            KeyType::Text => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(KeyType::Invalid),
            1 => Some(KeyType::Number),
            3 => Some(KeyType::Text),
            _ => None,
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Invalid => write!(f, "invalid"),
            KeyType::Number => write!(f, "number"),
            KeyType::Text => write!(f, "string"),
        }
    }
}

/// A key addressing one element of an array.
///
/// Number keys order numerically (via `f64::total_cmp`, with -0.0 folded
/// into 0.0), text keys order by raw bytes. The two kinds never meet inside one array; the cross
/// ordering (numbers first) only exists so `Key` is totally ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Number(f64),
    Text(String),
}

impl Key {
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Number(_) => KeyType::Number,
            Key::Text(_) => KeyType::Text,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Key::Number(n) => Some(*n),
            Key::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Text(s) => Some(s),
            Key::Number(_) => None,
        }
    }

    /// Interpret the key as a dense array index
    pub fn index(&self) -> Option<usize> {
        match self {
            Key::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
                if *n <= u32::MAX as f64 {
                    Some(*n as usize)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// -0.0 and 0.0 address the same slot
fn fold_zero(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(fold_zero(n))
    }
}

impl From<usize> for Key {
    fn from(n: usize) -> Self {
        Key::Number(n as f64)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) => fold_zero(*a).total_cmp(&fold_zero(*b)),
            (Key::Text(a), Key::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Key::Number(_), Key::Text(_)) => Ordering::Less,
            (Key::Text(_), Key::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{}", n),
            Key::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_keys_order_by_bytes() {
        let upper = Key::from("Zed");
        let lower = Key::from("apple");
        assert!(upper < lower);
        assert!(Key::from("ab") < Key::from("abc"));
    }

    #[test]
    fn test_number_keys_order_numerically() {
        assert!(Key::from(2.0) < Key::from(10.0));
        assert!(Key::from(-1.5) < Key::from(0.0));
        assert_eq!(Key::from(-0.0), Key::from(0.0));
    }

    #[test]
    fn test_negative_zero_matches_zero_however_built() {
        assert_eq!(Key::Number(-0.0), Key::from(0.0));
        assert_eq!(Key::Number(-0.0).cmp(&Key::Number(0.0)), Ordering::Equal);
        assert!(Key::Number(-0.0) > Key::from(-1.0));

        let mut map = std::collections::BTreeMap::new();
        map.insert(Key::from(0.0), "zero");
        assert_eq!(map.get(&Key::Number(-0.0)), Some(&"zero"));

        let parsed: Key = serde_json::from_str("-0.0").unwrap();
        assert_eq!(map.get(&parsed), Some(&"zero"));
    }

    #[test]
    fn test_index_coercion() {
        assert_eq!(Key::from(3.0).index(), Some(3));
        assert_eq!(Key::from(1.5).index(), None);
        assert_eq!(Key::from(-1.0).index(), None);
        assert_eq!(Key::from("3").index(), None);
    }

    #[test]
    fn test_key_type_codes() {
        for kt in [KeyType::Invalid, KeyType::Number, KeyType::Text] {
            assert_eq!(KeyType::from_code(kt.code()), Some(kt));
        }
        assert_eq!(KeyType::from_code(2), None);
    }
}
