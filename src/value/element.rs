//! Array elements

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ArrayId;

/// Type tag of an element, as written to save records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Invalid,
    Number,
    Form,
    String,
    Array,
}

impl ElementType {
    pub fn code(self) -> u8 {
        match self {
            ElementType::Invalid => 0,
            ElementType::Number => 1,
            ElementType::Form => 2,
            ElementType::String => 3,
            ElementType::Array => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ElementType::Invalid),
            1 => Some(ElementType::Number),
            2 => Some(ElementType::Form),
            3 => Some(ElementType::String),
            4 => Some(ElementType::Array),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Invalid => "invalid",
            ElementType::Number => "number",
            ElementType::Form => "form",
            ElementType::String => "string",
            ElementType::Array => "array",
        };
        write!(f, "{}", name)
    }
}

/// A single value held by an array.
///
/// `Form` carries a content reference: a 32-bit id whose top byte is the
/// index of the content module that defines it. `Array` carries the id of
/// another array in the same store; equality on it compares ids, never
/// contents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Element {
    #[default]
    Invalid,
    Number(f64),
    Form(u32),
    String(String),
    Array(ArrayId),
}

impl Element {
    pub fn element_type(&self) -> ElementType {
        match self {
            Element::Invalid => ElementType::Invalid,
            Element::Number(_) => ElementType::Number,
            Element::Form(_) => ElementType::Form,
            Element::String(_) => ElementType::String,
            Element::Array(_) => ElementType::Array,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Element::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<u32> {
        match self {
            Element::Form(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrayId> {
        match self {
            Element::Array(id) => Some(*id),
            _ => None,
        }
    }

    /// Truthiness as seen by scripts
    pub fn is_truthy(&self) -> bool {
        match self {
            Element::Invalid => false,
            Element::Number(n) => *n != 0.0,
            Element::Form(id) => *id != 0,
            Element::String(s) => !s.is_empty(),
            Element::Array(id) => *id != 0,
        }
    }

    /// Natural ordering: same-typed values compare by payload, mixed types
    /// compare by type tag.
    pub fn compare(&self, other: &Element) -> Ordering {
        match (self, other) {
            (Element::Number(a), Element::Number(b)) => a.total_cmp(b),
            (Element::Form(a), Element::Form(b)) => a.cmp(b),
            (Element::String(a), Element::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Element::Array(a), Element::Array(b)) => a.cmp(b),
            _ => self.element_type().cmp(&other.element_type()),
        }
    }

    /// Ordering of the string renderings, ignoring ASCII case
    pub fn compare_alpha(&self, other: &Element) -> Ordering {
        let a = self.to_string().to_ascii_lowercase();
        let b = other.to_string().to_ascii_lowercase();
        a.cmp(&b)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Invalid => write!(f, "<invalid>"),
            Element::Number(n) => write!(f, "{}", n),
            Element::Form(id) => write!(f, "[{:08X}]", id),
            Element::String(s) => write!(f, "{}", s),
            Element::Array(id) => write!(f, "Array ID {}", id),
        }
    }
}

impl From<f64> for Element {
    fn from(n: f64) -> Self {
        Element::Number(n)
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::String(s.to_string())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Element::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invalid() {
        assert_eq!(Element::default(), Element::Invalid);
        assert_eq!(Element::default().element_type(), ElementType::Invalid);
    }

    #[test]
    fn test_equality_requires_matching_type() {
        assert_ne!(Element::Number(5.0), Element::Form(5));
        assert_ne!(Element::Array(5), Element::Form(5));
        assert_eq!(Element::Array(5), Element::Array(5));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Element::Invalid.is_truthy());
        assert!(!Element::Number(0.0).is_truthy());
        assert!(Element::Number(-1.0).is_truthy());
        assert!(!Element::from("").is_truthy());
        assert!(Element::from("x").is_truthy());
        assert!(!Element::Array(0).is_truthy());
    }

    #[test]
    fn test_mixed_types_compare_by_tag() {
        let n = Element::Number(100.0);
        let s = Element::from("a");
        assert_eq!(n.compare(&s), Ordering::Less);
        assert_eq!(s.compare(&n), Ordering::Greater);
    }

    #[test]
    fn test_alpha_compare_ignores_case() {
        let a = Element::from("apple");
        let b = Element::from("Banana");
        assert_eq!(a.compare_alpha(&b), Ordering::Less);
        // bytewise, uppercase sorts first
        assert_eq!(a.compare(&b), Ordering::Greater);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&Element::Form(0x0100_0ABC)).unwrap();
        assert_eq!(json, r#"{"type":"form","value":16779964}"#);
        let back: Element = serde_json::from_str(r#"{"type":"string","value":"hi"}"#).unwrap();
        assert_eq!(back, Element::from("hi"));
    }
}
