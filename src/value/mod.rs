//! Tagged values and keys stored inside array variables
//!
//! Every element of an array is an [`Element`]: a number, a reference to a
//! piece of game content, a string, or the id of another array. Elements are
//! addressed by [`Key`]s, which are either numbers or strings.

mod element;
mod key;

use crate::error::{DynvarError, Result};

pub use element::{Element, ElementType};
pub use key::{Key, KeyType};

/// Handle of an array variable inside its store
pub type ArrayId = u32;

/// Handle of a string variable inside its store
pub type StringId = u32;

/// Bits of a handle available for ids; the top four are reserved
pub const HANDLE_MASK: u32 = 0x0FFF_FFFF;

/// Longest string, in bytes, a save record can hold
pub const MAX_TEXT_LEN: usize = u16::MAX as usize;

/// Reject text too long to save
pub(crate) fn check_text_len(text: &str) -> Result<()> {
    if text.len() > MAX_TEXT_LEN {
        return Err(DynvarError::TypeMismatch(format!(
            "string of {} bytes exceeds the {} byte limit",
            text.len(),
            MAX_TEXT_LEN
        )));
    }
    Ok(())
}
