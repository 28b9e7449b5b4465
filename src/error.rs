//! Error types for Dynvar

use thiserror::Error;

use crate::value::KeyType;

#[derive(Error, Debug)]
pub enum DynvarError {
    #[error("No array with id {0}")]
    NotFound(u32),

    #[error("Handle {0:#x} is reserved")]
    InvalidHandle(u32),

    #[error("Handle space exhausted")]
    Exhausted,

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Key type mismatch: array uses {expected} keys, got {found}")]
    KeyMismatch { expected: KeyType, found: KeyType },

    #[error("Index {index} out of range for array of size {len}")]
    Range { index: usize, len: usize },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Malformed save data: {0}")]
    Format(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DynvarError {
    /// Recoverable conditions a host reports as "absent" or "false"
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DynvarError::NotFound(_)
                | DynvarError::KeyNotFound(_)
                | DynvarError::TypeMismatch(_)
                | DynvarError::KeyMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DynvarError>;
