//! Session configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DynvarError, Result};
use crate::persist::{ARRAY_VERSION, DYNAMIC_MODULE, LEGACY_ARRAY_VERSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Array record version written on save
    pub save_version: u32,
    /// Module index for runtime-created content, treated as always loaded
    pub dynamic_module: u8,
    /// Leave temporary arrays the next sweep would collect out of saves
    pub skip_pending_on_save: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_version: ARRAY_VERSION,
            dynamic_module: DYNAMIC_MODULE,
            skip_pending_on_save: false,
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.save_version != ARRAY_VERSION && self.save_version != LEGACY_ARRAY_VERSION {
            return Err(DynvarError::Config(format!(
                "save_version must be {} or {}, got {}",
                LEGACY_ARRAY_VERSION, ARRAY_VERSION, self.save_version
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = Config::from_json(r#"{ "save_version": 1 }"#).unwrap();
        assert_eq!(config.save_version, 1);
        assert_eq!(config.dynamic_module, 0xFF);
        assert!(!config.skip_pending_on_save);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = Config::from_json(r#"{ "save_version": 9 }"#).unwrap_err();
        assert!(matches!(err, DynvarError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        assert!(matches!(
            Config::from_json(r#"{ "collect": true }"#),
            Err(DynvarError::JsonError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dynvar.json");
        std::fs::write(&path, r#"{ "dynamic_module": 254 }"#).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.dynamic_module, 254);
    }
}
