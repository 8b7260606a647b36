//! Identity configuration
//!
//! Names and UIDs the device publishes. They carry no behavior, so they live
//! in a TOML file rather than in code; every field has a default.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// File name looked up inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "driver.toml";

/// Published identity of the plug-in, box and device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub bundle_id: String,
    pub box_uid: String,
    pub box_name: String,
    pub device_uid: String,
    pub device_model_uid: String,
    pub device_name: String,
    pub manufacturer: String,
    /// Name of a data-source item; `{}` is replaced by the 1-based item number
    pub data_source_item_name: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            bundle_id: "com.tzgames.audio.USBAudioDriver".to_string(),
            box_uid: "USBAudioBox_UID".to_string(),
            box_name: "USB Audio Box".to_string(),
            device_uid: "USBAudioDevice_UID".to_string(),
            device_model_uid: "USBAudioDevice_ModelUID".to_string(),
            device_name: "USB Audio Interface".to_string(),
            manufacturer: "Ape Inc.".to_string(),
            data_source_item_name: "iAudio USB Device {}".to_string(),
        }
    }
}

impl DriverConfig {
    /// Load from the platform config directory, falling back to defaults
    /// when no file exists
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                tracing::debug!("No driver config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded driver config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DriverError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// `<config dir>/driver.toml` for this bundle, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "tzgames", "USBAudioDriver")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Display name of data-source item `item` (0-based)
    pub fn data_source_item_name(&self, item: u32) -> String {
        self.data_source_item_name.replace("{}", &(item + 1).to_string())
    }
}
