use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

pub const LAST_OUTPUT_DIR: &str = "last_output_dir";
pub const ONLY_SELECTED: &str = "only_selected";

/// String-typed key/value store persisted as TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Load settings from `path`; a missing file yields empty settings
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write settings to `path`, creating parent directories as needed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn last_output_dir(&self) -> Option<PathBuf> {
        self.get(LAST_OUTPUT_DIR).map(PathBuf::from)
    }

    pub fn set_last_output_dir(&mut self, dir: &Path) {
        self.set(LAST_OUTPUT_DIR, dir.to_string_lossy());
    }

    /// Whether processing is restricted to selected features (defaults to false)
    pub fn only_selected(&self) -> bool {
        self.get(ONLY_SELECTED)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    pub fn set_only_selected(&mut self, only_selected: bool) {
        self.set(ONLY_SELECTED, only_selected.to_string());
    }
}
