//! Destination lookup: the base path captures are written under.
//!
//! The router reads the destination on every capture and sync event, so a
//! change takes effect on the next event.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Source of the configured destination base path.
pub trait DestinationSource: Send + Sync {
    /// The destination, or `None` when unset or blank.
    fn destination(&self) -> Option<String>;
}

/// Persisted user settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

/// JSON settings file, re-read on every lookup.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, or defaults if the file is missing or unreadable.
    pub fn load(&self) -> Settings {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk.
    pub fn save(&self, settings: &Settings) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&self.path, json)
    }

    /// Update only the destination.
    pub fn set_destination(&self, destination: Option<String>) -> Result<Settings, std::io::Error> {
        let mut settings = self.load();
        settings.destination = destination;
        self.save(&settings)?;
        Ok(settings)
    }
}

impl DestinationSource for SettingsFile {
    fn destination(&self) -> Option<String> {
        non_blank(self.load().destination)
    }
}

/// In-memory destination, for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticDestination {
    value: RwLock<Option<String>>,
}

impl StaticDestination {
    pub fn new(value: Option<&str>) -> Self {
        Self {
            value: RwLock::new(value.map(str::to_string)),
        }
    }

    pub fn set(&self, value: Option<&str>) {
        *self.value.write() = value.map(str::to_string);
    }
}

impl DestinationSource for StaticDestination {
    fn destination(&self) -> Option<String> {
        non_blank(self.value.read().clone())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
