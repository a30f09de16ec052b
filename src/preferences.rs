//! User preference persistence
//!
//! Stores the saved installation-method choice at
//! `~/.config/devforge/preferences.json`. Smart install routing consults it
//! before showing the method selector; "remember this" in the selector
//! writes it.

use crate::atomic_file::{read_json, write_json_atomic, MODE_SHARED};
use crate::registry::InstallMethod;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Persisted user preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Preferred install method for the terminal emulator (the only
    /// multi-method tool in the catalog)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_method: Option<InstallMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<SystemTime>,
}

/// Manages the preference file on disk.
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store at the default path under the user config directory.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::with_path(base.join("devforge").join("preferences.json"))
    }

    /// Store at an explicit path (tests).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read preferences. A missing file is empty preferences; a corrupt
    /// file is an error the caller may ignore.
    pub fn load(&self) -> std::io::Result<Preferences> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    /// Write preferences, stamping `last_modified`.
    pub fn save(&self, mut prefs: Preferences) -> std::io::Result<()> {
        prefs.last_modified = Some(SystemTime::now());
        write_json_atomic(&self.path, &prefs, MODE_SHARED)
    }

    /// The saved terminal install method, if any.
    pub fn terminal_method(&self) -> Option<InstallMethod> {
        self.load().ok().and_then(|p| p.terminal_method)
    }

    /// Save the preferred terminal install method.
    pub fn set_terminal_method(&self, method: InstallMethod) -> std::io::Result<()> {
        let mut prefs = self.load().unwrap_or_default();
        prefs.terminal_method = Some(method);
        self.save(prefs)
    }

    /// Remove the preference file.
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}
