//! MCP secrets store
//!
//! Secret environment variables collected by the secrets wizard are written
//! to `~/.config/devforge/mcp-secrets.env` as `KEY=value` lines, mode 0600.
//! Values never appear in logs; callers log key names only.

use crate::atomic_file::{write_bytes_atomic, MODE_PRIVATE};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Manages the private env file holding MCP server credentials.
pub struct SecretsStore {
    path: PathBuf,
}

impl SecretsStore {
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::with_path(base.join("devforge").join("mcp-secrets.env"))
    }

    /// Store at an explicit path (tests).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the stored secrets. Missing file means no secrets; malformed
    /// lines are skipped.
    pub fn load(&self) -> std::io::Result<BTreeMap<String, String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e),
        };

        let mut secrets = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                secrets.insert(key.trim().to_string(), value.to_string());
            }
        }
        Ok(secrets)
    }

    /// Store one secret, preserving the others. The file is rewritten
    /// atomically with private permissions.
    pub fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        let mut secrets = self.load()?;
        secrets.insert(key.to_string(), value.to_string());
        self.write(&secrets)
    }

    /// Remove one secret.
    pub fn remove(&self, key: &str) -> std::io::Result<()> {
        let mut secrets = self.load()?;
        secrets.remove(key);
        self.write(&secrets)
    }

    /// Whether a non-empty value is stored for the key.
    pub fn has(&self, key: &str) -> bool {
        self.load()
            .map(|s| s.get(key).map(|v| !v.is_empty()).unwrap_or(false))
            .unwrap_or(false)
    }

    fn write(&self, secrets: &BTreeMap<String, String>) -> std::io::Result<()> {
        let mut body = String::from("# devforge MCP server credentials\n");
        for (key, value) in secrets {
            body.push_str(key);
            body.push('=');
            body.push_str(value);
            body.push('\n');
        }
        log::info!("writing {} secret(s)", secrets.len());
        write_bytes_atomic(&self.path, body.as_bytes(), MODE_PRIVATE)
    }
}

impl Default for SecretsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_set_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretsStore::with_path(dir.path().join("mcp-secrets.env"));

        store.set("CONTEXT7_API_KEY", "abc123").unwrap();
        store.set("OTHER_KEY", "with=equals").unwrap();

        let secrets = store.load().unwrap();
        assert_eq!(secrets["CONTEXT7_API_KEY"], "abc123");
        // Values may contain '='; only the first split counts.
        assert_eq!(secrets["OTHER_KEY"], "with=equals");
        assert!(store.has("CONTEXT7_API_KEY"));
        assert!(!store.has("MISSING"));
    }

    #[test]
    fn test_file_is_private() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp-secrets.env");
        let store = SecretsStore::with_path(path.clone());
        store.set("K", "v").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretsStore::with_path(dir.path().join("mcp-secrets.env"));
        store.set("A", "1").unwrap();
        store.set("B", "2").unwrap();
        store.remove("A").unwrap();

        let secrets = store.load().unwrap();
        assert!(!secrets.contains_key("A"));
        assert_eq!(secrets["B"], "2");
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretsStore::with_path(dir.path().join("absent.env"));
        assert!(store.load().unwrap().is_empty());
    }
}
