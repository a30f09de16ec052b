//! Tool status caching with TTL
//!
//! Probe runs are expensive (each is a 30-second-budget bash child), so
//! results are cached in memory and persisted to
//! `~/.cache/devforge/status.json`. The cache is best-effort: a corrupt or
//! missing file means probes run again, and a failed save is logged and
//! forgotten.

use crate::atomic_file::{read_json, write_json_atomic, MODE_SHARED};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

/// How long a cached status satisfies dashboard reads.
pub const STATUS_TTL: Duration = Duration::from_secs(5 * 60);

/// Coarse installation state reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolState {
    #[serde(rename = "INSTALLED")]
    Installed,
    #[serde(rename = "Not Installed")]
    NotInstalled,
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
}

impl ToolState {
    fn parse(s: &str) -> Self {
        match s.trim() {
            "INSTALLED" => Self::Installed,
            "Not Installed" => Self::NotInstalled,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ToolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Installed => "INSTALLED",
            Self::NotInstalled => "Not Installed",
            Self::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// The cached status of one tool, parsed from its probe's final stdout line.
///
/// Mutated only by replacement: a new probe run produces a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStatus {
    pub id: String,
    pub status: ToolState,
    /// Installed version string (opaque)
    #[serde(default)]
    pub version: String,
    /// Installation method tag reported by the probe
    #[serde(default)]
    pub method: String,
    /// Filesystem location of the binary
    #[serde(default)]
    pub location: String,
    /// Latest known available version
    #[serde(rename = "latest", default)]
    pub latest_version: String,
    /// Sub-items (bundled package versions, npm globals)
    #[serde(default)]
    pub details: Vec<String>,
    pub cached_at: SystemTime,
}

impl ToolStatus {
    /// A placeholder for probes that failed or produced garbage.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: ToolState::Unknown,
            version: String::new(),
            method: String::new(),
            location: String::new(),
            latest_version: String::new(),
            details: Vec::new(),
            cached_at: SystemTime::now(),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.status == ToolState::Installed
    }

    /// Whether a newer version is known. Comparison is lexical on the raw
    /// version strings; promoting this to semver is a product decision.
    pub fn needs_update(&self) -> bool {
        if !self.is_installed() || self.latest_version.is_empty() || self.latest_version == "-" {
            return false;
        }
        self.latest_version != self.version && self.latest_version > self.version
    }
}

/// Parse the pipe-delimited probe output into a status.
///
/// Format: `STATUS|VERSION|METHOD|LOCATION|LATEST`. The location field may
/// carry `^`-separated sub-details, the first being the true location.
/// Fewer than five fields yields an Unknown status with no partial fills.
pub fn parse_probe_output(tool_id: &str, output: &str) -> ToolStatus {
    let output = output.trim();
    let parts: Vec<&str> = output.split('|').collect();

    if parts.len() < 5 {
        return ToolStatus::unknown(tool_id);
    }

    let mut status = ToolStatus {
        id: tool_id.to_string(),
        status: ToolState::parse(parts[0]),
        version: parts[1].to_string(),
        method: parts[2].to_string(),
        location: String::new(),
        latest_version: parts[4].to_string(),
        details: Vec::new(),
        cached_at: SystemTime::now(),
    };

    let mut location_parts = parts[3].split('^');
    if let Some(loc) = location_parts.next() {
        status.location = loc.to_string();
    }
    status.details = location_parts.map(str::to_string).collect();

    status
}

/// Persistent per-tool status cache shared by all views.
#[derive(Clone)]
pub struct StatusCache {
    entries: Arc<RwLock<HashMap<String, ToolStatus>>>,
    path: PathBuf,
}

impl StatusCache {
    /// Open the cache at the default per-user location, loading any
    /// existing file. Load failures are treated as an empty cache.
    pub fn new() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::with_path(base.join("devforge").join("status.json"))
    }

    /// Open the cache at an explicit path (tests).
    pub fn with_path(path: PathBuf) -> Self {
        let cache = Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            path,
        };
        cache.load();
        cache
    }

    /// Return a cached status if one exists and is younger than the TTL.
    pub fn get(&self, tool_id: &str) -> Option<ToolStatus> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(tool_id)?;
        let age = SystemTime::now()
            .duration_since(entry.cached_at)
            .unwrap_or(Duration::ZERO);
        if age > STATUS_TTL {
            return None;
        }
        Some(entry.clone())
    }

    /// Store a status, stamping `cached_at`, and persist in the background.
    pub fn set(&self, mut status: ToolStatus) {
        status.cached_at = SystemTime::now();
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(status.id.clone(), status);
        }

        // Persistence is best-effort and must not block the event loop.
        let cache = self.clone();
        thread::spawn(move || {
            if let Err(e) = cache.save() {
                log::warn!("status cache save failed: {}", e);
            }
        });
    }

    /// Drop one entry. Disk is untouched until the next `set`.
    pub fn invalidate(&self, tool_id: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(tool_id);
        }
    }

    /// Drop every entry. Disk is untouched until the next `set`.
    pub fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Persist the full cache to disk.
    pub fn save(&self) -> std::io::Result<()> {
        let snapshot = self
            .entries
            .read()
            .map(|e| e.clone())
            .unwrap_or_default();
        write_json_atomic(&self.path, &snapshot, MODE_SHARED)
    }

    fn load(&self) {
        let loaded: Option<HashMap<String, ToolStatus>> = match read_json(&self.path) {
            Ok(v) => v,
            Err(e) => {
                // Corrupt cache is not worth surfacing; probes re-run.
                log::warn!("status cache load failed: {}", e);
                None
            }
        };
        if let Some(entries) = loaded {
            if let Ok(mut guard) = self.entries.write() {
                *guard = entries;
            }
        }
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, version: &str, latest: &str) -> ToolStatus {
        ToolStatus {
            id: id.to_string(),
            status: ToolState::Installed,
            version: version.to_string(),
            method: "source".to_string(),
            location: "/usr/local/bin".to_string(),
            latest_version: latest.to_string(),
            details: Vec::new(),
            cached_at: SystemTime::now(),
        }
    }

    #[test]
    fn test_parse_full_line() {
        let status = parse_probe_output(
            "wezterm",
            "INSTALLED|20240203|source|/usr/local/bin/wezterm|20240520",
        );
        assert_eq!(status.status, ToolState::Installed);
        assert_eq!(status.version, "20240203");
        assert_eq!(status.method, "source");
        assert_eq!(status.location, "/usr/local/bin/wezterm");
        assert_eq!(status.latest_version, "20240520");
        assert!(status.details.is_empty());
    }

    #[test]
    fn test_parse_location_subdetails() {
        let status = parse_probe_output(
            "nodejs",
            "INSTALLED|v22.2.0|script|~/.local/share/fnm^npm 10.8.1^pnpm 9.1.0|v22.3.0",
        );
        assert_eq!(status.location, "~/.local/share/fnm");
        assert_eq!(status.details, vec!["npm 10.8.1", "pnpm 9.1.0"]);
    }

    #[test]
    fn test_parse_too_few_fields_is_unknown() {
        let status = parse_probe_output("wezterm", "INSTALLED|1.0|source");
        assert_eq!(status.status, ToolState::Unknown);
        assert!(status.version.is_empty());
        assert!(status.location.is_empty());
    }

    #[test]
    fn test_parse_not_installed() {
        let status = parse_probe_output("neovim", "Not Installed|-|-|-|v0.10.0");
        assert_eq!(status.status, ToolState::NotInstalled);
        assert!(!status.is_installed());
        assert!(!status.needs_update());
    }

    #[test]
    fn test_needs_update_rules() {
        assert!(sample("a", "1.0.0", "1.0.1").needs_update());
        assert!(!sample("a", "1.0.1", "1.0.1").needs_update());
        assert!(!sample("a", "1.0.1", "").needs_update());
        assert!(!sample("a", "1.0.1", "-").needs_update());
        // Lexical comparison by design: "9.0" is treated as newer than "10.0".
        assert!(!sample("a", "9.0", "10.0").needs_update());
    }

    #[test]
    fn test_ttl_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatusCache::with_path(dir.path().join("status.json"));

        let mut status = sample("wezterm", "1.0", "-");
        cache.set(status.clone());
        assert!(cache.get("wezterm").is_some());

        // Backdate past the TTL by writing through set's stamping.
        status.cached_at = SystemTime::now() - STATUS_TTL - Duration::from_secs(1);
        cache
            .entries
            .write()
            .unwrap()
            .insert("wezterm".to_string(), status);
        assert!(cache.get("wezterm").is_none());
    }

    #[test]
    fn test_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatusCache::with_path(dir.path().join("status.json"));
        cache.set(sample("a", "1", "-"));
        cache.set(sample("b", "1", "-"));

        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());

        cache.invalidate_all();
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");

        let cache = StatusCache::with_path(path.clone());
        cache.set(sample("wezterm", "1.0", "2.0"));
        cache.save().unwrap();

        let reloaded = StatusCache::with_path(path);
        let status = reloaded.get("wezterm").expect("persisted entry");
        assert_eq!(status.version, "1.0");
        assert!(status.needs_update());
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let cache = StatusCache::with_path(path);
        assert!(cache.get("anything").is_none());
    }
}
