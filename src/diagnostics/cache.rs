//! Diagnostics result caching with boot-ID validation
//!
//! A boot scan is only meaningful for the boot it ran in: a reboot can fix
//! or introduce issues wholesale. The cache therefore stores the boot id
//! alongside the results and treats any mismatch as stale, regardless of
//! age. Within one boot, results stay valid for 24 hours.

use super::Issue;
use crate::atomic_file::{read_json, write_json_atomic, MODE_SHARED};
use crate::diagnostics::ScanResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

/// How long cached results stay valid within one boot.
pub const DIAGNOSTICS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const CACHE_FILE: &str = "scan_results.json";

/// Cached scan results as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsCache {
    pub version: u32,
    pub timestamp: SystemTime,
    pub boot_id: String,
    pub issues: Vec<Issue>,
    pub scan_duration: Duration,
}

/// Manages the on-disk diagnostics cache.
pub struct CacheStore {
    base_dir: PathBuf,
    boot_id: String,
    cached: RwLock<Option<DiagnosticsCache>>,
}

/// Read the current boot id. Empty on failure, which disables boot-id
/// validation rather than invalidating everything.
fn read_boot_id() -> String {
    std::fs::read_to_string("/proc/sys/kernel/random/boot_id")
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

impl CacheStore {
    /// Store rooted at the default per-user cache directory, reading the
    /// boot id once at construction.
    pub fn new() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        Self::with_base_dir(base.join("devforge").join("boot-diagnostics"), read_boot_id())
    }

    /// Store rooted at an explicit directory with an explicit boot id
    /// (tests).
    pub fn with_base_dir(base_dir: PathBuf, boot_id: String) -> Self {
        let store = Self {
            base_dir,
            boot_id,
            cached: RwLock::new(None),
        };
        store.load();
        store
    }

    fn cache_path(&self) -> PathBuf {
        self.base_dir.join(CACHE_FILE)
    }

    fn load(&self) {
        let loaded: Option<DiagnosticsCache> = match read_json(&self.cache_path()) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("diagnostics cache load failed: {}", e);
                None
            }
        };
        if let Ok(mut guard) = self.cached.write() {
            *guard = loaded;
        }
    }

    /// Whether cached results exist and are still valid: younger than the
    /// TTL and from the current boot. An empty stored or current boot id
    /// skips the boot check.
    pub fn is_valid(&self) -> bool {
        let guard = match self.cached.read() {
            Ok(g) => g,
            Err(_) => return false,
        };
        let cached = match guard.as_ref() {
            Some(c) => c,
            None => return false,
        };

        let age = SystemTime::now()
            .duration_since(cached.timestamp)
            .unwrap_or(Duration::ZERO);
        if age > DIAGNOSTICS_TTL {
            return false;
        }
        if !self.boot_id.is_empty() && !cached.boot_id.is_empty() && cached.boot_id != self.boot_id
        {
            return false;
        }
        true
    }

    /// Persist scan results atomically and keep them in memory.
    pub fn save(&self, result: &ScanResult) -> std::io::Result<()> {
        let cache = DiagnosticsCache {
            version: 1,
            timestamp: result.scan_time,
            boot_id: self.boot_id.clone(),
            issues: result.issues.clone(),
            scan_duration: result.duration,
        };
        write_json_atomic(&self.cache_path(), &cache, MODE_SHARED)?;
        if let Ok(mut guard) = self.cached.write() {
            *guard = Some(cache);
        }
        Ok(())
    }

    /// Cached results if valid, `None` otherwise.
    pub fn get(&self) -> Option<DiagnosticsCache> {
        if !self.is_valid() {
            return None;
        }
        self.cached.read().ok()?.clone()
    }

    /// Cached issues if valid.
    pub fn issues(&self) -> Vec<Issue> {
        self.get().map(|c| c.issues).unwrap_or_default()
    }

    /// Remove the cache file and the in-memory copy.
    pub fn clear(&self) -> std::io::Result<()> {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
        match std::fs::remove_file(self.cache_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Age of the cached results; zero when nothing is cached.
    pub fn age(&self) -> Duration {
        self.cached
            .read()
            .ok()
            .and_then(|guard| {
                guard
                    .as_ref()
                    .map(|c| SystemTime::now().duration_since(c.timestamp).unwrap_or_default())
            })
            .unwrap_or(Duration::ZERO)
    }

    /// Human-readable cache age for the diagnostics banner.
    pub fn age_string(&self) -> String {
        let age = self.age();
        if age.is_zero() {
            return "never".to_string();
        }
        let mins = age.as_secs() / 60;
        let hours = mins / 60;
        let days = hours / 24;
        if age < Duration::from_secs(60) {
            "just now".to_string()
        } else if hours == 0 {
            format!("{}m ago", mins)
        } else if days == 0 {
            format!("{}h ago", hours)
        } else if days == 1 {
            "1 day ago".to_string()
        } else {
            format!("{} days ago", days)
        }
    }

    /// The boot id observed at construction.
    pub fn boot_id(&self) -> &str {
        &self.boot_id
    }

    /// True when cached results are from a previous boot.
    pub fn reboot_detected(&self) -> bool {
        if self.boot_id.is_empty() {
            return false;
        }
        self.cached
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|c| c.boot_id != self.boot_id))
            .unwrap_or(false)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::parse_issues;
    use std::time::Instant;

    fn scan(issue_lines: &str) -> ScanResult {
        ScanResult {
            issues: parse_issues(issue_lines),
            errors: Vec::new(),
            scan_time: SystemTime::now(),
            duration: Instant::now().elapsed(),
            scripts_ran: 5,
            scripts_failed: 0,
        }
    }

    #[test]
    fn test_empty_store_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::with_base_dir(dir.path().to_path_buf(), "boot-a".to_string());
        assert!(!store.is_valid());
        assert!(store.get().is_none());
        assert_eq!(store.age_string(), "never");
    }

    #[test]
    fn test_save_then_valid_same_boot() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::with_base_dir(dir.path().to_path_buf(), "boot-a".to_string());
        store.save(&scan("T|LOW|a|d|NO|\n")).unwrap();
        assert!(store.is_valid());
        assert_eq!(store.issues().len(), 1);
        assert!(!store.reboot_detected());
    }

    #[test]
    fn test_reboot_invalidates_regardless_of_age() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CacheStore::with_base_dir(dir.path().to_path_buf(), "boot-a".to_string());
            store.save(&scan("T|LOW|a|d|NO|\n")).unwrap();
        }
        // Same file, new boot id: fresh results, stale boot.
        let store = CacheStore::with_base_dir(dir.path().to_path_buf(), "boot-b".to_string());
        assert!(!store.is_valid());
        assert!(store.reboot_detected());
        assert!(store.issues().is_empty());
    }

    #[test]
    fn test_empty_boot_id_skips_boot_check() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CacheStore::with_base_dir(dir.path().to_path_buf(), "boot-a".to_string());
            store.save(&scan("")).unwrap();
        }
        let store = CacheStore::with_base_dir(dir.path().to_path_buf(), String::new());
        assert!(store.is_valid());
    }

    #[test]
    fn test_expired_cache_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::with_base_dir(dir.path().to_path_buf(), "boot-a".to_string());
        let mut result = scan("");
        result.scan_time = SystemTime::now() - DIAGNOSTICS_TTL - Duration::from_secs(60);
        store.save(&result).unwrap();
        assert!(!store.is_valid());
    }

    #[test]
    fn test_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::with_base_dir(dir.path().to_path_buf(), "boot-a".to_string());
        store.save(&scan("")).unwrap();
        store.clear().unwrap();
        assert!(!store.is_valid());
        assert!(!dir.path().join(CACHE_FILE).exists());
        store.clear().unwrap();
    }
}
