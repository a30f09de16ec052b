//! Atomic file persistence
//!
//! Every on-disk artifact (status cache, checkpoints, diagnostics cache,
//! secrets) is written with the same discipline: serialize, write to
//! `<path>.tmp`, fsync, rename over the target. A crash mid-write leaves
//! the previous file intact; rename is the only durability guarantee.

use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;

/// Default mode for cache/checkpoint files.
pub const MODE_SHARED: u32 = 0o644;

/// Mode for files holding credentials (the MCP secrets store).
pub const MODE_PRIVATE: u32 = 0o600;

/// Write `data` to `path` atomically with the given mode, creating parent
/// directories (0755) as needed.
pub fn write_bytes_atomic(path: &Path, data: &[u8], mode: u32) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(0o755)
                .create(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(&tmp_path)?;

    if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T, mode: u32) -> std::io::Result<()> {
    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    write_bytes_atomic(path, &data, mode)
}

/// Open a JSON file if it exists. `Ok(None)` for a missing file; parse
/// errors propagate to the caller, which decides whether to recover.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> std::io::Result<Option<T>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let value = serde_json::from_slice(&data)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}
