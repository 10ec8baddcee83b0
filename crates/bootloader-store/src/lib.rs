//! State directory management for bootloader.
//!
//! This crate owns the on-disk side of an environment: the [`StateLayout`]
//! describing where the descriptor, tool working directories and generated
//! scripts live, the [`StateStore`] that loads and atomically persists the
//! environment descriptor, and [`migrate_state`] for one-way upgrades of
//! descriptors written by older releases.

pub mod layout;
pub mod migration;
pub mod state_store;

pub use layout::{Component, StateLayout, STATE_FILE, TERRAFORM_DIR, TF_STATE_FILE, VARS_DIR};
pub use migration::{migrate_state, MigrationResult};
pub use state_store::StateStore;

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory itself has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Write `contents` to `path` so that readers observe either the old file or
/// the complete new one, never a torn write. `mode` is applied on unix before
/// the file becomes visible.
pub fn write_file_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<(), std::io::Error> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    set_mode(tmp.as_file(), mode)?;
    tmp.persist(path).map_err(|e| e.error)?;
    fsync_dir(dir)
}

#[cfg(unix)]
fn set_mode(file: &std::fs::File, mode: u32) -> Result<(), std::io::Error> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &std::fs::File, _mode: u32) -> Result<(), std::io::Error> {
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("state file version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("invalid state file {path}: {reason}")]
    InvalidState { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.txt");
        write_file_atomic(&path, b"first", 0o644).unwrap();
        write_file_atomic(&path, b"second", 0o644).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_applies_mode() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.sh");
        write_file_atomic(&path, b"#!/bin/sh\n", 0o755).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file_atomic(&dir.path().join("a"), b"x", 0o644).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn store_error_display_version_mismatch() {
        let e = StoreError::VersionMismatch {
            expected: 3,
            found: 9,
        };
        let msg = e.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('9'));
    }

    #[test]
    fn store_error_display_invalid_state() {
        let e = StoreError::InvalidState {
            path: "/tmp/state.json".to_owned(),
            reason: "not an object".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/state.json"));
        assert!(msg.contains("not an object"));
    }
}
