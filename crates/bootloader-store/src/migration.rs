//! Descriptor format migration.
//!
//! Descriptors written by older releases are upgraded in place to
//! [`STATE_VERSION`] before being deserialized. A copy of the original file is
//! kept next to it and the rewrite is atomic, so a crash mid-migration leaves
//! either the old or the new descriptor on disk.

use crate::layout::STATE_FILE;
use crate::{write_file_atomic, StoreError};
use bootloader_schema::STATE_VERSION;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a successful migration.
#[derive(Debug)]
pub struct MigrationResult {
    pub from_version: u32,
    pub to_version: u32,
    pub backup_path: PathBuf,
}

/// Migrate the descriptor under `root` to [`STATE_VERSION`].
///
/// - Returns `Ok(None)` if the descriptor is absent or already current.
/// - Returns `Err(VersionMismatch)` if it was written by a *newer* release.
/// - Backs the original up to `state.json.backup.{timestamp}` before rewriting.
pub fn migrate_state(root: &Path) -> Result<Option<MigrationResult>, StoreError> {
    let path = root.join(STATE_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let mut val: Value = serde_json::from_str(&content)?;
    let obj = val.as_object_mut().ok_or_else(|| StoreError::InvalidState {
        path: path.display().to_string(),
        reason: "descriptor is not a JSON object".to_owned(),
    })?;

    let found = obj
        .get("version")
        .and_then(Value::as_u64)
        .map_or(1, |v| u32::try_from(v).unwrap_or(u32::MAX));

    if found == STATE_VERSION {
        return Ok(None);
    }
    if found > STATE_VERSION {
        return Err(StoreError::VersionMismatch {
            expected: STATE_VERSION,
            found,
        });
    }

    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let backup_path = root.join(format!("{STATE_FILE}.backup.{timestamp}"));
    fs::copy(&path, &backup_path)?;
    info!("backed up state file to {}", backup_path.display());

    let mut version = found;
    while version < STATE_VERSION {
        match version {
            0 | 1 => nest_component_states(obj),
            2 => name_absent_load_balancer(obj),
            _ => {}
        }
        version += 1;
        debug!("state descriptor stepped to v{version}");
    }
    obj.insert("version".to_owned(), Value::from(STATE_VERSION));

    let new_content = serde_json::to_string_pretty(&val)?;
    write_file_atomic(&path, new_content.as_bytes(), 0o600)?;

    Ok(Some(MigrationResult {
        from_version: found,
        to_version: STATE_VERSION,
        backup_path,
    }))
}

/// v1 kept component state blobs at the top level as `jumpboxState` and
/// `boshState`; v2 nests them under their component.
fn nest_component_states(obj: &mut Map<String, Value>) {
    for (legacy, component) in [("jumpboxState", "jumpbox"), ("boshState", "bosh")] {
        let Some(blob) = obj.remove(legacy) else {
            continue;
        };
        if blob.is_null() {
            continue;
        }
        let entry = obj
            .entry(component.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Some(section) = entry.as_object_mut() {
            section.entry("state".to_owned()).or_insert(blob);
        }
    }
}

/// v2 wrote an empty `lb.type` for "no load balancer".
fn name_absent_load_balancer(obj: &mut Map<String, Value>) {
    let Some(lb) = obj.get_mut("lb").and_then(Value::as_object_mut) else {
        return;
    };
    let empty = match lb.get("type") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if empty {
        lb.insert("type".to_owned(), Value::from("none"));
    }
}
