use crate::layout::StateLayout;
use crate::migration::migrate_state;
use crate::{write_file_atomic, StoreError};
use bootloader_schema::{State, STATE_VERSION};
use std::fs;
use tracing::{debug, info};

/// Loads and persists the environment descriptor.
///
/// Writes always replace the whole descriptor atomically; there is no
/// partial update path.
#[derive(Debug, Clone)]
pub struct StateStore {
    layout: StateLayout,
}

impl StateStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn exists(&self) -> bool {
        self.layout.state_file().exists()
    }

    /// Load the descriptor, migrating older formats first. A missing file
    /// yields a fresh, empty descriptor.
    pub fn get(&self) -> Result<State, StoreError> {
        let path = self.layout.state_file();
        if !path.exists() {
            debug!("no state file at {}, starting empty", path.display());
            return Ok(State::new());
        }

        if let Some(result) = migrate_state(self.layout.root())? {
            info!(
                "migrated state from v{} to v{} (backup at {})",
                result.from_version,
                result.to_version,
                result.backup_path.display()
            );
        }

        let content = fs::read_to_string(&path)?;
        let state: State = serde_json::from_str(&content)?;
        Ok(state)
    }

    pub fn set(&self, state: &State) -> Result<(), StoreError> {
        let mut current = state.clone();
        current.version = STATE_VERSION;
        let content = serde_json::to_string_pretty(&current)?;
        write_file_atomic(&self.layout.state_file(), content.as_bytes(), 0o600)?;
        debug!("persisted state for env '{}'", current.env_id);
        Ok(())
    }

    /// Remove every generated file for a torn-down environment and persist
    /// the residual descriptor, which keeps only identity fields.
    pub fn clear(&self, state: &State) -> Result<State, StoreError> {
        for dir in self.layout.working_dirs() {
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        for component in [
            crate::Component::Jumpbox,
            crate::Component::Director,
        ] {
            for script in [
                self.layout.create_script(component),
                self.layout.delete_script(component),
            ] {
                if script.exists() {
                    fs::remove_file(&script)?;
                }
            }
        }

        let residual = state.residual();
        self.set(&residual)?;
        info!("cleared state for env '{}'", residual.env_id);
        Ok(residual)
    }
}
