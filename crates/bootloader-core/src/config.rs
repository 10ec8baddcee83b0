//! Operator configuration.
//!
//! Sources, lowest precedence first: `<state-dir>/bootloader.toml`, then
//! `BOOTLOADER_*` environment variables, then command-line flags (applied by
//! the caller). Environment lookup is injected so tests never touch the
//! process environment.

use crate::CoreError;
use bootloader_schema::{Iaas, State};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "bootloader.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub iaas: Option<Iaas>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub aws: AwsSection,
    #[serde(default)]
    pub gcp: GcpSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AwsSection {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GcpSection {
    /// Service account key JSON, or a path to a file containing it.
    #[serde(default)]
    pub service_account_key: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ToolsSection {
    #[serde(default)]
    pub terraform: Option<PathBuf>,
    #[serde(default)]
    pub bosh: Option<PathBuf>,
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn parse(input: &str, path: &Path) -> Result<Self, CoreError> {
        toml::from_str(input).map_err(|e| CoreError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read `bootloader.toml` from `state_dir`; a missing file is an empty
    /// config.
    pub fn load_file(state_dir: &Path) -> Result<Self, CoreError> {
        let path = state_dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!("loaded config from {}", path.display());
                Self::parse(&content, &path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overlay `BOOTLOADER_*` variables found through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), CoreError> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(iaas) = get("BOOTLOADER_IAAS") {
            self.iaas = Some(iaas.parse()?);
        }
        if let Some(debug) = get("BOOTLOADER_DEBUG") {
            self.debug = truthy(&debug);
        }

        let overrides: [(&str, &mut Option<String>); 7] = [
            ("BOOTLOADER_AWS_ACCESS_KEY_ID", &mut self.aws.access_key_id),
            ("BOOTLOADER_AWS_SECRET_ACCESS_KEY", &mut self.aws.secret_access_key),
            ("BOOTLOADER_AWS_REGION", &mut self.aws.region),
            ("BOOTLOADER_GCP_SERVICE_ACCOUNT_KEY", &mut self.gcp.service_account_key),
            ("BOOTLOADER_GCP_PROJECT_ID", &mut self.gcp.project_id),
            ("BOOTLOADER_GCP_ZONE", &mut self.gcp.zone),
            ("BOOTLOADER_GCP_REGION", &mut self.gcp.region),
        ];
        for (key, slot) in overrides {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        }

        if let Some(path) = get("BOOTLOADER_TERRAFORM_PATH") {
            self.tools.terraform = Some(PathBuf::from(path));
        }
        if let Some(path) = get("BOOTLOADER_BOSH_PATH") {
            self.tools.bosh = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// File config overlaid with the environment.
    pub fn load(
        state_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CoreError> {
        let mut config = Self::load_file(state_dir)?;
        config.apply_env(lookup)?;
        Ok(config)
    }

    pub fn terraform_path(&self) -> PathBuf {
        self.tools
            .terraform
            .clone()
            .unwrap_or_else(|| PathBuf::from("terraform"))
    }

    pub fn bosh_path(&self) -> PathBuf {
        self.tools
            .bosh
            .clone()
            .unwrap_or_else(|| PathBuf::from("bosh"))
    }

    /// Copy configured credentials into the descriptor. Unset values leave
    /// what the descriptor already records.
    pub fn apply_credentials(&self, state: &mut State) -> Result<(), CoreError> {
        fn set(slot: &mut String, value: Option<&String>) {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        }

        set(&mut state.aws.access_key_id, self.aws.access_key_id.as_ref());
        set(&mut state.aws.secret_access_key, self.aws.secret_access_key.as_ref());
        set(&mut state.aws.region, self.aws.region.as_ref());
        set(&mut state.gcp.project_id, self.gcp.project_id.as_ref());
        set(&mut state.gcp.zone, self.gcp.zone.as_ref());
        set(&mut state.gcp.region, self.gcp.region.as_ref());

        if let Some(key) = &self.gcp.service_account_key {
            state.gcp.service_account_key = read_service_account_key(key)?;
        }
        Ok(())
    }
}

/// Key material given inline is used as is; anything else is read as a path.
fn read_service_account_key(value: &str) -> Result<String, CoreError> {
    if value.trim_start().starts_with('{') {
        return Ok(value.to_owned());
    }
    fs::read_to_string(value).map_err(|source| CoreError::ReadInput {
        what: "gcp service account key",
        path: PathBuf::from(value),
        source,
    })
}
