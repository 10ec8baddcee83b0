use crate::managers::CloudConfigManager;
use crate::CoreError;
use bootloader_runtime::assets::{cloud_config_ops, CLOUD_CONFIG};
use bootloader_runtime::{BoshExecutor, CloudConfigUpdate, Outputs};
use bootloader_schema::State;
use bootloader_store::write_file_atomic;
use std::path::PathBuf;
use tracing::{debug, info};

const CLOUD_CONFIG_FILE: &str = "cloud-config.yml";
const OPS_FILE: &str = "ops.yml";
const VARS_FILE: &str = "vars.yml";

/// [`CloudConfigManager`] that stages files under `<state-dir>/cloud-config`
/// and uploads them with the director-install tool's CLI.
pub struct BoshCloudConfig {
    executor: BoshExecutor,
}

impl BoshCloudConfig {
    pub fn new(executor: BoshExecutor) -> Self {
        Self { executor }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.executor.layout().cloud_config_dir().join(name)
    }
}

impl CloudConfigManager for BoshCloudConfig {
    fn initialize(&self, state: &State, outputs: &Outputs) -> Result<(), CoreError> {
        let iaas = state
            .iaas
            .ok_or_else(|| CoreError::Validation("environment has no iaas set".to_owned()))?;
        debug!("staging cloud config for {iaas} with lb {}", state.lb.lb_type);

        let ops = cloud_config_ops(iaas, state.lb.lb_type);
        let vars = serde_yaml::to_string(outputs)?;
        write_file_atomic(&self.path(CLOUD_CONFIG_FILE), CLOUD_CONFIG.as_bytes(), 0o644)?;
        write_file_atomic(&self.path(OPS_FILE), ops.as_bytes(), 0o644)?;
        write_file_atomic(&self.path(VARS_FILE), vars.as_bytes(), 0o600)?;
        Ok(())
    }

    fn update(&self, state: &State) -> Result<(), CoreError> {
        info!("updating cloud config");
        self.executor.update_cloud_config(&CloudConfigUpdate {
            cloud_config: self.path(CLOUD_CONFIG_FILE),
            ops_file: self.path(OPS_FILE),
            vars_file: self.path(VARS_FILE),
            director_address: state.bosh.director_address.clone(),
            director_username: state.bosh.director_username.clone(),
            director_password: state.bosh.director_password.clone(),
            director_ca_cert: state.bosh.director_ssl_ca.clone(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootloader_runtime::RecordingRunner;
    use bootloader_schema::{Iaas, LbType};
    use bootloader_store::StateLayout;
    use serde_json::Value;
    use std::fs;
    use std::sync::Arc;

    fn setup(runner: Arc<RecordingRunner>) -> (tempfile::TempDir, BoshCloudConfig) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, BoshCloudConfig::new(BoshExecutor::new(runner, "bosh", layout)))
    }

    #[test]
    fn initialize_writes_lb_ops_and_output_vars() {
        let (dir, cc) = setup(Arc::new(RecordingRunner::new()));
        let mut state = State::new();
        state.iaas = Some(Iaas::Gcp);
        state.lb.lb_type = LbType::Cf;
        let outputs: Outputs = [("cf_router_backend_service", Value::from("lake-router"))]
            .into_iter()
            .collect();
        cc.initialize(&state, &outputs).unwrap();

        let base = dir.path().join("cloud-config");
        assert!(fs::read_to_string(base.join("ops.yml"))
            .unwrap()
            .contains("((cf_router_backend_service))"));
        assert!(fs::read_to_string(base.join("vars.yml"))
            .unwrap()
            .contains("cf_router_backend_service: lake-router"));
        assert!(base.join("cloud-config.yml").exists());
    }

    #[test]
    fn update_authenticates_against_director() {
        let runner = Arc::new(RecordingRunner::new());
        let (dir, cc) = setup(runner.clone());
        let mut state = State::new();
        state.bosh.director_address = "https://10.0.0.6:25555".to_owned();
        state.bosh.director_username = "admin".to_owned();
        state.bosh.director_password = "pw".to_owned();
        cc.update(&state).unwrap();

        let calls = runner.calls();
        let call = &calls[0];
        assert!(call.has_args(&["update-cloud-config"]));
        assert_eq!(
            call.args[1],
            dir.path().join("cloud-config/cloud-config.yml").display().to_string()
        );
        assert_eq!(call.env_value("BOSH_ENVIRONMENT"), Some("https://10.0.0.6:25555"));
        assert_eq!(call.env_value("BOSH_CLIENT_SECRET"), Some("pw"));
        assert!(call.args.iter().any(|a| a == "--non-interactive"));
    }
}
