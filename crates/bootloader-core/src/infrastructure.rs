use crate::inputs::terraform_inputs;
use crate::managers::{InfrastructureManager, StepFailure};
use crate::CoreError;
use bootloader_runtime::templates::template;
use bootloader_runtime::{Outputs, RuntimeError, TerraformExecutor};
use bootloader_schema::State;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// [`InfrastructureManager`] backed by the IaC tool. The descriptor's
/// `tf_state` is the only record of provisioned resources.
pub struct TerraformManager {
    executor: TerraformExecutor,
}

impl TerraformManager {
    pub fn new(executor: TerraformExecutor) -> Self {
        Self { executor }
    }

    fn reconcile(
        &self,
        state: &State,
        run: impl FnOnce(&TerraformExecutor, &BTreeMap<String, String>) -> Result<String, RuntimeError>,
    ) -> Result<State, StepFailure> {
        let vars = terraform_inputs(state).map_err(|e| StepFailure::new(state.clone(), e))?;
        debug!("iac variables: {}", vars.keys().cloned().collect::<Vec<_>>().join(", "));

        let mut next = state.clone();
        match run(&self.executor, &vars) {
            Ok(tf_state) => {
                next.tf_state = tf_state;
                Ok(next)
            }
            Err(e) => {
                match e.tf_state() {
                    Some(partial) => next.tf_state = partial.to_owned(),
                    None => warn!("no iac state on disk after failure; keeping previous state"),
                }
                Err(StepFailure::new(next, e))
            }
        }
    }
}

impl InfrastructureManager for TerraformManager {
    fn init(&self, state: &State) -> Result<(), CoreError> {
        let iaas = state
            .iaas
            .ok_or_else(|| CoreError::Validation("environment has no iaas set".to_owned()))?;
        let template = template(iaas, state.lb.lb_type);
        Ok(self.executor.init(&template, &state.tf_state)?)
    }

    fn apply(&self, state: &State) -> Result<State, StepFailure> {
        self.reconcile(state, TerraformExecutor::apply)
    }

    fn destroy(&self, state: &State) -> Result<State, StepFailure> {
        self.reconcile(state, TerraformExecutor::destroy)
    }

    fn outputs(&self, state: &State) -> Result<Outputs, CoreError> {
        if state.tf_state.is_empty() {
            return Ok(Outputs::default());
        }
        Ok(self.executor.outputs(&state.tf_state)?)
    }

    fn version(&self) -> Result<String, CoreError> {
        Ok(self.executor.version()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootloader_runtime::{Invocation, RecordingRunner};
    use bootloader_schema::{EnvId, Iaas, LbType};
    use bootloader_store::StateLayout;
    use std::fs;
    use std::sync::Arc;

    fn state() -> State {
        let mut state = State::new();
        state.iaas = Some(Iaas::Aws);
        state.env_id = EnvId::new("lake");
        state
    }

    fn manager(runner: Arc<RecordingRunner>) -> (tempfile::TempDir, TerraformManager) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.initialize().unwrap();
        let executor = TerraformExecutor::new(runner, "terraform", layout, false);
        (dir, TerraformManager::new(executor))
    }

    fn write_state(inv: &Invocation, contents: &str) -> std::io::Result<()> {
        fs::write(
            inv.cwd.clone().unwrap_or_default().join("../vars/terraform.tfstate"),
            contents,
        )
    }

    #[test]
    fn init_stages_lb_template() {
        let runner = Arc::new(RecordingRunner::new());
        let (dir, mgr) = manager(runner);
        let mut s = state();
        s.lb.lb_type = LbType::Concourse;
        mgr.init(&s).unwrap();
        let staged = fs::read_to_string(dir.path().join("terraform/template.tf")).unwrap();
        assert!(staged.contains("concourse"));
    }

    #[test]
    fn apply_records_new_state() {
        let runner = Arc::new(RecordingRunner::with_handler(|inv, _| {
            if inv.has_args(&["apply"]) {
                write_state(inv, "applied")?;
            }
            Ok(())
        }));
        let (_dir, mgr) = manager(runner);
        let next = mgr.apply(&state()).unwrap();
        assert_eq!(next.tf_state, "applied");
        assert_eq!(next.env_id, "lake");
    }

    #[test]
    fn failed_apply_returns_partial_state() {
        let runner = Arc::new(RecordingRunner::with_handler(|inv, _| {
            write_state(inv, "half")?;
            Err(RuntimeError::ExitStatus {
                program: inv.program_name(),
                status: "exit status: 1".to_owned(),
            })
        }));
        let (_dir, mgr) = manager(runner);
        let failure = mgr.apply(&state()).unwrap_err();
        assert_eq!(failure.state.tf_state, "half");
        assert!(failure.error.to_string().contains("terraform apply failed"));
    }

    #[test]
    fn outputs_of_unapplied_environment_are_empty() {
        let runner = Arc::new(RecordingRunner::new());
        let (_dir, mgr) = manager(runner.clone());
        assert!(mgr.outputs(&state()).unwrap().is_empty());
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn invalid_inputs_fail_without_running_tool() {
        let runner = Arc::new(RecordingRunner::new());
        let (_dir, mgr) = manager(runner.clone());
        let failure = mgr.destroy(&State::new()).unwrap_err();
        assert!(failure.error.is_validation());
        assert_eq!(failure.state, State::new());
        assert_eq!(runner.call_count(), 0);
    }
}
