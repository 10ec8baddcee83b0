use crate::deployment_vars::{
    director_credentials, director_deployment_vars, director_name, jumpbox_deployment_vars,
};
use crate::managers::{DirectorManager, StepFailure};
use crate::CoreError;
use bootloader_runtime::{
    BoshExecutor, CreateEnvInput, CreateEnvOutput, DeleteEnvInput, InterpolateInput, Outputs,
};
use bootloader_schema::{Iaas, State};
use bootloader_store::Component;
use tracing::{info, warn};

/// [`DirectorManager`] backed by the director-install tool.
pub struct BoshManager {
    executor: BoshExecutor,
}

impl BoshManager {
    pub fn new(executor: BoshExecutor) -> Self {
        Self { executor }
    }

    fn iaas(state: &State) -> Result<Iaas, CoreError> {
        state
            .iaas
            .ok_or_else(|| CoreError::Validation("environment has no iaas set".to_owned()))
    }

    /// Run `create-env` for `component` and fold the result into a copy of
    /// `state` with `apply`. On failure the generated variables are kept so
    /// a re-run reuses the same credentials.
    fn create(
        &self,
        component: Component,
        state: &State,
        deployment_vars: Result<String, CoreError>,
        apply: impl FnOnce(&mut State, CreateEnvOutput) -> Result<(), CoreError>,
    ) -> Result<State, StepFailure> {
        let deployment_vars = deployment_vars.map_err(|e| StepFailure::new(state.clone(), e))?;
        let mut next = state.clone();

        match self.executor.create_env(&CreateEnvInput {
            component,
            deployment_vars,
        }) {
            Ok(output) => match apply(&mut next, output) {
                Ok(()) => Ok(next),
                Err(e) => Err(StepFailure::new(next, e)),
            },
            Err(e) => {
                match self.executor.read_back(component) {
                    Ok(partial) if !partial.variables.is_empty() => match component {
                        Component::Jumpbox => next.jumpbox.variables = partial.variables,
                        Component::Director => next.bosh.variables = partial.variables,
                    },
                    Ok(_) => {}
                    Err(read_err) => warn!("could not read {component} variables after failure: {read_err}"),
                }
                Err(StepFailure::new(next, e))
            }
        }
    }
}

impl DirectorManager for BoshManager {
    fn is_jumpbox_initialized(&self, iaas: Iaas) -> bool {
        self.executor.is_jumpbox_initialized(iaas)
    }

    fn initialize_jumpbox(&self, state: &State) -> Result<(), CoreError> {
        self.executor.jumpbox_create_env_args(&InterpolateInput {
            iaas: Self::iaas(state)?,
            state: state.jumpbox.state.as_ref(),
            variables: &state.jumpbox.variables,
            ops_file: "",
        })?;
        Ok(())
    }

    fn create_jumpbox(&self, state: &State, outputs: &Outputs) -> Result<State, StepFailure> {
        info!("creating jumpbox");
        self.create(
            Component::Jumpbox,
            state,
            jumpbox_deployment_vars(state, outputs),
            |next, output| {
                next.jumpbox.variables = output.variables;
                next.jumpbox.state = output.state;
                next.jumpbox.url = outputs.get_string("jumpbox_url");
                Ok(())
            },
        )
    }

    fn delete_jumpbox(&self, state: &State, outputs: &Outputs) -> Result<(), CoreError> {
        info!("deleting jumpbox");
        self.initialize_jumpbox(state)?;
        self.executor.delete_env(&DeleteEnvInput {
            component: Component::Jumpbox,
            deployment_vars: jumpbox_deployment_vars(state, outputs)?,
        })?;
        Ok(())
    }

    fn is_director_initialized(&self, iaas: Iaas) -> bool {
        self.executor.is_director_initialized(iaas)
    }

    fn initialize_director(&self, state: &State) -> Result<(), CoreError> {
        self.executor.director_create_env_args(&InterpolateInput {
            iaas: Self::iaas(state)?,
            state: state.bosh.state.as_ref(),
            variables: &state.bosh.variables,
            ops_file: &state.bosh.user_ops_file,
        })?;
        Ok(())
    }

    fn create_director(&self, state: &State, outputs: &Outputs) -> Result<State, StepFailure> {
        info!("creating director");
        self.create(
            Component::Director,
            state,
            director_deployment_vars(state, outputs),
            |next, output| {
                // The VM exists once create-env succeeds; record it before
                // anything else can fail.
                next.bosh.variables = output.variables;
                next.bosh.state = output.state;
                next.bosh.director_name = director_name(next);
                next.bosh.director_address = outputs.get_string("director_address");
                let creds = director_credentials(&next.bosh.variables)?;
                next.bosh.director_username = creds.username;
                next.bosh.director_password = creds.password;
                next.bosh.director_ssl_ca = creds.ca_cert;
                Ok(())
            },
        )
    }

    fn delete_director(&self, state: &State, outputs: &Outputs) -> Result<(), CoreError> {
        info!("deleting director");
        self.initialize_director(state)?;
        self.executor.delete_env(&DeleteEnvInput {
            component: Component::Director,
            deployment_vars: director_deployment_vars(state, outputs)?,
        })?;
        Ok(())
    }

    fn version(&self) -> Result<String, CoreError> {
        Ok(self.executor.version()?)
    }
}
