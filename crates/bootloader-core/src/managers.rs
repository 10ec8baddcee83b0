//! Seams between the engine and the collaborators it drives.
//!
//! Each trait takes the descriptor by reference and hands back the next
//! descriptor by value. Implementations never persist anything themselves;
//! that is the engine's job.

use crate::CoreError;
use bootloader_runtime::Outputs;
use bootloader_schema::{Iaas, State};
use bootloader_store::StateStore;

/// A step failed, possibly after changing remote resources. `state` is the
/// descriptor reflecting whatever the step managed to do and must be
/// persisted before `error` is reported.
#[derive(Debug)]
pub struct StepFailure {
    pub state: State,
    pub error: CoreError,
}

impl StepFailure {
    pub fn new(state: State, error: impl Into<CoreError>) -> Self {
        Self {
            state,
            error: error.into(),
        }
    }
}

pub trait StateWriter {
    fn set(&self, state: &State) -> Result<(), CoreError>;

    /// Drop every generated file and persist the residual descriptor.
    fn clear(&self, state: &State) -> Result<State, CoreError>;
}

impl StateWriter for StateStore {
    fn set(&self, state: &State) -> Result<(), CoreError> {
        StateStore::set(self, state).map_err(Into::into)
    }

    fn clear(&self, state: &State) -> Result<State, CoreError> {
        StateStore::clear(self, state).map_err(Into::into)
    }
}

/// Networking, compute and load balancer resources.
pub trait InfrastructureManager {
    /// Stage the template for the descriptor's provider and load balancer.
    fn init(&self, state: &State) -> Result<(), CoreError>;
    fn apply(&self, state: &State) -> Result<State, StepFailure>;
    fn destroy(&self, state: &State) -> Result<State, StepFailure>;
    /// Outputs recorded in the descriptor's IaC state; empty when nothing
    /// has been applied yet.
    fn outputs(&self, state: &State) -> Result<Outputs, CoreError>;
    fn version(&self) -> Result<String, CoreError>;
}

/// The jumpbox and director VMs.
pub trait DirectorManager {
    fn is_jumpbox_initialized(&self, iaas: Iaas) -> bool;
    fn initialize_jumpbox(&self, state: &State) -> Result<(), CoreError>;
    fn create_jumpbox(&self, state: &State, outputs: &Outputs) -> Result<State, StepFailure>;
    fn delete_jumpbox(&self, state: &State, outputs: &Outputs) -> Result<(), CoreError>;

    fn is_director_initialized(&self, iaas: Iaas) -> bool;
    fn initialize_director(&self, state: &State) -> Result<(), CoreError>;
    fn create_director(&self, state: &State, outputs: &Outputs) -> Result<State, StepFailure>;
    fn delete_director(&self, state: &State, outputs: &Outputs) -> Result<(), CoreError>;

    fn version(&self) -> Result<String, CoreError>;
}

/// The director's cloud config.
pub trait CloudConfigManager {
    /// Write the cloud config, its provider/LB overlay and variables.
    fn initialize(&self, state: &State, outputs: &Outputs) -> Result<(), CoreError>;
    /// Upload the staged cloud config to the running director.
    fn update(&self, state: &State) -> Result<(), CoreError>;
}
