//! Recording fakes for the engine's collaborators. Every call is appended to
//! a shared journal so tests can assert on ordering across collaborators.

#![allow(dead_code)]

use bootloader_core::{
    CloudConfigManager, CoreError, DirectorManager, Engine, InfrastructureManager, StateWriter,
    StepFailure,
};
use bootloader_runtime::Outputs;
use bootloader_schema::{ComponentState, EnvId, Iaas, State};
use bootloader_store::StoreError;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn log(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.entries().iter().any(|e| e.starts_with(prefix))
    }
}

pub struct FakeStore {
    journal: Arc<Journal>,
    pub sets: Mutex<Vec<State>>,
    failing_sets: Mutex<HashSet<usize>>,
}

impl FakeStore {
    /// Make the `n`th call to `set` (zero-based) fail.
    pub fn fail_set(&self, n: usize) {
        self.failing_sets.lock().unwrap().insert(n);
    }

    pub fn sets(&self) -> Vec<State> {
        self.sets.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<State> {
        self.sets().last().cloned()
    }
}

impl StateWriter for FakeStore {
    fn set(&self, state: &State) -> Result<(), CoreError> {
        self.journal.log("set");
        let mut sets = self.sets.lock().unwrap();
        let n = sets.len();
        sets.push(state.clone());
        if self.failing_sets.lock().unwrap().contains(&n) {
            return Err(StoreError::Io(std::io::Error::other("failed to save state")).into());
        }
        Ok(())
    }

    fn clear(&self, state: &State) -> Result<State, CoreError> {
        self.journal.log("clear");
        Ok(state.residual())
    }
}

#[derive(Default)]
pub struct InfraScript {
    pub fail_init: bool,
    /// Partial IaC state and message returned by a failing apply.
    pub fail_apply: Option<(String, String)>,
}

pub struct FakeInfra {
    journal: Arc<Journal>,
    pub script: Mutex<InfraScript>,
    pub applied: Mutex<Vec<State>>,
}

impl FakeInfra {
    pub fn applied(&self) -> Vec<State> {
        self.applied.lock().unwrap().clone()
    }
}

impl InfrastructureManager for FakeInfra {
    fn init(&self, _state: &State) -> Result<(), CoreError> {
        self.journal.log("tf init");
        if self.script.lock().unwrap().fail_init {
            return Err(CoreError::Validation("failed to init".to_owned()));
        }
        Ok(())
    }

    fn apply(&self, state: &State) -> Result<State, StepFailure> {
        self.journal.log("tf apply");
        self.applied.lock().unwrap().push(state.clone());
        let mut next = state.clone();
        if let Some((partial, message)) = &self.script.lock().unwrap().fail_apply {
            next.tf_state.clone_from(partial);
            return Err(StepFailure::new(next, CoreError::Validation(message.clone())));
        }
        next.tf_state = format!("applied-{}", state.lb.lb_type);
        Ok(next)
    }

    fn destroy(&self, state: &State) -> Result<State, StepFailure> {
        self.journal.log("tf destroy");
        let mut next = state.clone();
        next.tf_state.clear();
        Ok(next)
    }

    fn outputs(&self, _state: &State) -> Result<Outputs, CoreError> {
        Ok(Outputs::new(BTreeMap::from([
            ("director_address".to_owned(), json!("https://10.0.0.6:25555")),
            ("jumpbox_url".to_owned(), json!("35.1.2.3:22")),
        ])))
    }

    fn version(&self) -> Result<String, CoreError> {
        Ok("0.11.14".to_owned())
    }
}

pub struct FakeDirector {
    journal: Arc<Journal>,
}

impl DirectorManager for FakeDirector {
    fn is_jumpbox_initialized(&self, _iaas: Iaas) -> bool {
        true
    }

    fn initialize_jumpbox(&self, _state: &State) -> Result<(), CoreError> {
        self.journal.log("init jumpbox");
        Ok(())
    }

    fn create_jumpbox(&self, state: &State, _outputs: &Outputs) -> Result<State, StepFailure> {
        self.journal.log("create jumpbox");
        let mut next = state.clone();
        next.jumpbox.state = Some(ComponentState::new());
        Ok(next)
    }

    fn delete_jumpbox(&self, _state: &State, _outputs: &Outputs) -> Result<(), CoreError> {
        self.journal.log("delete jumpbox");
        Ok(())
    }

    fn is_director_initialized(&self, _iaas: Iaas) -> bool {
        true
    }

    fn initialize_director(&self, _state: &State) -> Result<(), CoreError> {
        self.journal.log("init director");
        Ok(())
    }

    fn create_director(&self, state: &State, _outputs: &Outputs) -> Result<State, StepFailure> {
        self.journal.log("create director");
        let mut next = state.clone();
        next.bosh.state = Some(ComponentState::new());
        Ok(next)
    }

    fn delete_director(&self, _state: &State, _outputs: &Outputs) -> Result<(), CoreError> {
        self.journal.log("delete director");
        Ok(())
    }

    fn version(&self) -> Result<String, CoreError> {
        Ok("2.0.48".to_owned())
    }
}

#[derive(Default)]
pub struct CloudConfigScript {
    pub fail_initialize: bool,
    pub fail_update: bool,
}

pub struct FakeCloudConfig {
    journal: Arc<Journal>,
    pub script: Mutex<CloudConfigScript>,
    pub updated: Mutex<Vec<State>>,
}

impl CloudConfigManager for FakeCloudConfig {
    fn initialize(&self, _state: &State, _outputs: &Outputs) -> Result<(), CoreError> {
        self.journal.log("cc initialize");
        if self.script.lock().unwrap().fail_initialize {
            return Err(CoreError::Validation("failed to initialize".to_owned()));
        }
        Ok(())
    }

    fn update(&self, state: &State) -> Result<(), CoreError> {
        self.journal.log("cc update");
        self.updated.lock().unwrap().push(state.clone());
        if self.script.lock().unwrap().fail_update {
            return Err(CoreError::Validation("failed to update".to_owned()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub engine: Engine,
    pub journal: Arc<Journal>,
    pub store: Arc<FakeStore>,
    pub infra: Arc<FakeInfra>,
    pub cloud_config: Arc<FakeCloudConfig>,
}

pub fn harness() -> Harness {
    let journal = Arc::new(Journal::default());
    let store = Arc::new(FakeStore {
        journal: journal.clone(),
        sets: Mutex::new(Vec::new()),
        failing_sets: Mutex::new(HashSet::new()),
    });
    let infra = Arc::new(FakeInfra {
        journal: journal.clone(),
        script: Mutex::new(InfraScript::default()),
        applied: Mutex::new(Vec::new()),
    });
    let director = Arc::new(FakeDirector {
        journal: journal.clone(),
    });
    let cloud_config = Arc::new(FakeCloudConfig {
        journal: journal.clone(),
        script: Mutex::new(CloudConfigScript::default()),
        updated: Mutex::new(Vec::new()),
    });
    let engine = Engine::new(
        store.clone(),
        infra.clone(),
        director,
        cloud_config.clone(),
    );
    Harness {
        engine,
        journal,
        store,
        infra,
        cloud_config,
    }
}

/// A provisioned AWS environment with a jumpbox and director.
pub fn provisioned() -> State {
    let mut state = State::new();
    state.iaas = Some(Iaas::Aws);
    state.env_id = EnvId::new("lake");
    state.aws.region = "us-west-1".to_owned();
    state.tf_state = "applied-none".to_owned();
    state.jumpbox.state = Some(ComponentState::new());
    state.bosh.state = Some(ComponentState::new());
    state
}
