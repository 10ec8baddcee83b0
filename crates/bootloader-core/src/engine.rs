use crate::cloud_config::BoshCloudConfig;
use crate::concurrency::shutdown_requested;
use crate::config::Config;
use crate::director::BoshManager;
use crate::infrastructure::TerraformManager;
use crate::lifecycle::{validate_transition, EnvPhase};
use crate::managers::{
    CloudConfigManager, DirectorManager, InfrastructureManager, StateWriter, StepFailure,
};
use crate::{combine, CoreError};
use bootloader_runtime::{check_minimum, BoshExecutor, CommandRunner, Outputs, TerraformExecutor};
use bootloader_schema::{generate_env_id, Director, Iaas, Jumpbox, LbType, LoadBalancer, State};
use bootloader_store::StateStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MIN_TERRAFORM_VERSION: &str = "0.11.0";
const MIN_BOSH_VERSION: &str = "2.0.48";

/// Sequences the managers through every lifecycle transition.
///
/// Every operation takes the current descriptor and returns the next one.
/// The descriptor is persisted after each externally visible step, and a
/// step that fails part way persists its partial descriptor before the
/// failure is reported.
pub struct Engine {
    store: Arc<dyn StateWriter>,
    infra: Arc<dyn InfrastructureManager>,
    director: Arc<dyn DirectorManager>,
    cloud_config: Arc<dyn CloudConfigManager>,
}

#[derive(Debug, Clone, Default)]
pub struct UpOptions {
    pub iaas: Option<Iaas>,
    pub no_director: bool,
    /// Contents of an operator-supplied director overlay.
    pub ops_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateLbsOptions {
    pub lb_type: LbType,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub chain_path: Option<PathBuf>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolVersions {
    pub terraform: String,
    pub bosh: String,
}

/// Load balancer attached to an environment and the IaC outputs describing it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LbReport {
    pub lb_type: LbType,
    pub domain: String,
    pub outputs: BTreeMap<String, serde_json::Value>,
}

fn read_input(what: &'static str, path: &Path) -> Result<String, CoreError> {
    fs::read_to_string(path).map_err(|source| CoreError::ReadInput {
        what,
        path: path.to_path_buf(),
        source,
    })
}

fn check_credentials(state: &State, iaas: Iaas) -> Result<(), CoreError> {
    let required = match iaas {
        Iaas::Aws => vec![
            ("access key id", &state.aws.access_key_id),
            ("secret access key", &state.aws.secret_access_key),
            ("region", &state.aws.region),
        ],
        Iaas::Gcp => vec![
            ("service account key", &state.gcp.service_account_key),
            ("project id", &state.gcp.project_id),
            ("zone", &state.gcp.zone),
            ("region", &state.gcp.region),
        ],
    };
    let missing: Vec<&str> = required
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(CoreError::Validation(format!(
        "missing {iaas} credentials: {}",
        missing.join(", ")
    )))
}

fn require_env(state: &State) -> Result<(), CoreError> {
    if state.env_id.is_empty() {
        return Err(CoreError::EnvNotFound);
    }
    Ok(())
}

impl Engine {
    pub fn new(
        store: Arc<dyn StateWriter>,
        infra: Arc<dyn InfrastructureManager>,
        director: Arc<dyn DirectorManager>,
        cloud_config: Arc<dyn CloudConfigManager>,
    ) -> Self {
        Self {
            store,
            infra,
            director,
            cloud_config,
        }
    }

    /// Wire the production managers over `store`'s state directory.
    pub fn with_tools(store: StateStore, runner: Arc<dyn CommandRunner>, config: &Config) -> Self {
        let layout = store.layout().clone();
        let terraform = TerraformExecutor::new(
            runner.clone(),
            config.terraform_path(),
            layout.clone(),
            config.debug,
        );
        let bosh = BoshExecutor::new(runner, config.bosh_path(), layout);
        Self::new(
            Arc::new(store),
            Arc::new(TerraformManager::new(terraform)),
            Arc::new(BoshManager::new(bosh.clone())),
            Arc::new(BoshCloudConfig::new(bosh)),
        )
    }

    /// Persist the outcome of a step. A failed step's partial descriptor is
    /// persisted too; if that write also fails both errors are reported.
    fn persist_step(&self, result: Result<State, StepFailure>) -> Result<State, CoreError> {
        match result {
            Ok(next) => {
                self.store.set(&next)?;
                Ok(next)
            }
            Err(StepFailure { state, error }) => match self.store.set(&state) {
                Ok(()) => Err(error),
                Err(set_err) => Err(combine(error, set_err)),
            },
        }
    }

    fn checkpoint(&self) -> Result<(), CoreError> {
        if shutdown_requested() {
            warn!("stopping after the last saved step");
            return Err(CoreError::Interrupted);
        }
        Ok(())
    }

    /// Resolve the descriptor `up` and `plan` work from.
    fn prepare(&self, state: &State, opts: &UpOptions) -> Result<State, CoreError> {
        let iaas = match (state.iaas, opts.iaas) {
            (Some(existing), Some(requested)) if existing != requested => {
                return Err(CoreError::Validation(format!(
                    "environment {} runs on {existing}, cannot bring it up on {requested}",
                    state.env_id
                )));
            }
            (Some(iaas), _) | (None, Some(iaas)) => iaas,
            (None, None) => {
                return Err(CoreError::Validation(
                    "--iaas is required for a new environment".to_owned(),
                ));
            }
        };

        if opts.no_director && state.bosh.is_created() {
            return Err(CoreError::Validation(
                "--no-director cannot be used on an environment that already has a director"
                    .to_owned(),
            ));
        }

        let mut next = state.clone();
        next.iaas = Some(iaas);
        check_credentials(&next, iaas)?;
        next.no_director = state.no_director || opts.no_director;
        if next.env_id.is_empty() {
            next.env_id = generate_env_id(chrono::Utc::now());
            info!("generated env id {}", next.env_id);
        }
        if let Some(ops) = &opts.ops_file {
            next.bosh.user_ops_file.clone_from(ops);
        }
        Ok(next)
    }

    fn check_versions(&self, no_director: bool) -> Result<(), CoreError> {
        let terraform = self.infra.version()?;
        check_minimum("terraform", &terraform, MIN_TERRAFORM_VERSION)?;
        if !no_director {
            let bosh = self.director.version()?;
            check_minimum("bosh", &bosh, MIN_BOSH_VERSION)?;
        }
        Ok(())
    }

    fn update_cloud_config(&self, state: &State) -> Result<(), CoreError> {
        let outputs = self.infra.outputs(state)?;
        self.cloud_config.initialize(state, &outputs)?;
        self.cloud_config.update(state)
    }

    /// Bring an environment up: networking, the jumpbox and, unless
    /// `no_director` is set, the director and its cloud config.
    pub fn up(&self, state: &State, opts: &UpOptions) -> Result<State, CoreError> {
        let mut next = self.prepare(state, opts)?;
        info!(
            "bringing up {} on {}",
            next.env_id,
            next.iaas.map(Iaas::as_str).unwrap_or_default()
        );

        self.check_versions(next.no_director)?;
        self.store.set(&next)?;
        self.checkpoint()?;

        self.infra.init(&next)?;
        next = self.persist_step(self.infra.apply(&next))?;
        self.checkpoint()?;

        next = self.create_jumpbox(&next)?;
        if next.no_director {
            info!("skipping director for {}", next.env_id);
            return Ok(next);
        }
        self.checkpoint()?;

        if opts.ops_file.is_some() {
            self.director.initialize_director(&next)?;
        }
        next = self.create_director(&next)?;
        self.checkpoint()?;

        self.update_cloud_config(&next)?;
        Ok(next)
    }

    /// Stage every template, setup file and script `up` would use without
    /// running any mutating tool operation.
    pub fn plan(&self, state: &State, opts: &UpOptions) -> Result<State, CoreError> {
        let next = self.prepare(state, opts)?;
        info!("planning {}", next.env_id);
        self.store.set(&next)?;

        self.infra.init(&next)?;
        let outputs = self.infra.outputs(&next)?;
        self.director.initialize_jumpbox(&next)?;
        if !next.no_director {
            self.director.initialize_director(&next)?;
            self.cloud_config.initialize(&next, &outputs)?;
        }
        Ok(next)
    }

    pub fn create_jumpbox(&self, state: &State) -> Result<State, CoreError> {
        let iaas = state
            .iaas
            .ok_or_else(|| CoreError::Validation("environment has no iaas set".to_owned()))?;
        info!("creating jumpbox for {}", state.env_id);
        let outputs = self.infra.outputs(state)?;
        if !self.director.is_jumpbox_initialized(iaas) {
            debug!("jumpbox setup files missing, materializing");
            self.director.initialize_jumpbox(state)?;
        }
        self.persist_step(self.director.create_jumpbox(state, &outputs))
    }

    pub fn create_director(&self, state: &State) -> Result<State, CoreError> {
        let iaas = state
            .iaas
            .ok_or_else(|| CoreError::Validation("environment has no iaas set".to_owned()))?;
        // A director is only installed into existing networking.
        validate_transition(EnvPhase::of(state), EnvPhase::DirectorInstalled)?;
        info!("creating director for {}", state.env_id);
        let outputs = self.infra.outputs(state)?;
        if !self.director.is_director_initialized(iaas) {
            debug!("director setup files missing, materializing");
            self.director.initialize_director(state)?;
        }
        self.persist_step(self.director.create_director(state, &outputs))
    }

    /// Attach a load balancer, or refresh the certificate of the attached one.
    pub fn create_lbs(&self, state: &State, opts: &CreateLbsOptions) -> Result<State, CoreError> {
        require_env(state)?;
        if opts.lb_type == LbType::None {
            return Err(CoreError::Validation(
                "a load balancer type is required (cf or concourse)".to_owned(),
            ));
        }
        if state.lb.is_attached() && state.lb.lb_type != opts.lb_type {
            return Err(CoreError::LbConflict {
                existing: state.lb.lb_type,
                requested: opts.lb_type,
            });
        }

        let cert = read_input("certificate", &opts.cert_path)?;
        let key = read_input("private key", &opts.key_path)?;
        let chain = match &opts.chain_path {
            Some(path) => read_input("certificate chain", path)?,
            None => String::new(),
        };

        let mut next = state.clone();
        next.lb = LoadBalancer {
            lb_type: opts.lb_type,
            cert,
            key,
            chain,
            domain: opts
                .domain
                .clone()
                .unwrap_or_else(|| state.lb.domain.clone()),
        };
        info!("attaching {} load balancer to {}", opts.lb_type, next.env_id);
        self.store.set(&next)?;

        self.infra.init(&next)?;
        next = self.persist_step(self.infra.apply(&next))?;
        if next.no_director {
            return Ok(next);
        }

        self.update_cloud_config(&next)?;
        self.store.set(&next)?;
        Ok(next)
    }

    /// Detach the load balancer. The cloud config stops referencing it
    /// before the IaC resources are removed.
    pub fn delete_lbs(&self, state: &State) -> Result<State, CoreError> {
        require_env(state)?;
        if !state.lb.is_attached() {
            info!("no load balancer attached to {}", state.env_id);
            return Ok(state.clone());
        }
        info!("removing {} load balancer from {}", state.lb.lb_type, state.env_id);

        let mut next = state.clone();
        next.lb = LoadBalancer::default();
        if !next.no_director && next.bosh.is_created() {
            self.update_cloud_config(&next)?;
        }
        self.store.set(&next)?;

        self.infra.init(&next)?;
        self.persist_step(self.infra.apply(&next))
    }

    pub fn delete_director(&self, state: &State) -> Result<State, CoreError> {
        if !state.bosh.is_created() && state.bosh.variables.is_empty() {
            debug!("no director to delete");
            return Ok(state.clone());
        }
        info!("deleting director for {}", state.env_id);
        let outputs = self.infra.outputs(state)?;
        self.director.delete_director(state, &outputs)?;

        let mut next = state.clone();
        next.bosh = Director {
            user_ops_file: state.bosh.user_ops_file.clone(),
            ..Director::default()
        };
        self.store.set(&next)?;
        Ok(next)
    }

    pub fn delete_jumpbox(&self, state: &State) -> Result<State, CoreError> {
        if !state.jumpbox.is_created() && state.jumpbox.variables.is_empty() {
            debug!("no jumpbox to delete");
            return Ok(state.clone());
        }
        info!("deleting jumpbox for {}", state.env_id);
        let outputs = self.infra.outputs(state)?;
        self.director.delete_jumpbox(state, &outputs)?;

        let mut next = state.clone();
        next.jumpbox = Jumpbox::default();
        self.store.set(&next)?;
        Ok(next)
    }

    /// Tear the environment down in reverse order of creation and return the
    /// residual descriptor left on disk.
    pub fn destroy(&self, state: &State) -> Result<State, CoreError> {
        if state.env_id.is_empty() || state.is_empty() {
            return Err(CoreError::EnvNotFound);
        }
        info!("destroying {}", state.env_id);

        let mut next = self.delete_director(state)?;
        self.checkpoint()?;
        next = self.delete_jumpbox(&next)?;
        self.checkpoint()?;

        if !next.tf_state.is_empty() {
            self.infra.init(&next)?;
            next = self.persist_step(self.infra.destroy(&next))?;
        }
        self.store.clear(&next)
    }

    pub fn versions(&self) -> Result<ToolVersions, CoreError> {
        Ok(ToolVersions {
            terraform: self.infra.version()?,
            bosh: self.director.version()?,
        })
    }

    pub fn lbs(&self, state: &State) -> Result<LbReport, CoreError> {
        require_env(state)?;
        let outputs = if state.lb.is_attached() {
            let prefix = format!("{}_", state.lb.lb_type);
            lb_outputs(&self.infra.outputs(state)?, &prefix)
        } else {
            BTreeMap::new()
        };
        Ok(LbReport {
            lb_type: state.lb.lb_type,
            domain: state.lb.domain.clone(),
            outputs,
        })
    }
}

fn lb_outputs(outputs: &Outputs, prefix: &str) -> BTreeMap<String, serde_json::Value> {
    outputs
        .iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
