//! Lifecycle orchestration for bootloader environments.
//!
//! The [`Engine`] sequences the IaC and director-install managers through
//! each lifecycle transition (bring-up, load balancer attach/detach,
//! teardown), persisting the environment descriptor after every externally
//! visible step. When a step fails after a partial effect, the partial
//! descriptor is persisted before the failure is reported, and a failure of
//! that persist is reported alongside the original error rather than
//! replacing it ([`ErrorList`]).

pub mod cloud_config;
pub mod concurrency;
pub mod config;
pub mod deployment_vars;
pub mod director;
pub mod engine;
pub mod infrastructure;
pub mod inputs;
pub mod lifecycle;
pub mod managers;

pub use cloud_config::BoshCloudConfig;
pub use concurrency::{install_signal_handler, shutdown_requested, StateLock};
pub use config::Config;
pub use director::BoshManager;
pub use engine::{CreateLbsOptions, Engine, LbReport, ToolVersions, UpOptions};
pub use infrastructure::TerraformManager;
pub use lifecycle::{validate_transition, EnvPhase};
pub use managers::{
    CloudConfigManager, DirectorManager, InfrastructureManager, StateWriter, StepFailure,
};

use bootloader_schema::LbType;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),
    #[error(
        "a {existing} load balancer is already attached, remove it before attaching a {requested} load balancer"
    )]
    LbConflict { existing: LbType, requested: LbType },
    #[error("could not read {what} at {}: {source}", path.display())]
    ReadInput {
        what: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no environment found; run `bootloader up` first")]
    EnvNotFound,
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: EnvPhase, to: EnvPhase },
    #[error("config error in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("schema error: {0}")]
    Schema(#[from] bootloader_schema::SchemaError),
    #[error("store error: {0}")]
    Store(#[from] bootloader_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] bootloader_runtime::RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("state directory {} is locked by another bootloader process", .0.display())]
    Locked(PathBuf),
    #[error("interrupted; state was saved after the last completed step")]
    Interrupted,
    #[error("{0}")]
    Multiple(ErrorList),
}

impl CoreError {
    /// Bad operator input, reported before any external tool ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::Validation(_)
                | CoreError::LbConflict { .. }
                | CoreError::ReadInput { .. }
                | CoreError::EnvNotFound
                | CoreError::InvalidTransition { .. }
                | CoreError::Config { .. }
                | CoreError::Schema(_)
        )
    }

    /// The descriptor could not be read or written.
    pub fn is_persistence(&self) -> bool {
        match self {
            CoreError::Store(_) => true,
            CoreError::Multiple(list) => list.iter().any(CoreError::is_persistence),
            _ => false,
        }
    }
}

/// An ordered collection of failures reported together.
///
/// Entries are never dropped or merged; the display lists every message in
/// the order the failures happened.
#[derive(Debug, Default)]
pub struct ErrorList(Vec<CoreError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CoreError) {
        self.0.push(error);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoreError> {
        self.0.iter()
    }

    /// `Ok` when empty, the sole error when there is one, otherwise
    /// [`CoreError::Multiple`].
    pub fn into_result(mut self) -> Result<(), CoreError> {
        match self.0.len() {
            0 => Ok(()),
            1 => Err(self.0.remove(0)),
            _ => Err(CoreError::Multiple(self)),
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the following errors occurred:")?;
        for (i, e) in self.0.iter().enumerate() {
            let sep = if i == 0 { "\n" } else { ",\n" };
            write!(f, "{sep}{e}")?;
        }
        Ok(())
    }
}

impl From<Vec<CoreError>> for ErrorList {
    fn from(errors: Vec<CoreError>) -> Self {
        Self(errors)
    }
}

/// Report `first` and `second` together, in that order.
pub fn combine(first: CoreError, second: CoreError) -> CoreError {
    CoreError::Multiple(ErrorList(vec![first, second]))
}
