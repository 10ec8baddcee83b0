//! External tool execution for bootloader.
//!
//! This crate drives the two provisioning tools an environment depends on:
//! the IaC tool ([`TerraformExecutor`]) and the director-install tool
//! ([`BoshExecutor`]). Both go through the narrow [`CommandRunner`]
//! capability so that orchestration code can be exercised against a
//! [`RecordingRunner`] without spawning anything. Base manifests, overlays
//! and IaC templates are embedded at compile time ([`assets`], [`templates`]).

pub mod assets;
pub mod bosh;
pub mod command;
pub mod mock;
pub mod prereq;
pub mod templates;
pub mod terraform;
pub mod version;

pub use bosh::{
    BoshExecutor, CloudConfigUpdate, CreateEnvInput, CreateEnvOutput, DeleteEnvInput,
    InterpolateInput, STATE_DIR_ENV,
};
pub use command::{CommandRunner, Invocation, ProcessRunner};
pub use mock::RecordingRunner;
pub use prereq::{check_prereqs, format_missing, MissingPrereq};
pub use terraform::{ImportInput, Outputs, TerraformExecutor};
pub use version::{check_minimum, parse_version, DEV_BUILD};

use std::fmt;
use thiserror::Error;

/// Operation of an external tool that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Init,
    Apply,
    Destroy,
    Import,
    Output,
    CreateEnv,
    DeleteEnv,
    UpdateCloudConfig,
    Version,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Init => "init",
            Operation::Apply => "apply",
            Operation::Destroy => "destroy",
            Operation::Import => "import",
            Operation::Output => "output",
            Operation::CreateEnv => "create-env",
            Operation::DeleteEnv => "delete-env",
            Operation::UpdateCloudConfig => "update-cloud-config",
            Operation::Version => "version",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An external tool invocation failed.
///
/// For mutating IaC operations the error carries the state blob that was on
/// disk when the tool exited, so the caller can still persist whatever the
/// tool managed to provision before failing.
#[derive(Debug, Clone, Error)]
#[error("{tool} {operation} failed: {reason}")]
pub struct ExecutorError {
    pub tool: &'static str,
    pub operation: Operation,
    pub reason: String,
    pub tf_state: Option<String>,
    /// Whether the tool ran with verbose diagnostics enabled.
    pub debug: bool,
}

impl ExecutorError {
    pub fn new(tool: &'static str, operation: Operation, reason: impl fmt::Display) -> Self {
        Self {
            tool,
            operation,
            reason: reason.to_string(),
            tf_state: None,
            debug: false,
        }
    }

    #[must_use]
    pub fn with_tf_state(mut self, tf_state: Option<String>) -> Self {
        self.tf_state = tf_state;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error("runtime serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{program} exited with {status}")]
    ExitStatus { program: String, status: String },
    #[error("'{0}' not found; is it installed and on PATH?")]
    ToolUnavailable(String),
    #[error("{tool} version could not be parsed")]
    VersionParse { tool: &'static str },
    #[error("{tool} version {found} is older than the minimum supported {minimum}")]
    VersionTooOld {
        tool: &'static str,
        found: String,
        minimum: String,
    },
    #[error("failed to decode {what}: {reason}")]
    OutputDecode { what: String, reason: String },
    #[error("invalid resource address '{0}', expected <type>.<name>")]
    InvalidAddress(String),
}

impl RuntimeError {
    /// The IaC state blob captured when an executor failed, if any.
    pub fn tf_state(&self) -> Option<&str> {
        match self {
            RuntimeError::Executor(e) => e.tf_state.as_deref(),
            _ => None,
        }
    }
}
