//! IaC tool executor.
//!
//! Every mutating operation takes the current state blob in and hands the
//! next one back; nothing is left in hidden tool-local state that the
//! environment descriptor does not also record.

use crate::command::{CommandRunner, Invocation};
use crate::templates::import_template;
use crate::version::parse_version;
use crate::{ExecutorError, Operation, RuntimeError};
use bootloader_schema::AwsCredentials;
use bootloader_store::{write_file_atomic, StateLayout};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const TOOL: &str = "terraform";
const TEMPLATE_FILE: &str = "template.tf";
const PLUGIN_DIR: &str = ".terraform";

/// Adopt an out-of-band resource into the IaC state.
#[derive(Debug, Clone)]
pub struct ImportInput {
    /// `<type>.<name>`, optionally with an index suffix (`aws_elb.lb[0]`).
    pub address: String,
    pub resource_id: String,
    pub tf_state: String,
    pub credentials: AwsCredentials,
}

/// Decoded IaC outputs: name to value, with the sensitivity/type wrapper
/// stripped. Derived data; always re-derivable from the state blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outputs(BTreeMap<String, Value>);

impl Outputs {
    pub fn new(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The named output as a string, or empty if it is missing or not a string.
    pub fn get_string(&self, name: &str) -> String {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    }

    pub fn get_string_list(&self, name: &str) -> Vec<String> {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Outputs {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One entry of `output --json`. The `sensitive` and `type` fields are
/// ignored.
#[derive(Debug, Deserialize)]
struct TfOutput {
    value: Value,
}

/// Drives the IaC tool inside `<state-dir>/terraform`, with its state file
/// kept at `<state-dir>/vars/terraform.tfstate`.
pub struct TerraformExecutor {
    runner: Arc<dyn CommandRunner>,
    binary: PathBuf,
    layout: StateLayout,
    debug: bool,
}

impl TerraformExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        binary: impl Into<PathBuf>,
        layout: StateLayout,
        debug: bool,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            layout,
            debug,
        }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    fn invocation(&self) -> Invocation {
        let inv = Invocation::new(&self.binary).current_dir(self.layout.terraform_dir());
        if self.debug {
            inv.env("TF_LOG", "debug")
        } else {
            inv
        }
    }

    fn state_arg(&self) -> String {
        self.layout.tf_state_file_relative().display().to_string()
    }

    fn run(&self, inv: &Invocation, stdout: &mut dyn Write) -> Result<(), RuntimeError> {
        debug!("{TOOL}: {}", inv.args.join(" "));
        self.runner.run(inv, stdout)
    }

    /// The state blob currently on disk, if there is one.
    fn read_tf_state(&self) -> Result<Option<String>, io::Error> {
        match fs::read_to_string(self.layout.tf_state_file()) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_tf_state(&self, tf_state: &str) -> Result<(), io::Error> {
        write_file_atomic(&self.layout.tf_state_file(), tf_state.as_bytes(), 0o600)
    }

    fn init_error(&self, reason: impl std::fmt::Display) -> RuntimeError {
        ExecutorError::new(TOOL, Operation::Init, reason)
            .with_debug(self.debug)
            .into()
    }

    /// Stage `template`, seed the state file from `prev_tf_state` when it is
    /// non-empty, and run the tool's initialization. Callers must not apply
    /// or destroy after this fails.
    pub fn init(&self, template: &str, prev_tf_state: &str) -> Result<(), RuntimeError> {
        info!("initializing {TOOL}");
        let tf_dir = self.layout.terraform_dir();

        write_file_atomic(&tf_dir.join(TEMPLATE_FILE), template.as_bytes(), 0o644)
            .map_err(|e| self.init_error(format!("write template: {e}")))?;

        if !prev_tf_state.is_empty() {
            self.write_tf_state(prev_tf_state)
                .map_err(|e| self.init_error(format!("write previous state: {e}")))?;
        }

        let plugin_dir = tf_dir.join(PLUGIN_DIR);
        fs::create_dir_all(&plugin_dir)
            .map_err(|e| self.init_error(format!("create {PLUGIN_DIR} directory: {e}")))?;
        write_file_atomic(&plugin_dir.join(".gitignore"), b"*\n", 0o644)
            .map_err(|e| self.init_error(format!("write {PLUGIN_DIR}/.gitignore: {e}")))?;

        self.run(&self.invocation().arg("init"), &mut io::stdout())
            .map_err(|e| self.init_error(e))
    }

    fn reconcile(
        &self,
        operation: Operation,
        leading: &[&str],
        variables: &BTreeMap<String, String>,
    ) -> Result<String, RuntimeError> {
        let mut inv = self
            .invocation()
            .args(leading.iter().copied())
            .args(["-state".to_owned(), self.state_arg()]);
        for (name, value) in variables {
            inv = inv.arg("-var").arg(format!("{name}={value}"));
        }

        if let Err(e) = self.run(&inv, &mut io::stdout()) {
            // Carry whatever the tool managed to record before it failed.
            let err = match self.read_tf_state() {
                Ok(tf_state) => ExecutorError::new(TOOL, operation, e).with_tf_state(tf_state),
                Err(read_err) => ExecutorError::new(
                    TOOL,
                    operation,
                    format!("{e} (reading state after failure: {read_err})"),
                ),
            };
            return Err(err.with_debug(self.debug).into());
        }

        Ok(fs::read_to_string(self.layout.tf_state_file())?)
    }

    /// Reconcile resources against the staged template. Returns the state
    /// blob read back from disk.
    pub fn apply(&self, variables: &BTreeMap<String, String>) -> Result<String, RuntimeError> {
        info!("applying {TOOL} template");
        self.reconcile(Operation::Apply, &["apply"], variables)
    }

    /// Forced, non-interactive teardown of everything in the state file.
    pub fn destroy(&self, variables: &BTreeMap<String, String>) -> Result<String, RuntimeError> {
        info!("destroying {TOOL} resources");
        self.reconcile(Operation::Destroy, &["destroy", "-force"], variables)
    }

    pub fn import(&self, input: &ImportInput) -> Result<String, RuntimeError> {
        let (resource_type, rest) = input
            .address
            .split_once('.')
            .ok_or_else(|| RuntimeError::InvalidAddress(input.address.clone()))?;
        let resource_name = rest.split('[').next().unwrap_or(rest);
        if resource_type.is_empty() || resource_name.is_empty() {
            return Err(RuntimeError::InvalidAddress(input.address.clone()));
        }
        info!("importing {} as {}", input.resource_id, input.address);

        // The prior blob replaces whatever an earlier run left on disk, even
        // when it is empty.
        self.write_tf_state(&input.tf_state)
            .map_err(|e| self.init_error(format!("write previous state: {e}")))?;
        let template = import_template(resource_type, resource_name, &input.credentials);
        self.init(&template, &input.tf_state)?;

        let inv = self.invocation().args([
            "import".to_owned(),
            input.address.clone(),
            input.resource_id.clone(),
            "-state".to_owned(),
            self.state_arg(),
        ]);
        self.run(&inv, &mut io::stdout()).map_err(|e| {
            RuntimeError::from(ExecutorError::new(TOOL, Operation::Import, e).with_debug(self.debug))
        })?;

        Ok(fs::read_to_string(self.layout.tf_state_file())?)
    }

    fn capture_output(&self, args: Vec<String>) -> Result<Vec<u8>, RuntimeError> {
        let mut buf = Vec::new();
        self.run(&self.invocation().args(args), &mut buf)
            .map_err(|e| ExecutorError::new(TOOL, Operation::Output, e).with_debug(self.debug))?;
        Ok(buf)
    }

    fn prepare_outputs(&self, tf_state: &str) -> Result<(), RuntimeError> {
        self.write_tf_state(tf_state)
            .map_err(|e| self.init_error(format!("write state: {e}")))?;
        self.run(&self.invocation().arg("init"), &mut io::sink())
            .map_err(|e| self.init_error(e))
    }

    /// A single named output, trailing newline stripped.
    pub fn output(&self, tf_state: &str, name: &str) -> Result<String, RuntimeError> {
        self.prepare_outputs(tf_state)?;
        let raw = self.capture_output(vec![
            "output".to_owned(),
            name.to_owned(),
            "-state".to_owned(),
            self.state_arg(),
        ])?;
        let text = String::from_utf8(raw).map_err(|e| RuntimeError::OutputDecode {
            what: format!("{TOOL} output {name}"),
            reason: e.to_string(),
        })?;
        Ok(text.strip_suffix('\n').unwrap_or(&text).to_owned())
    }

    /// Every output recorded in `tf_state`.
    pub fn outputs(&self, tf_state: &str) -> Result<Outputs, RuntimeError> {
        self.prepare_outputs(tf_state)?;
        let raw = self.capture_output(vec![
            "output".to_owned(),
            "-state".to_owned(),
            self.state_arg(),
            "--json".to_owned(),
        ])?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Outputs::default());
        }
        let decoded: BTreeMap<String, TfOutput> =
            serde_json::from_slice(&raw).map_err(|e| RuntimeError::OutputDecode {
                what: format!("{TOOL} output --json"),
                reason: e.to_string(),
            })?;
        Ok(decoded.into_iter().map(|(k, v)| (k, v.value)).collect())
    }

    pub fn version(&self) -> Result<String, RuntimeError> {
        let mut buf = Vec::new();
        self.runner
            .run(&Invocation::new(&self.binary).arg("version"), &mut buf)?;
        parse_version(TOOL, &String::from_utf8_lossy(&buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingRunner;

    fn executor(runner: Arc<RecordingRunner>, debug: bool) -> (tempfile::TempDir, TerraformExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, TerraformExecutor::new(runner, "terraform", layout, debug))
    }

    #[test]
    fn init_stages_template_and_plugin_dir() {
        let runner = Arc::new(RecordingRunner::new());
        let (_dir, tf) = executor(runner.clone(), false);
        tf.init("resource {}", "").unwrap();

        let tf_dir = tf.layout().terraform_dir();
        assert_eq!(fs::read_to_string(tf_dir.join(TEMPLATE_FILE)).unwrap(), "resource {}");
        assert_eq!(
            fs::read_to_string(tf_dir.join(".terraform/.gitignore")).unwrap(),
            "*\n"
        );
        assert!(!tf.layout().tf_state_file().exists());

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["init"]);
        assert!(calls[0].cwd_is(&tf_dir));
        assert!(calls[0].env_value("TF_LOG").is_none());
    }

    #[test]
    fn init_seeds_previous_state() {
        let runner = Arc::new(RecordingRunner::new());
        let (_dir, tf) = executor(runner, true);
        tf.init("t", "{\"serial\": 4}").unwrap();
        assert_eq!(
            fs::read_to_string(tf.layout().tf_state_file()).unwrap(),
            "{\"serial\": 4}"
        );
    }

    #[test]
    fn debug_sets_tool_log_level() {
        let runner = Arc::new(RecordingRunner::new());
        let (_dir, tf) = executor(runner.clone(), true);
        tf.init("t", "").unwrap();
        assert_eq!(runner.calls()[0].env_value("TF_LOG"), Some("debug"));
    }

    #[test]
    fn outputs_strip_metadata_wrapper() {
        let runner = Arc::new(RecordingRunner::with_handler(|inv, out| {
            if inv.has_args(&["output"]) {
                out.write_all(
                    br#"{"jumpbox_url": {"sensitive": false, "type": "string", "value": "1.2.3.4:22"},
                        "groups": {"sensitive": false, "type": "list", "value": ["sg-1", "sg-2"]}}"#,
                )?;
            }
            Ok(())
        }));
        let (_dir, tf) = executor(runner.clone(), false);
        let outputs = tf.outputs("{}").unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs.get_string("jumpbox_url"), "1.2.3.4:22");
        assert_eq!(outputs.get_string_list("groups"), vec!["sg-1", "sg-2"]);
        assert_eq!(outputs.get_string("missing"), "");

        let calls = runner.calls();
        assert_eq!(calls[0].args, vec!["init"]);
        assert_eq!(
            calls[1].args,
            vec!["output", "-state", "../vars/terraform.tfstate", "--json"]
        );
    }

    #[test]
    fn single_output_strips_trailing_newline() {
        let runner = Arc::new(RecordingRunner::with_handler(|inv, out| {
            if inv.has_args(&["output", "external_ip"]) {
                out.write_all(b"35.1.2.3\n")?;
            }
            Ok(())
        }));
        let (_dir, tf) = executor(runner, false);
        assert_eq!(tf.output("{}", "external_ip").unwrap(), "35.1.2.3");
    }

    #[test]
    fn malformed_outputs_are_a_decode_error() {
        let runner = Arc::new(RecordingRunner::with_handler(|inv, out| {
            if inv.has_args(&["output"]) {
                out.write_all(b"not json")?;
            }
            Ok(())
        }));
        let (_dir, tf) = executor(runner, false);
        assert!(matches!(
            tf.outputs("{}"),
            Err(RuntimeError::OutputDecode { .. })
        ));
    }

    #[test]
    fn version_takes_first_triple() {
        let runner = Arc::new(RecordingRunner::with_handler(|_, out| {
            out.write_all(b"Terraform v0.11.7\n+ provider.aws v1.8.0\n")?;
            Ok(())
        }));
        let (_dir, tf) = executor(runner, false);
        assert_eq!(tf.version().unwrap(), "0.11.7");
    }

    #[test]
    fn import_rejects_address_without_name() {
        let runner = Arc::new(RecordingRunner::new());
        let (_dir, tf) = executor(runner.clone(), false);
        let input = ImportInput {
            address: "aws_elb".to_owned(),
            resource_id: "lb-1".to_owned(),
            tf_state: String::new(),
            credentials: AwsCredentials::default(),
        };
        assert!(matches!(
            tf.import(&input),
            Err(RuntimeError::InvalidAddress(_))
        ));
        assert_eq!(runner.call_count(), 0);
    }
}
