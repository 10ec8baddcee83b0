//! Director-install tool executor.
//!
//! Materializes a component's base manifest and overlays, then bakes the
//! complete `create-env`/`delete-env` argument list into two shell scripts at
//! the state directory root. The scripts are the only way the tool is run for
//! a component, so re-running them by hand reproduces exactly what bootloader
//! would do. Paths inside the state directory are written relative to
//! `${BOOTLOADER_STATE_DIR}` so the directory can be moved.

use crate::assets::{self, Overlay};
use crate::command::{CommandRunner, Invocation};
use crate::version::{parse_version, DEV_BUILD};
use crate::{ExecutorError, Operation, RuntimeError};
use bootloader_schema::{ComponentState, Iaas};
use bootloader_store::{write_file_atomic, Component, StateLayout};
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const TOOL: &str = "bosh";

/// Environment variable the generated scripts resolve state paths against.
pub const STATE_DIR_ENV: &str = "BOOTLOADER_STATE_DIR";

const USER_OPS_FILE: &str = "user-ops-file.yml";

/// Inputs for materializing a component's setup files and scripts.
#[derive(Debug, Clone, Copy)]
pub struct InterpolateInput<'a> {
    pub iaas: Iaas,
    /// State blob from the previous successful run, if any.
    pub state: Option<&'a ComponentState>,
    /// Previous variables store contents; empty on first creation.
    pub variables: &'a str,
    /// Operator-supplied overlay. Director only.
    pub ops_file: &'a str,
}

#[derive(Debug, Clone)]
pub struct CreateEnvInput {
    pub component: Component,
    pub deployment_vars: String,
}

#[derive(Debug, Clone)]
pub struct DeleteEnvInput {
    pub component: Component,
    pub deployment_vars: String,
}

/// What a successful `create-env` leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateEnvOutput {
    /// Contents of the variables store (generated credentials).
    pub variables: String,
    pub state: Option<ComponentState>,
}

/// Upload a cloud config to a running director.
#[derive(Debug, Clone)]
pub struct CloudConfigUpdate {
    pub cloud_config: PathBuf,
    pub ops_file: PathBuf,
    pub vars_file: PathBuf,
    pub director_address: String,
    pub director_username: String,
    pub director_password: String,
    pub director_ca_cert: String,
}

struct SetupFile {
    path: PathBuf,
    contents: Cow<'static, str>,
}

#[derive(Clone)]
pub struct BoshExecutor {
    runner: Arc<dyn CommandRunner>,
    binary: PathBuf,
    layout: StateLayout,
}

impl BoshExecutor {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<PathBuf>, layout: StateLayout) -> Self {
        Self {
            runner,
            binary: binary.into(),
            layout,
        }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn vars_store_path(&self, component: Component) -> PathBuf {
        self.layout
            .vars_dir()
            .join(format!("{component}-variables.yml"))
    }

    pub fn vars_file_path(&self, component: Component) -> PathBuf {
        self.layout
            .vars_dir()
            .join(format!("{component}-deployment-vars.yml"))
    }

    pub fn state_path(&self, component: Component) -> PathBuf {
        self.layout.vars_dir().join(format!("{component}-state.json"))
    }

    fn base_manifest(component: Component) -> Overlay {
        match component {
            Component::Jumpbox => assets::JUMPBOX_MANIFEST,
            Component::Director => assets::DIRECTOR_MANIFEST,
        }
    }

    fn overlays(component: Component, iaas: Iaas) -> &'static [Overlay] {
        match component {
            Component::Jumpbox => assets::jumpbox_overlays(iaas),
            Component::Director => assets::director_overlays(iaas),
        }
    }

    /// Base manifest first, then overlays in application order.
    fn setup_files(&self, component: Component, iaas: Iaas) -> Vec<SetupFile> {
        let dir = self.layout.deployment_dir(component);
        std::iter::once(Self::base_manifest(component))
            .chain(Self::overlays(component, iaas).iter().copied())
            .map(|o| SetupFile {
                path: dir.join(o.file_name),
                contents: Cow::Borrowed(o.contents),
            })
            .collect()
    }

    /// Every file whose presence means the component has been materialized.
    pub fn required_files(&self, component: Component, iaas: Iaas) -> Vec<PathBuf> {
        self.setup_files(component, iaas)
            .into_iter()
            .map(|f| f.path)
            .chain([
                self.layout.create_script(component),
                self.layout.delete_script(component),
            ])
            .collect()
    }

    fn is_initialized(&self, component: Component, iaas: Iaas) -> bool {
        self.required_files(component, iaas)
            .iter()
            .all(|p| p.exists())
    }

    pub fn is_jumpbox_initialized(&self, iaas: Iaas) -> bool {
        self.is_initialized(Component::Jumpbox, iaas)
    }

    pub fn is_director_initialized(&self, iaas: Iaas) -> bool {
        self.is_initialized(Component::Director, iaas)
    }

    pub fn jumpbox_create_env_args(&self, input: &InterpolateInput<'_>) -> Result<(), RuntimeError> {
        self.create_env_args(Component::Jumpbox, input)
    }

    pub fn director_create_env_args(&self, input: &InterpolateInput<'_>) -> Result<(), RuntimeError> {
        self.create_env_args(Component::Director, input)
    }

    fn create_env_args(&self, component: Component, input: &InterpolateInput<'_>) -> Result<(), RuntimeError> {
        info!("writing {component} setup files");
        let setup = self.setup_files(component, input.iaas);
        for f in &setup {
            debug!("staging {}", f.path.display());
            write_file_atomic(&f.path, f.contents.as_bytes(), 0o644)?;
        }

        let vars_store = self.vars_store_path(component);
        write_file_atomic(&vars_store, input.variables.as_bytes(), 0o600)?;

        let state_path = self.state_path(component);
        if let Some(state) = input.state {
            let json = serde_json::to_vec_pretty(state)?;
            write_file_atomic(&state_path, &json, 0o600)?;
        }

        let mut args = vec![
            path_arg(&setup[0].path),
            "--state".to_owned(),
            path_arg(&state_path),
            "--vars-store".to_owned(),
            path_arg(&vars_store),
            "--vars-file".to_owned(),
            path_arg(&self.vars_file_path(component)),
        ];
        for f in &setup[1..] {
            args.push("-o".to_owned());
            args.push(path_arg(&f.path));
        }

        if component == Component::Director {
            let user_ops = self.layout.vars_dir().join(USER_OPS_FILE);
            write_file_atomic(&user_ops, input.ops_file.as_bytes(), 0o644)?;
            if !input.ops_file.is_empty() {
                args.push("-o".to_owned());
                args.push(path_arg(&user_ops));
            }
        }

        let root = self.layout.root();
        let create = format_script(&self.binary, root, "create-env", &args);
        write_file_atomic(&self.layout.create_script(component), create.as_bytes(), 0o755)?;
        let delete = format_script(&self.binary, root, "delete-env", &args);
        write_file_atomic(&self.layout.delete_script(component), delete.as_bytes(), 0o755)?;
        Ok(())
    }

    fn run_script(&self, script: PathBuf) -> Result<(), RuntimeError> {
        let inv = Invocation::new(script)
            .current_dir(self.layout.root())
            .env(STATE_DIR_ENV, self.layout.root().display().to_string());
        self.runner.run(&inv, &mut io::stdout())
    }

    /// Write the deployment variables, run `create-<component>.sh`, and read
    /// back the variables store and state blob the tool produced.
    pub fn create_env(&self, input: &CreateEnvInput) -> Result<CreateEnvOutput, RuntimeError> {
        let component = input.component;
        info!("running {TOOL} create-env for {component}");
        write_file_atomic(
            &self.vars_file_path(component),
            input.deployment_vars.as_bytes(),
            0o600,
        )?;

        self.run_script(self.layout.create_script(component))
            .map_err(|e| ExecutorError::new(TOOL, Operation::CreateEnv, format!("{component}: {e}")))?;

        self.read_back(component)
    }

    /// The variables store and state blob currently on disk for `component`.
    /// Missing files read as empty.
    pub fn read_back(&self, component: Component) -> Result<CreateEnvOutput, RuntimeError> {
        let variables = match fs::read_to_string(self.vars_store_path(component)) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let state = match fs::read(self.state_path(component)) {
            Ok(bytes) => Some(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(CreateEnvOutput { variables, state })
    }

    pub fn delete_env(&self, input: &DeleteEnvInput) -> Result<(), RuntimeError> {
        let component = input.component;
        info!("running {TOOL} delete-env for {component}");
        write_file_atomic(
            &self.vars_file_path(component),
            input.deployment_vars.as_bytes(),
            0o600,
        )?;

        self.run_script(self.layout.delete_script(component))
            .map_err(|e| ExecutorError::new(TOOL, Operation::DeleteEnv, format!("{component}: {e}")))?;
        Ok(())
    }

    pub fn update_cloud_config(&self, update: &CloudConfigUpdate) -> Result<(), RuntimeError> {
        info!("updating cloud config on {}", update.director_address);
        let inv = Invocation::new(&self.binary)
            .args([
                "update-cloud-config".to_owned(),
                update.cloud_config.display().to_string(),
                "-o".to_owned(),
                update.ops_file.display().to_string(),
                "-l".to_owned(),
                update.vars_file.display().to_string(),
                "--non-interactive".to_owned(),
            ])
            .env("BOSH_ENVIRONMENT", &update.director_address)
            .env("BOSH_CLIENT", &update.director_username)
            .env("BOSH_CLIENT_SECRET", &update.director_password)
            .env("BOSH_CA_CERT", &update.director_ca_cert);
        self.runner
            .run(&inv, &mut io::stdout())
            .map_err(|e| ExecutorError::new(TOOL, Operation::UpdateCloudConfig, e).into())
    }

    pub fn version(&self) -> Result<String, RuntimeError> {
        let mut buf = Vec::new();
        self.runner
            .run(&Invocation::new(&self.binary).arg("-v"), &mut buf)?;
        let output = String::from_utf8_lossy(&buf);
        if output.contains(DEV_BUILD) {
            return Ok(DEV_BUILD.to_owned());
        }
        parse_version(TOOL, &output)
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Escape for inclusion between double quotes in a POSIX shell.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '`' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Quote `arg` for the script, rewriting a state-directory prefix to the
/// portable variable reference.
fn shell_word(arg: &str, state_dir: &Path) -> String {
    match Path::new(arg).strip_prefix(state_dir) {
        Ok(rest) if !state_dir.as_os_str().is_empty() => {
            format!("\"${{{STATE_DIR_ENV}}}/{}\"", escape(&rest.display().to_string()))
        }
        _ => format!("\"{}\"", escape(arg)),
    }
}

/// Render a script running `<binary> <command> <args>`, one argument per
/// line, with each flag kept on the same line as its value.
pub(crate) fn format_script(binary: &Path, state_dir: &Path, command: &str, args: &[String]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut pending_flag: Option<&str> = None;
    for arg in args {
        if arg.starts_with('-') {
            if let Some(flag) = pending_flag.replace(arg) {
                lines.push(flag.to_owned());
            }
        } else {
            let word = shell_word(arg, state_dir);
            lines.push(match pending_flag.take() {
                Some(flag) => format!("{flag} {word}"),
                None => word,
            });
        }
    }
    if let Some(flag) = pending_flag {
        lines.push(flag.to_owned());
    }

    let mut script = format!(
        "#!/bin/sh\n{} {command}",
        shell_word(&binary.display().to_string(), state_dir)
    );
    for line in lines {
        script.push_str(" \\\n  ");
        script.push_str(&line);
    }
    script.push('\n');
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingRunner;
    use std::io::Write as _;

    fn executor() -> (tempfile::TempDir, BoshExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.initialize().unwrap();
        let exec = BoshExecutor::new(Arc::new(RecordingRunner::new()), "/usr/local/bin/bosh", layout);
        (dir, exec)
    }

    fn input(iaas: Iaas) -> InterpolateInput<'static> {
        InterpolateInput {
            iaas,
            state: None,
            variables: "admin_password: secret\n",
            ops_file: "",
        }
    }

    #[test]
    fn format_script_pairs_flags_with_values() {
        let script = format_script(
            Path::new("/usr/local/bin/bosh"),
            Path::new("/state"),
            "create-env",
            &[
                "/state/bosh-deployment/bosh.yml".to_owned(),
                "--state".to_owned(),
                "/state/vars/director-state.json".to_owned(),
                "-o".to_owned(),
                "/opt/ops/extra.yml".to_owned(),
            ],
        );
        assert_eq!(
            script,
            "#!/bin/sh\n\"/usr/local/bin/bosh\" create-env \\\n  \
             \"${BOOTLOADER_STATE_DIR}/bosh-deployment/bosh.yml\" \\\n  \
             --state \"${BOOTLOADER_STATE_DIR}/vars/director-state.json\" \\\n  \
             -o \"/opt/ops/extra.yml\"\n"
        );
    }

    #[test]
    fn format_script_escapes_shell_metacharacters() {
        let script = format_script(
            Path::new("bosh"),
            Path::new("/state"),
            "delete-env",
            &["/tmp/$HOME/\"x\".yml".to_owned()],
        );
        assert!(script.contains(r#""/tmp/\$HOME/\"x\".yml""#));
    }

    #[test]
    fn state_dir_prefix_only_matches_whole_components() {
        assert_eq!(
            shell_word("/state-other/x.yml", Path::new("/state")),
            "\"/state-other/x.yml\""
        );
    }

    #[test]
    fn jumpbox_args_write_setup_files_and_scripts() {
        let (_dir, exec) = executor();
        exec.jumpbox_create_env_args(&input(Iaas::Gcp)).unwrap();

        let layout = exec.layout();
        assert!(exec.is_jumpbox_initialized(Iaas::Gcp));
        assert!(!exec.is_director_initialized(Iaas::Gcp));
        assert_eq!(
            fs::read_to_string(exec.vars_store_path(Component::Jumpbox)).unwrap(),
            "admin_password: secret\n"
        );
        assert!(!exec.state_path(Component::Jumpbox).exists());

        let create = fs::read_to_string(layout.create_script(Component::Jumpbox)).unwrap();
        assert!(create.starts_with("#!/bin/sh\n\"/usr/local/bin/bosh\" create-env"));
        assert!(create.contains("\"${BOOTLOADER_STATE_DIR}/jumpbox-deployment/jumpbox.yml\""));
        assert!(create.contains("--vars-store \"${BOOTLOADER_STATE_DIR}/vars/jumpbox-variables.yml\""));
        assert!(create.contains("-o \"${BOOTLOADER_STATE_DIR}/jumpbox-deployment/cpi.yml\""));
        assert!(!create.contains(&*layout.root().display().to_string()));

        let delete = fs::read_to_string(layout.delete_script(Component::Jumpbox)).unwrap();
        assert!(delete.contains(" delete-env "));
        assert_eq!(delete.replace("delete-env", "create-env"), create);
    }

    #[cfg(unix)]
    #[test]
    fn scripts_are_executable() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, exec) = executor();
        exec.director_create_env_args(&input(Iaas::Aws)).unwrap();
        let mode = fs::metadata(exec.layout().create_script(Component::Director))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn director_user_ops_file_is_appended_last() {
        let (_dir, exec) = executor();
        let with_ops = InterpolateInput {
            ops_file: "- type: remove\n  path: /foo\n",
            ..input(Iaas::Aws)
        };
        exec.director_create_env_args(&with_ops).unwrap();
        let create = fs::read_to_string(exec.layout().create_script(Component::Director)).unwrap();
        let last = create.trim_end().lines().last().unwrap();
        assert_eq!(last.trim(), "-o \"${BOOTLOADER_STATE_DIR}/vars/user-ops-file.yml\"");

        exec.director_create_env_args(&input(Iaas::Aws)).unwrap();
        let create = fs::read_to_string(exec.layout().create_script(Component::Director)).unwrap();
        assert!(!create.contains(USER_OPS_FILE));
    }

    #[test]
    fn prior_state_is_written_as_json() {
        let (_dir, exec) = executor();
        let mut state = ComponentState::new();
        state.insert("current_vm_cid".to_owned(), "vm-1".into());
        let with_state = InterpolateInput {
            state: Some(&state),
            ..input(Iaas::Gcp)
        };
        exec.director_create_env_args(&with_state).unwrap();
        let written: ComponentState =
            serde_json::from_str(&fs::read_to_string(exec.state_path(Component::Director)).unwrap())
                .unwrap();
        assert_eq!(written, state);
    }

    #[test]
    fn version_recognizes_dev_builds() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(RecordingRunner::with_handler(|_, out| {
            out.write_all(b"version [DEV BUILD]\n\nSucceeded\n")?;
            Ok(())
        }));
        let exec = BoshExecutor::new(runner, "bosh", StateLayout::new(dir.path()));
        assert_eq!(exec.version().unwrap(), DEV_BUILD);
    }
}
