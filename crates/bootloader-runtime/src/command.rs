use crate::RuntimeError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// A single external command: program, arguments, working directory and
/// extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program file name, for messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    pub fn has_args(&self, expected: &[&str]) -> bool {
        self.args.len() >= expected.len()
            && self.args.iter().zip(expected).all(|(a, e)| a == e)
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn cwd_is(&self, dir: &Path) -> bool {
        self.cwd.as_deref() == Some(dir)
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Run an external command to completion.
///
/// Implementations stream the command's standard output into `stdout` while
/// it runs and report a non-zero exit as an error. Standard error always goes
/// to the operator's terminal.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation, stdout: &mut dyn Write) -> Result<(), RuntimeError>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation, stdout: &mut dyn Write) -> Result<(), RuntimeError> {
        debug!("exec: {invocation}");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                RuntimeError::ToolUnavailable(invocation.program.display().to_string())
            } else {
                RuntimeError::Io(e)
            }
        })?;

        if let Some(mut out) = child.stdout.take() {
            io::copy(&mut out, stdout)?;
        }
        stdout.flush()?;

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::ExitStatus {
                program: invocation.program_name(),
                status: status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_arguments_and_env() {
        let inv = Invocation::new("/usr/bin/terraform")
            .arg("apply")
            .args(["-state", "../vars/terraform.tfstate"])
            .current_dir("/tmp/x")
            .env("TF_LOG", "debug");
        assert!(inv.has_args(&["apply", "-state"]));
        assert!(!inv.has_args(&["destroy"]));
        assert_eq!(inv.env_value("TF_LOG"), Some("debug"));
        assert!(inv.cwd_is(Path::new("/tmp/x")));
        assert_eq!(inv.program_name(), "terraform");
        assert_eq!(
            inv.to_string(),
            "/usr/bin/terraform apply -state ../vars/terraform.tfstate"
        );
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_streams_stdout() {
        let mut out = Vec::new();
        ProcessRunner::new()
            .run(&Invocation::new("echo").arg("hello"), &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_passes_env_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        ProcessRunner::new()
            .run(
                &Invocation::new("sh")
                    .args(["-c", "echo $GREETING; pwd"])
                    .env("GREETING", "hi")
                    .current_dir(dir.path()),
                &mut out,
            )
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("hi\n"));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(text.trim_end().ends_with(&*canonical.to_string_lossy()));
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_reports_nonzero_exit() {
        let err = ProcessRunner::new()
            .run(&Invocation::new("sh").args(["-c", "exit 3"]), &mut io::sink())
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ExitStatus { .. }));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn process_runner_reports_missing_tool() {
        let err = ProcessRunner::new()
            .run(
                &Invocation::new("/nonexistent/bootloader-no-such-tool"),
                &mut io::sink(),
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ToolUnavailable(_)));
    }
}
