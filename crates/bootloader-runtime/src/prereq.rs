use std::fmt;
use std::path::Path;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

/// True if `program` is an existing file path, or a bare name found on PATH.
fn command_exists(program: &Path) -> bool {
    if program.components().count() > 1 {
        return program.is_file();
    }
    Command::new("which")
        .arg(program)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check that both external provisioning tools can be found.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_prereqs(terraform: &Path, bosh: &Path) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(terraform) {
        missing.push(MissingPrereq {
            name: terraform.display().to_string(),
            purpose: "reconciling networking, compute and load balancer resources",
            install_hint: "https://www.terraform.io/downloads.html, or set BOOTLOADER_TERRAFORM_PATH",
        });
    }

    if !command_exists(bosh) {
        missing.push(MissingPrereq {
            name: bosh.display().to_string(),
            purpose: "installing the jumpbox and director VMs",
            install_hint: "https://bosh.io/docs/cli-v2-install/, or set BOOTLOADER_BOSH_PATH",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nbootloader drives these tools to provision environments.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "terraform".to_owned(),
            purpose: "reconciling resources",
            install_hint: "download it",
        };
        let s = format!("{m}");
        assert!(s.contains("terraform"));
        assert!(s.contains("reconciling resources"));
        assert!(s.contains("download it"));
    }

    #[test]
    fn explicit_missing_paths_are_reported() {
        let missing = check_prereqs(
            Path::new("/nonexistent/terraform"),
            Path::new("/nonexistent/bosh"),
        );
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].name, "/nonexistent/terraform");
        assert_eq!(missing[1].name, "/nonexistent/bosh");
    }

    #[test]
    fn existing_explicit_path_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("terraform");
        std::fs::write(&tool, "").unwrap();
        let missing = check_prereqs(&tool, Path::new("/nonexistent/bosh"));
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "/nonexistent/bosh");
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = check_prereqs(
            Path::new("/nonexistent/terraform"),
            Path::new("/nonexistent/bosh"),
        );
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("/nonexistent/terraform"));
        assert!(output.contains("BOOTLOADER_BOSH_PATH"));
    }
}
