use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the environment descriptor at the root of the state directory.
pub const STATE_FILE: &str = "state.json";
/// Subdirectory holding variable files and tool state blobs.
pub const VARS_DIR: &str = "vars";
/// Subdirectory the IaC tool runs in.
pub const TERRAFORM_DIR: &str = "terraform";
/// The IaC tool's working state file, inside [`VARS_DIR`].
pub const TF_STATE_FILE: &str = "terraform.tfstate";
const LOCK_FILE: &str = ".bootloader.lock";

/// A component installed by the director-install tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Jumpbox,
    Director,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Jumpbox => "jumpbox",
            Component::Director => "director",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory layout of one environment's state directory.
///
/// ```text
/// <root>/
///   state.json               environment descriptor
///   create-<component>.sh    generated idempotency scripts
///   delete-<component>.sh
///   vars/                    variable files, state blobs, vars stores
///   terraform/               staged IaC template and plugin cache
///   jumpbox-deployment/      jumpbox base manifest and overlays
///   bosh-deployment/         director base manifest and overlays
///   cloud-config/            cloud config and its overlay
/// ```
///
/// Subdirectories are created lazily on [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    /// The root is made absolute against the current directory so generated
    /// scripts and tool invocations resolve it the same way from any working
    /// directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn state_file(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    #[inline]
    pub fn vars_dir(&self) -> PathBuf {
        self.root.join(VARS_DIR)
    }

    #[inline]
    pub fn terraform_dir(&self) -> PathBuf {
        self.root.join(TERRAFORM_DIR)
    }

    /// The IaC tool's working state file. Lives outside the template
    /// directory so the template directory can be wiped freely.
    #[inline]
    pub fn tf_state_file(&self) -> PathBuf {
        self.vars_dir().join(TF_STATE_FILE)
    }

    /// [`tf_state_file`](Self::tf_state_file) as seen from the IaC tool's
    /// working directory.
    pub fn tf_state_file_relative(&self) -> PathBuf {
        Path::new("..").join(VARS_DIR).join(TF_STATE_FILE)
    }

    #[inline]
    pub fn jumpbox_deployment_dir(&self) -> PathBuf {
        self.root.join("jumpbox-deployment")
    }

    #[inline]
    pub fn director_deployment_dir(&self) -> PathBuf {
        self.root.join("bosh-deployment")
    }

    #[inline]
    pub fn deployment_dir(&self, component: Component) -> PathBuf {
        match component {
            Component::Jumpbox => self.jumpbox_deployment_dir(),
            Component::Director => self.director_deployment_dir(),
        }
    }

    #[inline]
    pub fn cloud_config_dir(&self) -> PathBuf {
        self.root.join("cloud-config")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    #[inline]
    pub fn create_script(&self, component: Component) -> PathBuf {
        self.root.join(format!("create-{component}.sh"))
    }

    #[inline]
    pub fn delete_script(&self, component: Component) -> PathBuf {
        self.root.join(format!("delete-{component}.sh"))
    }

    /// Directories holding generated, reconstructible files. Removed on teardown.
    pub fn working_dirs(&self) -> [PathBuf; 5] {
        [
            self.vars_dir(),
            self.terraform_dir(),
            self.jumpbox_deployment_dir(),
            self.director_deployment_dir(),
            self.cloud_config_dir(),
        ]
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root)?;
        for dir in self.working_dirs() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StateLayout::new("/tmp/bootloader-test");
        assert_eq!(
            layout.state_file(),
            PathBuf::from("/tmp/bootloader-test/state.json")
        );
        assert_eq!(layout.vars_dir(), PathBuf::from("/tmp/bootloader-test/vars"));
        assert_eq!(
            layout.terraform_dir(),
            PathBuf::from("/tmp/bootloader-test/terraform")
        );
        assert_eq!(
            layout.tf_state_file(),
            PathBuf::from("/tmp/bootloader-test/vars/terraform.tfstate")
        );
        assert_eq!(
            layout.terraform_dir().join(layout.tf_state_file_relative()),
            PathBuf::from("/tmp/bootloader-test/terraform/../vars/terraform.tfstate")
        );
        assert_eq!(
            layout.deployment_dir(Component::Director),
            PathBuf::from("/tmp/bootloader-test/bosh-deployment")
        );
        assert_eq!(
            layout.create_script(Component::Jumpbox),
            PathBuf::from("/tmp/bootloader-test/create-jumpbox.sh")
        );
        assert_eq!(
            layout.delete_script(Component::Director),
            PathBuf::from("/tmp/bootloader-test/delete-director.sh")
        );
    }

    #[test]
    fn relative_root_is_made_absolute() {
        let layout = StateLayout::new("envs/a");
        assert!(layout.root().is_absolute());
        assert!(layout.root().ends_with("envs/a"));
        assert_eq!(
            layout.create_script(Component::Jumpbox),
            std::env::current_dir()
                .unwrap()
                .join("envs/a/create-jumpbox.sh")
        );
    }

    #[test]
    fn initialize_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path().join("env"));
        layout.initialize().unwrap();

        for d in layout.working_dirs() {
            assert!(d.is_dir(), "{} missing", d.display());
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StateLayout::new(dir.path());
        layout.initialize().unwrap();
        layout.initialize().unwrap();
        assert!(layout.vars_dir().is_dir());
    }
}
