use crate::CoreError;
use bootloader_schema::State;
use std::fmt;

/// Coarse phase of an environment, derived from its descriptor. The
/// attached load balancer is orthogonal and tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvPhase {
    Absent,
    NetworkingOnly,
    DirectorInstalled,
}

impl EnvPhase {
    pub fn of(state: &State) -> Self {
        if state.bosh.is_created() {
            EnvPhase::DirectorInstalled
        } else if state.tf_state.is_empty() && !state.jumpbox.is_created() {
            EnvPhase::Absent
        } else {
            EnvPhase::NetworkingOnly
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvPhase::Absent => "absent",
            EnvPhase::NetworkingOnly => "networking-only",
            EnvPhase::DirectorInstalled => "director-installed",
        }
    }
}

impl fmt::Display for EnvPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_transition(from: EnvPhase, to: EnvPhase) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            EnvPhase::Absent | EnvPhase::NetworkingOnly | EnvPhase::DirectorInstalled,
            EnvPhase::NetworkingOnly | EnvPhase::Absent
        ) | (
            EnvPhase::NetworkingOnly | EnvPhase::DirectorInstalled,
            EnvPhase::DirectorInstalled
        )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}
