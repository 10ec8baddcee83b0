use crate::RuntimeError;
use regex::Regex;
use std::sync::LazyLock;

/// Version reported by locally built director-install tool binaries.
pub const DEV_BUILD: &str = "[DEV BUILD]";

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("invalid version pattern"));

/// Extract the first `major.minor.patch` triple from a tool's version output.
pub fn parse_version(tool: &'static str, output: &str) -> Result<String, RuntimeError> {
    VERSION_PATTERN
        .find(output)
        .map(|m| m.as_str().to_owned())
        .ok_or(RuntimeError::VersionParse { tool })
}

/// Fail unless `found` is at least `minimum`. Development builds always pass.
pub fn check_minimum(tool: &'static str, found: &str, minimum: &str) -> Result<(), RuntimeError> {
    if found == DEV_BUILD {
        return Ok(());
    }
    let parsed = semver::Version::parse(found).map_err(|_| RuntimeError::VersionParse { tool })?;
    let min = semver::Version::parse(minimum).map_err(|_| RuntimeError::VersionParse { tool })?;
    if parsed < min {
        return Err(RuntimeError::VersionTooOld {
            tool,
            found: found.to_owned(),
            minimum: minimum.to_owned(),
        });
    }
    Ok(())
}
