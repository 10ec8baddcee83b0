//! Environment identifiers.
//!
//! `EnvId` serializes as a plain string so descriptors written by
//! older releases keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Stable environment identifier. Namespaces every provisioned resource and
/// never changes once assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvId(String);

impl EnvId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for EnvId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for EnvId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

const ENV_WORDS: &[&str] = &[
    "alder", "basalt", "cedar", "delta", "ember", "fjord", "granite", "harbor", "inlet",
    "juniper", "kestrel", "lagoon", "meadow", "nimbus", "onyx", "prairie", "quartz", "ridge",
    "summit", "tundra",
];

/// Generate a fresh environment identifier of the form
/// `env-<word>-<YYYYMMDDThhmmssZ>`.
///
/// The word is picked from the sub-second part of `now` so two environments
/// created in the same second are still likely to differ.
pub fn generate_env_id(now: DateTime<Utc>) -> EnvId {
    let word = ENV_WORDS[now.timestamp_subsec_nanos() as usize % ENV_WORDS.len()];
    EnvId::new(format!("env-{word}-{}", now.format("%Y%m%dT%H%M%SZ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn env_id_display_and_as_str() {
        let id = EnvId::new("env-abc");
        assert_eq!(id.to_string(), "env-abc");
        assert_eq!(id.as_str(), "env-abc");
        assert_eq!(id, "env-abc");
    }

    #[test]
    fn env_id_serializes_as_plain_string() {
        let id = EnvId::new("env-deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"env-deadbeef\"");
        let back: EnvId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn default_env_id_is_empty() {
        assert!(EnvId::default().is_empty());
    }

    #[test]
    fn generated_env_id_carries_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        let id = generate_env_id(now);
        assert!(id.starts_with("env-"));
        assert!(id.ends_with("-20260314T150926Z"), "unexpected id {id}");
    }

    #[test]
    fn generated_env_id_is_deterministic_for_same_instant() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(generate_env_id(now), generate_env_id(now));
    }
}
