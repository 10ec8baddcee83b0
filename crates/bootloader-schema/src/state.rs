//! The environment descriptor: the single durable record of one environment.
//!
//! Every lifecycle step persists the whole descriptor after its externally
//! visible effect succeeds, so a descriptor on disk always reads as "steps
//! 1..N completed". Tool-owned state (`tf_state`, component `state` maps) is
//! opaque here and replaced wholesale, never patched.

use crate::provider::{Iaas, LbType};
use crate::types::EnvId;
use serde::{Deserialize, Serialize};

/// Current descriptor schema version. Older descriptors are migrated forward
/// on load; newer ones are refused.
pub const STATE_VERSION: u32 = 3;

/// Opaque state blob written by the director-install tool for one component.
pub type ComponentState = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct State {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iaas: Option<Iaas>,
    #[serde(rename = "envID")]
    pub env_id: EnvId,
    pub no_director: bool,
    pub aws: AwsCredentials,
    pub gcp: GcpCredentials,
    pub lb: LoadBalancer,
    pub jumpbox: Jumpbox,
    pub bosh: Director,
    pub tf_state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GcpCredentials {
    pub service_account_key: String,
    pub project_id: String,
    pub zone: String,
    pub region: String,
}

/// Attached load balancer. At most one type is attached at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancer {
    #[serde(rename = "type")]
    pub lb_type: LbType,
    pub cert: String,
    pub key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub chain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Jumpbox {
    pub url: String,
    pub variables: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ComponentState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Director {
    pub director_name: String,
    pub director_username: String,
    pub director_password: String,
    pub director_address: String,
    #[serde(rename = "directorSSLCA")]
    pub director_ssl_ca: String,
    pub variables: String,
    pub user_ops_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ComponentState>,
}

impl State {
    /// A fresh descriptor at the current schema version.
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            ..Self::default()
        }
    }

    /// True when nothing has ever been provisioned for this descriptor.
    pub fn is_empty(&self) -> bool {
        self.tf_state.is_empty() && !self.jumpbox.is_created() && !self.bosh.is_created()
    }

    /// Descriptor left behind by a successful teardown: identity survives,
    /// every provider-owned field is cleared.
    #[must_use]
    pub fn residual(&self) -> Self {
        Self {
            version: self.version,
            iaas: self.iaas,
            env_id: self.env_id.clone(),
            ..Self::default()
        }
    }
}

impl LoadBalancer {
    pub fn is_attached(&self) -> bool {
        self.lb_type != LbType::None
    }
}

impl Jumpbox {
    pub fn is_created(&self) -> bool {
        self.state.is_some()
    }
}

impl Director {
    pub fn is_created(&self) -> bool {
        self.state.is_some()
    }
}
