//! Variables files handed to `create-env`/`delete-env`.
//!
//! Values come from the descriptor (credentials, names) and from the IaC
//! outputs (addresses, network identifiers). Keys match the `((...))`
//! placeholders in the embedded manifests and overlays.

use crate::CoreError;
use bootloader_runtime::Outputs;
use bootloader_schema::{Iaas, State};
use serde_json::{Map, Value};

fn require_iaas(state: &State) -> Result<Iaas, CoreError> {
    state
        .iaas
        .ok_or_else(|| CoreError::Validation("environment has no iaas set".to_owned()))
}

/// Director name for an environment.
pub fn director_name(state: &State) -> String {
    format!("bosh-{}", state.env_id)
}

struct Vars<'a> {
    map: Map<String, Value>,
    outputs: &'a Outputs,
}

impl<'a> Vars<'a> {
    fn new(outputs: &'a Outputs) -> Self {
        Self {
            map: Map::new(),
            outputs,
        }
    }

    fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.map.insert(key.to_owned(), value.into());
    }

    /// Copy output `name` under `key`.
    fn output(&mut self, key: &str, name: &str) {
        let value = self.outputs.get(name).cloned().unwrap_or(Value::Null);
        self.map.insert(key.to_owned(), value);
    }

    fn to_yaml(&self) -> Result<String, CoreError> {
        Ok(serde_yaml::to_string(&self.map)?)
    }
}

pub fn jumpbox_deployment_vars(state: &State, outputs: &Outputs) -> Result<String, CoreError> {
    let iaas = require_iaas(state)?;
    let mut vars = Vars::new(outputs);
    vars.output("internal_cidr", "internal_cidr");
    vars.output("internal_gw", "internal_gw");
    vars.output("internal_ip", "jumpbox_internal_ip");
    vars.output("external_ip", "external_ip");

    match iaas {
        Iaas::Aws => {
            vars.output("az", "az");
            vars.output("subnet_id", "subnet_id");
            vars.output("default_key_name", "default_key_name");
            vars.output("private_key", "private_key");
            vars.set(
                "default_security_groups",
                vec![outputs.get_string("jumpbox_security_group")],
            );
            vars.set("access_key_id", state.aws.access_key_id.as_str());
            vars.set("secret_access_key", state.aws.secret_access_key.as_str());
            vars.set("region", state.aws.region.as_str());
        }
        Iaas::Gcp => {
            vars.output("zone", "zone");
            vars.output("network", "network_name");
            vars.output("subnetwork", "subnetwork_name");
            vars.set("tags", vec![outputs.get_string("jumpbox_tag_name")]);
            vars.set("project_id", state.gcp.project_id.as_str());
            vars.set("gcp_credentials_json", state.gcp.service_account_key.as_str());
        }
    }
    vars.to_yaml()
}

pub fn director_deployment_vars(state: &State, outputs: &Outputs) -> Result<String, CoreError> {
    let iaas = require_iaas(state)?;
    let mut vars = Vars::new(outputs);
    vars.set("director_name", director_name(state));
    vars.output("internal_cidr", "internal_cidr");
    vars.output("internal_gw", "internal_gw");
    vars.output("internal_ip", "director_internal_ip");

    match iaas {
        Iaas::Aws => {
            vars.output("az", "az");
            vars.output("subnet_id", "subnet_id");
            vars.output("default_key_name", "default_key_name");
            vars.output("private_key", "private_key");
            vars.output("default_security_groups", "default_security_groups");
            vars.output("iam_instance_profile", "iam_instance_profile");
            vars.output("kms_key_arn", "kms_key_arn");
            vars.set("access_key_id", state.aws.access_key_id.as_str());
            vars.set("secret_access_key", state.aws.secret_access_key.as_str());
            vars.set("region", state.aws.region.as_str());
        }
        Iaas::Gcp => {
            vars.output("zone", "zone");
            vars.output("network", "network_name");
            vars.output("subnetwork", "subnetwork_name");
            vars.set(
                "tags",
                vec![
                    outputs.get_string("bosh_director_tag_name"),
                    outputs.get_string("internal_tag_name"),
                ],
            );
            vars.set("project_id", state.gcp.project_id.as_str());
            vars.set("gcp_credentials_json", state.gcp.service_account_key.as_str());
        }
    }
    vars.to_yaml()
}

/// Connection details the director-install tool generated for the director.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirectorCredentials {
    pub username: String,
    pub password: String,
    pub ca_cert: String,
}

/// Pull the admin password and TLS CA out of a director variables store.
pub fn director_credentials(variables: &str) -> Result<DirectorCredentials, CoreError> {
    if variables.trim().is_empty() {
        return Ok(DirectorCredentials::default());
    }
    let store: serde_yaml::Value = serde_yaml::from_str(variables)?;
    let text = |v: Option<&serde_yaml::Value>| {
        v.and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    Ok(DirectorCredentials {
        username: "admin".to_owned(),
        password: text(store.get("admin_password")),
        ca_cert: text(store.get("director_ssl").and_then(|ssl| ssl.get("ca"))),
    })
}
