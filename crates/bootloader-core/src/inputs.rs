use crate::CoreError;
use bootloader_schema::{Iaas, LbType, State};
use std::collections::BTreeMap;

/// Longest env id prefix used in length-limited resource names.
const SHORT_ENV_ID_MAX: usize = 20;

/// `env_id` trimmed to fit provider name limits. Never ends in `-`.
pub fn short_env_id(env_id: &str) -> &str {
    let end = env_id
        .char_indices()
        .nth(SHORT_ENV_ID_MAX)
        .map_or(env_id.len(), |(i, _)| i);
    env_id[..end].trim_end_matches('-')
}

/// The IaC variables for a descriptor, one entry per `-var`.
pub fn terraform_inputs(state: &State) -> Result<BTreeMap<String, String>, CoreError> {
    let iaas = state
        .iaas
        .ok_or_else(|| CoreError::Validation("environment has no iaas set".to_owned()))?;
    if state.env_id.is_empty() {
        return Err(CoreError::Validation(
            "environment has no env id set".to_owned(),
        ));
    }

    let mut vars = BTreeMap::new();
    let mut set = |k: &str, v: &str| {
        vars.insert(k.to_owned(), v.to_owned());
    };
    set("env_id", &state.env_id);

    match iaas {
        Iaas::Aws => {
            set("access_key", &state.aws.access_key_id);
            set("secret_key", &state.aws.secret_access_key);
            set("region", &state.aws.region);
            set("short_env_id", short_env_id(&state.env_id));
        }
        Iaas::Gcp => {
            set("project_id", &state.gcp.project_id);
            set("region", &state.gcp.region);
            set("zone", &state.gcp.zone);
            set("credentials", &state.gcp.service_account_key);
        }
    }

    if state.lb.is_attached() {
        set("ssl_certificate", &state.lb.cert);
        set("ssl_certificate_private_key", &state.lb.key);
        if iaas == Iaas::Aws {
            set("ssl_certificate_chain", &state.lb.chain);
        }
        if state.lb.lb_type == LbType::Cf {
            set("system_domain", &state.lb.domain);
        }
    }

    Ok(vars)
}
