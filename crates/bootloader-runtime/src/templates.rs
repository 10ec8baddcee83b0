//! IaC templates, composed per provider and attached load balancer.

use bootloader_schema::{AwsCredentials, Iaas, LbType};

struct ProviderTemplates {
    iaas: Iaas,
    base: &'static str,
    lb_common: &'static str,
    cf_lb: &'static str,
    concourse_lb: &'static str,
}

const TEMPLATES: &[ProviderTemplates] = &[
    ProviderTemplates {
        iaas: Iaas::Aws,
        base: include_str!("../assets/terraform/aws/base.tf"),
        lb_common: include_str!("../assets/terraform/aws/lb.tf"),
        cf_lb: include_str!("../assets/terraform/aws/cf-lb.tf"),
        concourse_lb: include_str!("../assets/terraform/aws/concourse-lb.tf"),
    },
    ProviderTemplates {
        iaas: Iaas::Gcp,
        base: include_str!("../assets/terraform/gcp/base.tf"),
        lb_common: include_str!("../assets/terraform/gcp/lb.tf"),
        cf_lb: include_str!("../assets/terraform/gcp/cf-lb.tf"),
        concourse_lb: include_str!("../assets/terraform/gcp/concourse-lb.tf"),
    },
];

/// The full template for an environment: networking and jumpbox/director
/// addressing, plus the resources of the attached load balancer if any.
pub fn template(iaas: Iaas, lb: LbType) -> String {
    let Some(t) = TEMPLATES.iter().find(|t| t.iaas == iaas) else {
        return String::new();
    };
    let parts: &[&str] = match lb {
        LbType::None => &[t.base],
        LbType::Cf => &[t.base, t.lb_common, t.cf_lb],
        LbType::Concourse => &[t.base, t.lb_common, t.concourse_lb],
    };
    parts.join("\n")
}

/// Minimal template declaring a single resource, so the IaC tool can adopt
/// an existing resource into its state.
pub fn import_template(resource_type: &str, resource_name: &str, creds: &AwsCredentials) -> String {
    format!(
        r#"
provider "aws" {{
  region     = {region:?}
  access_key = {access_key:?}
  secret_key = {secret_key:?}
}}

resource {resource_type:?} {resource_name:?} {{
}}
"#,
        region = creds.region,
        access_key = creds.access_key_id,
        secret_key = creds.secret_access_key,
    )
}
