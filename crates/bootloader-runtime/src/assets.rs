//! Base manifests, overlays and cloud config embedded at compile time.
//!
//! Provider-specific overlay selection is table driven: supporting a new
//! provider means adding one row to [`JUMPBOX_OVERLAYS`],
//! [`PROVIDER_OVERLAYS`] and [`CLOUD_CONFIG_OPS`].

use bootloader_schema::{Iaas, LbType};

/// A file staged next to a base manifest and applied with `-o`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    pub file_name: &'static str,
    pub contents: &'static str,
}

impl Overlay {
    const fn new(file_name: &'static str, contents: &'static str) -> Self {
        Self {
            file_name,
            contents,
        }
    }
}

pub const JUMPBOX_MANIFEST: Overlay = Overlay::new(
    "jumpbox.yml",
    include_str!("../assets/jumpbox-deployment/jumpbox.yml"),
);

pub const DIRECTOR_MANIFEST: Overlay = Overlay::new(
    "bosh.yml",
    include_str!("../assets/bosh-deployment/bosh.yml"),
);

const JUMPBOX_AWS_CPI: Overlay = Overlay::new(
    "cpi.yml",
    include_str!("../assets/jumpbox-deployment/aws/cpi.yml"),
);
const JUMPBOX_GCP_CPI: Overlay = Overlay::new(
    "cpi.yml",
    include_str!("../assets/jumpbox-deployment/gcp/cpi.yml"),
);

const AWS_CPI: Overlay = Overlay::new(
    "cpi.yml",
    include_str!("../assets/bosh-deployment/aws/cpi.yml"),
);
const GCP_CPI: Overlay = Overlay::new(
    "cpi.yml",
    include_str!("../assets/bosh-deployment/gcp/cpi.yml"),
);
const JUMPBOX_USER: Overlay = Overlay::new(
    "jumpbox-user.yml",
    include_str!("../assets/bosh-deployment/jumpbox-user.yml"),
);
const UAA: Overlay = Overlay::new("uaa.yml", include_str!("../assets/bosh-deployment/uaa.yml"));
const CREDHUB: Overlay = Overlay::new(
    "credhub.yml",
    include_str!("../assets/bosh-deployment/credhub.yml"),
);
const AWS_EPHEMERAL_IP: Overlay = Overlay::new(
    "aws-bosh-director-ephemeral-ip-ops.yml",
    include_str!("../assets/ops/aws-bosh-director-ephemeral-ip-ops.yml"),
);
const AWS_IAM_INSTANCE_PROFILE: Overlay = Overlay::new(
    "iam-instance-profile.yml",
    include_str!("../assets/bosh-deployment/aws/iam-instance-profile.yml"),
);
const AWS_ENCRYPT_DISK: Overlay = Overlay::new(
    "aws-bosh-director-encrypt-disk-ops.yml",
    include_str!("../assets/ops/aws-bosh-director-encrypt-disk-ops.yml"),
);
const GCP_EPHEMERAL_IP: Overlay = Overlay::new(
    "gcp-bosh-director-ephemeral-ip-ops.yml",
    include_str!("../assets/ops/gcp-bosh-director-ephemeral-ip-ops.yml"),
);

/// Jumpbox overlays per provider, in application order.
pub const JUMPBOX_OVERLAYS: &[(Iaas, &[Overlay])] = &[
    (Iaas::Aws, &[JUMPBOX_AWS_CPI]),
    (Iaas::Gcp, &[JUMPBOX_GCP_CPI]),
];

/// Director overlays per provider, in application order. Later overlays may
/// override paths set by earlier ones.
pub const PROVIDER_OVERLAYS: &[(Iaas, &[Overlay])] = &[
    (
        Iaas::Aws,
        &[
            AWS_CPI,
            JUMPBOX_USER,
            UAA,
            CREDHUB,
            AWS_EPHEMERAL_IP,
            AWS_IAM_INSTANCE_PROFILE,
            AWS_ENCRYPT_DISK,
        ],
    ),
    (
        Iaas::Gcp,
        &[GCP_CPI, JUMPBOX_USER, UAA, CREDHUB, GCP_EPHEMERAL_IP],
    ),
];

fn lookup(table: &'static [(Iaas, &'static [Overlay])], iaas: Iaas) -> &'static [Overlay] {
    table
        .iter()
        .find(|(i, _)| *i == iaas)
        .map(|(_, overlays)| *overlays)
        .unwrap_or_default()
}

pub fn jumpbox_overlays(iaas: Iaas) -> &'static [Overlay] {
    lookup(JUMPBOX_OVERLAYS, iaas)
}

pub fn director_overlays(iaas: Iaas) -> &'static [Overlay] {
    lookup(PROVIDER_OVERLAYS, iaas)
}

pub const CLOUD_CONFIG: &str = include_str!("../assets/cloud-config/cloud-config.yml");

/// Cloud config overlays per provider: base properties, then one per
/// attachable load balancer type.
pub struct CloudConfigOps {
    pub iaas: Iaas,
    pub base: &'static str,
    pub cf_lb: &'static str,
    pub concourse_lb: &'static str,
}

pub const CLOUD_CONFIG_OPS: &[CloudConfigOps] = &[
    CloudConfigOps {
        iaas: Iaas::Aws,
        base: include_str!("../assets/cloud-config/aws/ops.yml"),
        cf_lb: include_str!("../assets/cloud-config/aws/cf-lb-ops.yml"),
        concourse_lb: include_str!("../assets/cloud-config/aws/concourse-lb-ops.yml"),
    },
    CloudConfigOps {
        iaas: Iaas::Gcp,
        base: include_str!("../assets/cloud-config/gcp/ops.yml"),
        cf_lb: include_str!("../assets/cloud-config/gcp/cf-lb-ops.yml"),
        concourse_lb: include_str!("../assets/cloud-config/gcp/concourse-lb-ops.yml"),
    },
];

/// The cloud config ops file for a provider and attached load balancer.
/// Ops files are YAML sequences, so concatenation composes them.
pub fn cloud_config_ops(iaas: Iaas, lb: LbType) -> String {
    let Some(ops) = CLOUD_CONFIG_OPS.iter().find(|o| o.iaas == iaas) else {
        return String::new();
    };
    let mut out = ops.base.to_owned();
    let lb_ops = match lb {
        LbType::None => "",
        LbType::Cf => ops.cf_lb,
        LbType::Concourse => ops.concourse_lb,
    };
    if !lb_ops.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out.push_str(lb_ops);
    }
    out
}
