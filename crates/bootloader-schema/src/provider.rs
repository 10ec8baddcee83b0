use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud provider an environment lives on. Fixed once the environment exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Iaas {
    Aws,
    Gcp,
}

impl Iaas {
    pub const ALL: [Iaas; 2] = [Iaas::Aws, Iaas::Gcp];

    pub fn as_str(self) -> &'static str {
        match self {
            Iaas::Aws => "aws",
            Iaas::Gcp => "gcp",
        }
    }
}

impl fmt::Display for Iaas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Iaas {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Iaas::Aws),
            "gcp" => Ok(Iaas::Gcp),
            other => Err(SchemaError::UnknownIaas(other.to_owned())),
        }
    }
}

/// Kind of load balancer attached to an environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LbType {
    #[default]
    None,
    Cf,
    Concourse,
}

impl LbType {
    pub fn as_str(self) -> &'static str {
        match self {
            LbType::None => "none",
            LbType::Cf => "cf",
            LbType::Concourse => "concourse",
        }
    }
}

impl fmt::Display for LbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LbType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(LbType::None),
            "cf" => Ok(LbType::Cf),
            "concourse" => Ok(LbType::Concourse),
            other => Err(SchemaError::UnknownLbType(other.to_owned())),
        }
    }
}
