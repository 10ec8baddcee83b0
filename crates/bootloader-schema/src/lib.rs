//! Environment descriptor schema for bootloader.
//!
//! This crate defines the data model shared by every other crate: the
//! [`State`] descriptor persisted across runs, the provider selector
//! ([`Iaas`]), load balancer types ([`LbType`]), and the stable
//! environment identifier ([`EnvId`]).

pub mod provider;
pub mod state;
pub mod types;

pub use provider::{Iaas, LbType};
pub use state::{
    AwsCredentials, ComponentState, Director, GcpCredentials, Jumpbox, LoadBalancer, State,
    STATE_VERSION,
};
pub use types::{generate_env_id, EnvId};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown iaas '{0}', expected one of: aws, gcp")]
    UnknownIaas(String),
    #[error("unknown load balancer type '{0}', expected one of: cf, concourse")]
    UnknownLbType(String),
}
