//! Error types for siren control

use iaswd_cluster::ZclError;
use thiserror::Error;

/// Failures reported by the cluster transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device or coordinator rejected the operation
    #[error("Operation rejected: {0}")]
    Rejected(String),

    /// No response was received in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The radio link is unavailable
    #[error("Link error: {0}")]
    Link(String),
}

/// Failures reported by the host capability store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Capability {capability} could not be set: {reason}")]
    Capability { capability: String, reason: String },
}

/// Errors surfaced by the siren controllers
#[derive(Error, Debug)]
pub enum SirenError {
    /// Attribute write or command failed at the transport
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Value could not be encoded for the cluster
    #[error("Cluster error: {0}")]
    Cluster(#[from] ZclError),

    /// Capability store failure
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    /// A stop arrived while the start was still in flight
    #[error("Alarm start cancelled by a stop on {0}")]
    Cancelled(String),

    /// No siren with this id
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}
